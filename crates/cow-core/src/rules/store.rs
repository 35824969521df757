//! Rule store implementation
//!
//! Holds the configured bypass rules and answers whether a host matches.

use super::Rule;
use ipnet::{IpNet, Ipv4Net};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Bypass rules, one collection per rule kind
///
/// Filled during setup and read-only afterwards; `matches` takes `&self`
/// and needs no locking.
#[derive(Debug, Default)]
pub struct RuleStore {
    /// Exact hostnames
    exact_domains: HashSet<String>,
    /// Suffixes, in insertion order
    domain_suffixes: Vec<String>,
    /// Substrings, in insertion order
    keywords: Vec<String>,
    /// Literal IP addresses
    literal_ips: HashSet<IpAddr>,
    /// CIDR blocks, in insertion order
    cidr_blocks: Vec<IpNet>,
    /// Number of `matches` calls
    evaluations: AtomicU64,
}

impl RuleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule from a `KIND,VALUE` line
    ///
    /// A best effort is made to parse the line; lines that do not parse are
    /// dropped without error.
    pub fn add_rule(&mut self, line: &str) {
        match line.parse::<Rule>() {
            Ok(rule) => self.add(rule),
            Err(e) => debug!("Ignoring rule {:?}: {}", line, e),
        }
    }

    /// Add a parsed rule
    pub fn add(&mut self, rule: Rule) {
        match rule {
            Rule::Domain(domain) => self.add_domain(domain),
            Rule::Ip(ip) => self.add_ip(ip),
            Rule::IpCidr(net) => self.add_cidr(net),
            Rule::DomainSuffix(suffix) => self.add_suffix(suffix),
            Rule::DomainKeyword(keyword) => self.add_keyword(keyword),
        }
    }

    /// Add an exact hostname
    pub fn add_domain(&mut self, domain: impl Into<String>) {
        self.exact_domains.insert(domain.into());
    }

    /// Add a literal IP
    ///
    /// Only takes effect when a literal IP is dialed. A named host never
    /// matches an IP rule.
    pub fn add_ip(&mut self, ip: IpAddr) {
        self.literal_ips.insert(canonical(ip));
    }

    /// Add a CIDR block
    ///
    /// Like [`add_ip`](Self::add_ip), only literal IP targets can match.
    /// A block inside `::ffff:0:0/96` is stored as the IPv4 block it covers.
    pub fn add_cidr(&mut self, net: IpNet) {
        self.cidr_blocks.push(canonical_net(net));
    }

    /// Add a hostname suffix
    pub fn add_suffix(&mut self, suffix: impl Into<String>) {
        self.domain_suffixes.push(suffix.into());
    }

    /// Add a hostname substring
    pub fn add_keyword(&mut self, keyword: impl Into<String>) {
        self.keywords.push(keyword.into());
    }

    /// Load rules from text, one per line
    ///
    /// Blank lines and lines starting with `#` are skipped. Returns the
    /// number of lines handed to [`add_rule`](Self::add_rule).
    pub fn load_str(&mut self, content: &str) -> usize {
        let mut count = 0;
        for line in content.lines() {
            let line = line.trim();
            if !line.is_empty() && !line.starts_with('#') {
                self.add_rule(line);
                count += 1;
            }
        }
        count
    }

    /// Load rules from a file
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> std::io::Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let count = self.load_str(&content);
        info!("Loaded {} rules from {}", count, path.display());
        Ok(count)
    }

    /// Check if a host matches any rule
    ///
    /// Categories are checked in a fixed order and the first hit wins:
    /// exact domain, suffix, keyword, then (for literal IPs only) IP and
    /// CIDR.
    pub fn matches(&self, host: &str) -> bool {
        self.matching_rule(host).is_some()
    }

    /// The first rule that matches `host`, in evaluation order
    pub fn matching_rule(&self, host: &str) -> Option<Rule> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        if self.exact_domains.contains(host) {
            return Some(Rule::Domain(host.to_string()));
        }

        if let Some(suffix) = self.domain_suffixes.iter().find(|s| host.ends_with(s.as_str())) {
            return Some(Rule::DomainSuffix(suffix.clone()));
        }

        if let Some(keyword) = self.keywords.iter().find(|k| host.contains(k.as_str())) {
            return Some(Rule::DomainKeyword(keyword.clone()));
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            let ip = canonical(ip);
            if self.literal_ips.contains(&ip) {
                return Some(Rule::Ip(ip));
            }
            if let Some(net) = self.cidr_blocks.iter().find(|net| net.contains(&ip)) {
                return Some(Rule::IpCidr(*net));
            }
        }

        None
    }

    /// Number of `matches` evaluations so far
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Total number of rules
    pub fn len(&self) -> usize {
        self.exact_domains.len()
            + self.domain_suffixes.len()
            + self.keywords.len()
            + self.literal_ips.len()
            + self.cidr_blocks.len()
    }

    /// Check if the store has no rules
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rules, grouped in evaluation order
    ///
    /// Exact domains and IPs are sorted since their sets are unordered.
    pub fn rules(&self) -> Vec<Rule> {
        let mut domains: Vec<&String> = self.exact_domains.iter().collect();
        domains.sort();
        let mut ips: Vec<&IpAddr> = self.literal_ips.iter().collect();
        ips.sort();

        domains
            .into_iter()
            .map(|d| Rule::Domain(d.clone()))
            .chain(self.domain_suffixes.iter().map(|s| Rule::DomainSuffix(s.clone())))
            .chain(self.keywords.iter().map(|k| Rule::DomainKeyword(k.clone())))
            .chain(ips.into_iter().map(|ip| Rule::Ip(*ip)))
            .chain(self.cidr_blocks.iter().map(|net| Rule::IpCidr(*net)))
            .collect()
    }
}

/// IPv4-mapped IPv6 addresses compare as their IPv4 form
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}

/// IPv4-mapped IPv6 blocks compare as the IPv4 block they cover
fn canonical_net(net: IpNet) -> IpNet {
    match net {
        IpNet::V6(v6) if v6.prefix_len() >= 96 => v6
            .addr()
            .to_ipv4_mapped()
            .and_then(|v4| Ipv4Net::new(v4, v6.prefix_len() - 96).ok())
            .map_or(net, IpNet::V4),
        _ => net,
    }
}
