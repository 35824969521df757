//! Bypass rules
//!
//! A rule line has the form `KIND,VALUE`:
//!
//! ```text
//! DOMAIN,<exact-hostname>
//! IP,<ipv4-or-ipv6-literal>
//! IP-CIDR,<cidr-notation>
//! DOMAIN-SUFFIX,<suffix-string>
//! DOMAIN-KEYWORD,<substring>
//! ```
//!
//! Parsing is best-effort: [`RuleStore::add_rule`] drops lines that do not
//! parse instead of failing. [`Rule::from_str`] exposes the parse error for
//! tooling that wants to report it.

mod store;

pub use store::RuleStore;

use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Rule line could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleParseError {
    /// First field is not a known rule kind
    #[error("unknown rule kind '{0}'")]
    UnknownKind(String),

    /// Line has no value after the kind
    #[error("rule '{0}' has no value")]
    MissingValue(String),

    /// `IP` value is not an IP literal
    #[error("invalid IP address '{0}'")]
    InvalidIp(String),

    /// `IP-CIDR` value is not in CIDR notation
    #[error("invalid CIDR block '{0}'")]
    InvalidCidr(String),
}

/// One parsed bypass rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Host equals the value exactly
    Domain(String),
    /// Host is this literal IP
    Ip(IpAddr),
    /// Host is a literal IP inside this network
    IpCidr(IpNet),
    /// Host ends with the value (no label boundary check)
    DomainSuffix(String),
    /// Host contains the value
    DomainKeyword(String),
}

impl Rule {
    /// Rule kind as written in rule files
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(_) => "DOMAIN",
            Self::Ip(_) => "IP",
            Self::IpCidr(_) => "IP-CIDR",
            Self::DomainSuffix(_) => "DOMAIN-SUFFIX",
            Self::DomainKeyword(_) => "DOMAIN-KEYWORD",
        }
    }
}

impl FromStr for Rule {
    type Err = RuleParseError;

    /// Parse a `KIND,VALUE` line. Fields after the value are ignored.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.split(',');
        let kind = fields.next().unwrap_or_default();
        let value = match fields.next() {
            Some(value) if !value.is_empty() => value,
            _ => {
                return match kind {
                    "DOMAIN" | "IP" | "IP-CIDR" | "DOMAIN-SUFFIX" | "DOMAIN-KEYWORD" => {
                        Err(RuleParseError::MissingValue(kind.to_string()))
                    }
                    _ => Err(RuleParseError::UnknownKind(kind.to_string())),
                };
            }
        };

        match kind {
            "DOMAIN" => Ok(Self::Domain(value.to_string())),
            "IP" => value
                .parse()
                .map(Self::Ip)
                .map_err(|_| RuleParseError::InvalidIp(value.to_string())),
            "IP-CIDR" => value
                .parse::<IpNet>()
                .map(|net| Self::IpCidr(net.trunc()))
                .map_err(|_| RuleParseError::InvalidCidr(value.to_string())),
            "DOMAIN-SUFFIX" => Ok(Self::DomainSuffix(value.to_string())),
            "DOMAIN-KEYWORD" => Ok(Self::DomainKeyword(value.to_string())),
            _ => Err(RuleParseError::UnknownKind(kind.to_string())),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(v) | Self::DomainSuffix(v) | Self::DomainKeyword(v) => {
                write!(f, "{},{}", self.kind(), v)
            }
            Self::Ip(ip) => write!(f, "{},{}", self.kind(), ip),
            Self::IpCidr(net) => write!(f, "{},{}", self.kind(), net),
        }
    }
}
