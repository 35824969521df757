//! Per-host dispatcher
//!
//! Routes every dial to the direct dialer unless the target host matches one
//! of the bypass rules, in which case the bypass (tunnel) dialer is used.

use crate::addr::split_host_port;
use crate::cache::RouteCache;
use crate::dialer::{Connection, Dialer};
use crate::error::{Error, Result};
use crate::rules::RuleStore;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Routing decision for a host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Connect straight to the destination
    Direct,
    /// Connect through the bypass dialer
    Bypass,
}

impl Route {
    fn from_bypass(bypass: bool) -> Self {
        if bypass {
            Self::Bypass
        } else {
            Self::Direct
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Bypass => write!(f, "bypass"),
        }
    }
}

/// Snapshot of dispatcher counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    /// Decisions served from the cache
    pub cache_hits: u64,
    /// Decisions that needed rule evaluation
    pub cache_misses: u64,
    /// Dials handed to the direct dialer
    pub direct_dials: u64,
    /// Dials handed to the bypass dialer
    pub bypass_dials: u64,
    /// Hosts currently cached
    pub cached_hosts: usize,
}

#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    direct_dials: AtomicU64,
    bypass_dials: AtomicU64,
}

/// Dialer that picks the direct or bypass dialer per host
///
/// Rules are added with `&mut self` during setup; afterwards share the
/// dispatcher behind an `Arc` and dial concurrently.
pub struct PerHost {
    direct: Arc<dyn Dialer>,
    bypass: Arc<dyn Dialer>,
    rules: RuleStore,
    cache: RouteCache,
    counters: Counters,
}

impl fmt::Debug for PerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerHost")
            .field("rules", &self.rules.len())
            .field("cached_hosts", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl PerHost {
    /// Create a dispatcher with no rules; everything goes direct
    pub fn new(direct: Arc<dyn Dialer>, bypass: Arc<dyn Dialer>) -> Self {
        Self::with_rules(direct, bypass, RuleStore::new())
    }

    /// Create a dispatcher around an existing rule store
    pub fn with_rules(direct: Arc<dyn Dialer>, bypass: Arc<dyn Dialer>, rules: RuleStore) -> Self {
        Self {
            direct,
            bypass,
            rules,
            cache: RouteCache::new(),
            counters: Counters::default(),
        }
    }

    /// Add a bypass rule from a `KIND,VALUE` line; unparseable lines are ignored
    pub fn add_rule(&mut self, line: &str) {
        self.rules.add_rule(line);
    }

    /// Load rules from text, one per line
    pub fn load_rules(&mut self, content: &str) -> usize {
        self.rules.load_str(content)
    }

    /// Load rules from a file
    pub fn load_rules_file<P: AsRef<Path>>(&mut self, path: P) -> io::Result<usize> {
        self.rules.load_file(path)
    }

    /// The rule store
    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    /// Routing decision for a bare host (no port), cached after the first call
    pub fn route(&self, host: &str) -> Route {
        if let Some(bypass) = self.cache.get(host) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Route::from_bypass(bypass);
        }

        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
        let bypass = self.rules.matches(host);
        self.cache.set(host, bypass);
        Route::from_bypass(bypass)
    }

    /// Connect to `address` through the dialer chosen for its host
    ///
    /// The full address, port included, and `network` are passed unchanged
    /// to the chosen dialer, and its result is returned as is. There is no
    /// retry and no fallback to the other dialer.
    ///
    /// # Errors
    ///
    /// [`Error::AddressFormat`] if `address` is not `host:port` (no dialer is
    /// called), otherwise [`Error::Dial`] carrying the dialer's own error.
    #[instrument(skip(self), level = "debug")]
    pub async fn dial(&self, network: &str, address: &str) -> Result<Connection> {
        let (host, _port) = split_host_port(address)?;

        let route = self.route(host);
        debug!(host, %route, "Dispatching");

        let dialer = match route {
            Route::Direct => {
                self.counters.direct_dials.fetch_add(1, Ordering::Relaxed);
                &self.direct
            }
            Route::Bypass => {
                self.counters.bypass_dials.fetch_add(1, Ordering::Relaxed);
                &self.bypass
            }
        };

        dialer.dial(network, address).await.map_err(Error::Dial)
    }

    /// Current counters
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            direct_dials: self.counters.direct_dials.load(Ordering::Relaxed),
            bypass_dials: self.counters.bypass_dials.load(Ordering::Relaxed),
            cached_hosts: self.cache.len(),
        }
    }
}

#[async_trait]
impl Dialer for PerHost {
    async fn dial(&self, network: &str, address: &str) -> io::Result<Connection> {
        match PerHost::dial(self, network, address).await {
            Ok(conn) => Ok(conn),
            Err(Error::Dial(e)) => Err(e),
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidInput, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records calls and hands back one end of an in-memory pipe
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Dialer for Recorder {
        async fn dial(&self, network: &str, address: &str) -> io::Result<Connection> {
            self.calls
                .lock()
                .unwrap()
                .push((network.to_string(), address.to_string()));
            let (client, _server) = tokio::io::duplex(64);
            Ok(Box::new(client))
        }
    }

    fn setup(lines: &[&str]) -> (PerHost, Arc<Recorder>, Arc<Recorder>) {
        let direct = Arc::new(Recorder::default());
        let bypass = Arc::new(Recorder::default());
        let mut per_host = PerHost::new(direct.clone(), bypass.clone());
        for line in lines {
            per_host.add_rule(line);
        }
        (per_host, direct, bypass)
    }

    #[tokio::test]
    async fn test_dial_routes_by_rule() {
        let (per_host, direct, bypass) = setup(&["DOMAIN-SUFFIX,.blocked.com"]);

        per_host.dial("tcp", "a.blocked.com:443").await.unwrap();
        per_host.dial("tcp", "example.com:80").await.unwrap();

        assert_eq!(
            *bypass.calls.lock().unwrap(),
            [("tcp".to_string(), "a.blocked.com:443".to_string())]
        );
        assert_eq!(
            *direct.calls.lock().unwrap(),
            [("tcp".to_string(), "example.com:80".to_string())]
        );
    }

    #[tokio::test]
    async fn test_route_cached_per_host() {
        let (per_host, _, bypass) = setup(&["DOMAIN,example.com"]);

        per_host.dial("tcp", "example.com:80").await.unwrap();
        per_host.dial("tcp", "example.com:443").await.unwrap();

        assert_eq!(per_host.rules().evaluations(), 1);
        assert_eq!(bypass.calls.lock().unwrap().len(), 2);

        let stats = per_host.stats();
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.bypass_dials, 2);
        assert_eq!(stats.direct_dials, 0);
        assert_eq!(stats.cached_hosts, 1);
    }

    #[tokio::test]
    async fn test_bad_address_calls_nobody() {
        let (per_host, direct, bypass) = setup(&["DOMAIN-KEYWORD,bad"]);

        let err = per_host.dial("tcp", "bad-address").await.unwrap_err();
        assert!(matches!(err, Error::AddressFormat { .. }));
        assert!(direct.calls.lock().unwrap().is_empty());
        assert!(bypass.calls.lock().unwrap().is_empty());
        assert_eq!(per_host.rules().evaluations(), 0);
    }

    #[tokio::test]
    async fn test_as_dialer_maps_address_error() {
        let (per_host, _, _) = setup(&[]);
        let dialer: &dyn Dialer = &per_host;

        let err = dialer.dial("tcp", "no-port").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_route_display() {
        assert_eq!(Route::Direct.to_string(), "direct");
        assert_eq!(Route::Bypass.to_string(), "bypass");
    }
}
