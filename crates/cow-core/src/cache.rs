//! Routing cache
//!
//! Remembers the bypass decision for each host already seen so repeated
//! connections skip rule evaluation.

use dashmap::DashMap;

/// Host -> "should bypass" map, safe for concurrent use
///
/// Keys are hosts exactly as dialed, without normalization. Entries never
/// expire: rules are fixed once serving starts, so a stored decision
/// cannot go stale. Two tasks racing on the same uncached host compute the
/// same value, so the last write winning is harmless.
#[derive(Debug, Default)]
pub struct RouteCache {
    entries: DashMap<String, bool>,
}

impl RouteCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached decision for a host
    pub fn get(&self, host: &str) -> Option<bool> {
        self.entries.get(host).map(|entry| *entry)
    }

    /// Store the decision for a host, replacing any previous one
    pub fn set(&self, host: &str, bypass: bool) {
        self.entries.insert(host.to_string(), bypass);
    }

    /// Number of cached hosts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
