//! # cow core
//!
//! Per-host routing engine for a local gateway that sends each outbound
//! connection either straight to its destination or through a tunnel.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Rule store** - bypass rules by exact domain, suffix, keyword, IP and CIDR
//! - **Routing cache** - concurrent memoization of per-host decisions
//! - **Dispatcher** - picks the direct or bypass dialer for every dial
//! - **Dialers** - direct TCP and SOCKS5 (tunnel endpoint) connection factories
//! - **Configuration** - TOML configuration wiring everything together
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cow_core::dialer::{DirectDialer, Socks5Dialer};
//! use cow_core::PerHost;
//!
//! # async fn example() -> cow_core::Result<()> {
//! let direct = Arc::new(DirectDialer::new());
//! let tunnel = Arc::new(Socks5Dialer::new("127.0.0.1:1081"));
//!
//! let mut per_host = PerHost::new(direct, tunnel);
//! per_host.add_rule("DOMAIN-SUFFIX,.blocked.com");
//! per_host.add_rule("IP-CIDR,10.0.0.0/8");
//!
//! // Goes through the tunnel
//! let _conn = per_host.dial("tcp", "www.blocked.com:443").await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod addr;
pub mod cache;
pub mod config;
pub mod dialer;
pub mod dispatcher;
pub mod error;
pub mod rules;

// Re-exports for convenience
pub use cache::RouteCache;
pub use config::Config;
pub use dialer::{Connection, Dialer};
pub use dispatcher::{DispatchStats, PerHost, Route};
pub use error::{Error, Result};
pub use rules::{Rule, RuleParseError, RuleStore};
