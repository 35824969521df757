//! Configuration management for cow
//!
//! Strongly-typed TOML configuration. Every section has defaults, so an
//! empty file is a valid configuration.

use crate::dialer::{DirectDialer, Socks5Dialer};
use crate::dispatcher::PerHost;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Log levels accepted in `[logging] level`
const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local listener settings
    pub proxy: ProxyConfig,

    /// Upstream tunnel settings
    pub tunnel: TunnelConfig,

    /// Bypass rules
    pub rules: RulesConfig,

    /// Direct dialer settings
    pub direct: DirectConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| Error::ConfigNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::from)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.proxy.http_port == 0 {
            return Err(Error::config_value("proxy.http_port", "must be non-zero"));
        }
        if self.proxy.socks_port == 0 {
            return Err(Error::config_value("proxy.socks_port", "must be non-zero"));
        }
        if self.tunnel.server_port == 0 {
            return Err(Error::config_value("tunnel.server_port", "must be non-zero"));
        }

        let endpoint = self.socks_endpoint();
        crate::addr::split_host_port(&endpoint)
            .ok()
            .and_then(|(_, port)| port.parse::<u16>().ok())
            .filter(|&port| port != 0)
            .ok_or_else(|| {
                Error::config_value("tunnel.socks_endpoint", format!("'{endpoint}' is not host:port"))
            })?;

        if self.tunnel.username.is_some() != self.tunnel.socks_password.is_some() {
            return Err(Error::config_value(
                "tunnel.username",
                "username and socks_password must be set together",
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_value(
                "logging.level",
                format!("'{}' is not one of {}", self.logging.level, LOG_LEVELS.join(", ")),
            ));
        }

        Ok(())
    }

    /// Address of the tunnel's local SOCKS5 endpoint
    pub fn socks_endpoint(&self) -> String {
        match &self.tunnel.socks_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => join_host_port(&self.proxy.local_addr, self.proxy.socks_port),
        }
    }

    /// Address the HTTP front end listens on
    pub fn http_listen_addr(&self) -> String {
        join_host_port(&self.proxy.local_addr, self.proxy.http_port)
    }

    /// Direct dialer described by `[direct]`
    pub fn direct_dialer(&self) -> DirectDialer {
        let dialer = DirectDialer::new().with_nodelay(self.direct.nodelay);
        match self.direct.connect_timeout_secs {
            0 => dialer,
            secs => dialer.with_connect_timeout(Duration::from_secs(secs)),
        }
    }

    /// SOCKS5 dialer for the tunnel, reached through `direct`
    pub fn tunnel_dialer(&self, direct: Arc<DirectDialer>) -> Socks5Dialer {
        let dialer = Socks5Dialer::new(self.socks_endpoint()).with_forward(direct);
        match (&self.tunnel.username, &self.tunnel.socks_password) {
            (Some(user), Some(pass)) => dialer.with_auth(user, pass),
            _ => dialer,
        }
    }

    /// Build a dispatcher with both dialers and all configured rules
    ///
    /// A missing rule file is logged and skipped; the gateway still starts
    /// and routes everything by the remaining rules.
    pub fn build_dispatcher(&self) -> Result<PerHost> {
        let direct = Arc::new(self.direct_dialer());
        let tunnel = Arc::new(self.tunnel_dialer(Arc::clone(&direct)));
        let mut per_host = PerHost::new(direct, tunnel);

        if let Some(path) = &self.rules.file {
            if path.exists() {
                per_host.load_rules_file(path)?;
            } else {
                warn!("Rule file not found: {}", path.display());
            }
        }

        for line in &self.rules.inline {
            per_host.add_rule(line);
        }

        info!(
            "Dispatcher ready: {} rules, tunnel at {}",
            per_host.rules().len(),
            self.socks_endpoint()
        );
        Ok(per_host)
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Local listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Address the local front ends bind
    pub local_addr: String,
    /// HTTP proxy port
    pub http_port: u16,
    /// Port of the tunnel's local SOCKS5 endpoint
    pub socks_port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            local_addr: "127.0.0.1".to_string(),
            http_port: 1080,
            socks_port: 1081,
        }
    }
}

/// Upstream tunnel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Upstream server host
    pub server_addr: String,
    /// Upstream server port
    pub server_port: u16,
    /// Cipher name
    pub method: String,
    /// Cipher password
    pub password: String,
    /// Override for the local SOCKS5 endpoint (`host:port`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socks_endpoint: Option<String>,
    /// SOCKS5 username, if the endpoint requires authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// SOCKS5 password, if the endpoint requires authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socks_password: Option<String>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            server_addr: String::new(),
            server_port: 8388,
            method: "aes-256-gcm".to_string(),
            password: String::new(),
            socks_endpoint: None,
            username: None,
            socks_password: None,
        }
    }
}

/// Bypass rule sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule file, one `KIND,VALUE` per line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Rules given directly in the configuration
    pub inline: Vec<String>,
}

/// Direct dialer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectConfig {
    /// Connect timeout per address in seconds, 0 for the OS default
    pub connect_timeout_secs: u64,
    /// Set `TCP_NODELAY`
    pub nodelay: bool,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            nodelay: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level
    pub level: String,
    /// Log every routing decision
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            verbose: false,
        }
    }
}
