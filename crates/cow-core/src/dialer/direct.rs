//! Direct dialer: plain TCP connect to the destination

use super::{Connection, Dialer, Family};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::{debug, trace};

/// Connects straight to the destination
#[derive(Debug, Clone, Default)]
pub struct DirectDialer {
    /// Per-address connect timeout; `None` leaves it to the OS
    connect_timeout: Option<Duration>,
    /// Set `TCP_NODELAY` on connected sockets
    nodelay: bool,
}

impl DirectDialer {
    /// Create a dialer with OS default timeouts
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-address connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = Some(connect_timeout);
        self
    }

    /// Enable or disable `TCP_NODELAY`
    #[must_use]
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Resolve and connect, trying each resolved address in order
    pub(crate) async fn connect(&self, network: &str, address: &str) -> io::Result<TcpStream> {
        let family = Family::from_network(network)?;

        let mut last_err = None;
        for addr in lookup_host(address).await?.filter(|a| family.allows(a)) {
            trace!("Connecting to {} ({})", addr, address);
            let attempt = match self.connect_timeout {
                Some(limit) => match timeout(limit, TcpStream::connect(addr)).await {
                    Ok(res) => res,
                    Err(_) => Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect to {addr} timed out"),
                    )),
                },
                None => TcpStream::connect(addr).await,
            };

            match attempt {
                Ok(stream) => {
                    if self.nodelay {
                        stream.set_nodelay(true)?;
                    }
                    debug!("Direct connection to {} via {}", address, addr);
                    return Ok(stream);
                }
                Err(e) => {
                    debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no {network} address found for {address}"),
            )
        }))
    }
}

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, network: &str, address: &str) -> io::Result<Connection> {
        let stream = self.connect(network, address).await?;
        Ok(Box::new(stream))
    }
}
