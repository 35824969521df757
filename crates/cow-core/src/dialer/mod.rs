//! Connection factories
//!
//! A [`Dialer`] turns a `(network, address)` pair into an outbound stream.
//! The dispatcher holds two of them, one for direct traffic and one for
//! the tunnel, and does not care how either connects.

mod direct;
mod socks5;

pub use direct::DirectDialer;
pub use socks5::Socks5Dialer;

use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream returned by a dialer
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send + Debug {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Debug> AsyncStream for T {}

/// An established outbound connection, owned by the caller
pub type Connection = Box<dyn AsyncStream>;

/// Capability to open outbound connections
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connect to `address` (`host:port`) over `network` (`tcp`, `tcp4`, `tcp6`).
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the failed connect or handshake.
    async fn dial(&self, network: &str, address: &str) -> io::Result<Connection>;
}

/// Which address families a network name allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
    Any,
    V4,
    V6,
}

impl Family {
    /// Parse a stream network name; anything but `tcp*` is unsupported
    pub(crate) fn from_network(network: &str) -> io::Result<Self> {
        match network {
            "tcp" => Ok(Self::Any),
            "tcp4" => Ok(Self::V4),
            "tcp6" => Ok(Self::V6),
            other => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported network '{other}'"),
            )),
        }
    }

    pub(crate) fn allows(self, addr: &std::net::SocketAddr) -> bool {
        match self {
            Self::Any => true,
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }
}
