//! SOCKS5 dialer (RFC 1928, RFC 1929)
//!
//! The tunnel is exposed locally as a SOCKS5 endpoint. This dialer reaches
//! that endpoint through an inner dialer (direct by default) and asks it to
//! CONNECT to the real destination.

use super::{Connection, Dialer, DirectDialer, Family};
use crate::addr::split_host_port;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace};

/// SOCKS5 protocol version
const SOCKS5_VERSION: u8 = 0x05;

/// No authentication required
const AUTH_METHOD_NONE: u8 = 0x00;
/// Username/password authentication
const AUTH_METHOD_PASSWORD: u8 = 0x02;
/// Server rejects all offered methods
const AUTH_METHOD_NO_ACCEPTABLE: u8 = 0xFF;
/// Username/password sub-negotiation version
const AUTH_PASSWORD_VERSION: u8 = 0x01;

/// CONNECT command
const CMD_CONNECT: u8 = 0x01;

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

const REPLY_SUCCEEDED: u8 = 0x00;

/// Human-readable text for a SOCKS5 reply code
fn reply_message(code: u8) -> &'static str {
    match code {
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown error",
    }
}

fn protocol_error(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

/// Username/password credentials
#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Dials through a SOCKS5 proxy
pub struct Socks5Dialer {
    /// Proxy endpoint, `host:port`
    endpoint: String,
    /// Optional RFC 1929 credentials
    auth: Option<Credentials>,
    /// Dialer used to reach the proxy itself
    forward: Arc<dyn Dialer>,
}

impl fmt::Debug for Socks5Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socks5Dialer")
            .field("endpoint", &self.endpoint)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl Socks5Dialer {
    /// Create a dialer for the proxy at `endpoint`, reached directly
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth: None,
            forward: Arc::new(DirectDialer::new()),
        }
    }

    /// Authenticate with username and password
    #[must_use]
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Reach the proxy through another dialer
    #[must_use]
    pub fn with_forward(mut self, forward: Arc<dyn Dialer>) -> Self {
        self.forward = forward;
        self
    }

    /// Proxy endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Version/method negotiation, plus authentication if selected
    async fn handshake(&self, stream: &mut Connection) -> io::Result<()> {
        let methods: &[u8] = if self.auth.is_some() {
            &[SOCKS5_VERSION, 2, AUTH_METHOD_NONE, AUTH_METHOD_PASSWORD]
        } else {
            &[SOCKS5_VERSION, 1, AUTH_METHOD_NONE]
        };
        trace!("Sending SOCKS5 method selection: {:?}", methods);
        stream.write_all(methods).await?;

        let mut response = [0u8; 2];
        stream.read_exact(&mut response).await?;
        trace!("SOCKS5 method response: {:?}", response);

        if response[0] != SOCKS5_VERSION {
            return Err(protocol_error(format!(
                "unexpected SOCKS version {:#04x}",
                response[0]
            )));
        }

        match (response[1], &self.auth) {
            (AUTH_METHOD_NONE, _) => Ok(()),
            (AUTH_METHOD_PASSWORD, Some(creds)) => Self::authenticate(stream, creds).await,
            (AUTH_METHOD_NO_ACCEPTABLE, _) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "SOCKS5 server accepted no offered authentication method",
            )),
            (other, _) => Err(protocol_error(format!(
                "unsupported SOCKS5 auth method {other:#04x}"
            ))),
        }
    }

    /// Username/password sub-negotiation
    async fn authenticate(stream: &mut Connection, creds: &Credentials) -> io::Result<()> {
        let user = creds.username.as_bytes();
        let pass = creds.password.as_bytes();
        let (Ok(user_len), Ok(pass_len)) = (u8::try_from(user.len()), u8::try_from(pass.len()))
        else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "SOCKS5 username and password must be at most 255 bytes",
            ));
        };

        let mut request = Vec::with_capacity(3 + user.len() + pass.len());
        request.push(AUTH_PASSWORD_VERSION);
        request.push(user_len);
        request.extend_from_slice(user);
        request.push(pass_len);
        request.extend_from_slice(pass);
        stream.write_all(&request).await?;

        let mut response = [0u8; 2];
        stream.read_exact(&mut response).await?;
        if response[1] != 0x00 {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "SOCKS5 authentication failed",
            ));
        }
        Ok(())
    }

    /// Send CONNECT and read the reply
    async fn connect(stream: &mut Connection, host: &str, port: u16) -> io::Result<()> {
        stream.write_all(&build_connect_request(host, port)?).await?;

        // VER | REP | RSV | ATYP
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).await?;
        trace!("SOCKS5 reply header: {:?}", header);

        if header[0] != SOCKS5_VERSION {
            return Err(protocol_error(format!(
                "unexpected SOCKS version {:#04x}",
                header[0]
            )));
        }
        if header[1] != REPLY_SUCCEEDED {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("SOCKS5 CONNECT to {host}:{port} failed: {}", reply_message(header[1])),
            ));
        }

        // Skip BND.ADDR and BND.PORT
        let addr_len = match header[3] {
            ATYP_IPV4 => 4,
            ATYP_IPV6 => 16,
            ATYP_DOMAIN => {
                let mut len = [0u8; 1];
                stream.read_exact(&mut len).await?;
                usize::from(len[0])
            }
            other => {
                return Err(protocol_error(format!(
                    "unknown SOCKS5 address type {other:#04x}"
                )))
            }
        };
        let mut bound = vec![0u8; addr_len + 2];
        stream.read_exact(&mut bound).await?;

        Ok(())
    }
}

/// Build a CONNECT request; IP literals use their own address types
fn build_connect_request(host: &str, port: u16) -> io::Result<Vec<u8>> {
    let mut request = Vec::with_capacity(7 + host.len());

    // VER | CMD | RSV
    request.extend_from_slice(&[SOCKS5_VERSION, CMD_CONNECT, 0x00]);

    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&v4.octets());
        }
        Ok(IpAddr::V6(v6)) => {
            request.push(ATYP_IPV6);
            request.extend_from_slice(&v6.octets());
        }
        Err(_) => {
            let len = u8::try_from(host.len())
                .ok()
                .filter(|&len| len > 0)
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("host name '{host}' must be 1-255 bytes"),
                    )
                })?;
            request.push(ATYP_DOMAIN);
            request.push(len);
            request.extend_from_slice(host.as_bytes());
        }
    }

    request.extend_from_slice(&port.to_be_bytes());
    Ok(request)
}

#[async_trait]
impl Dialer for Socks5Dialer {
    async fn dial(&self, network: &str, address: &str) -> io::Result<Connection> {
        Family::from_network(network)?;

        let (host, port) = split_host_port(address)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let port: u16 = port.parse().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid port in {address}"))
        })?;

        let mut stream = self.forward.dial("tcp", &self.endpoint).await?;
        self.handshake(&mut stream).await?;
        Self::connect(&mut stream, host, port).await?;

        debug!("SOCKS5 connection to {} via {}", address, self.endpoint);
        Ok(stream)
    }
}
