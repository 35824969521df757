//! `host:port` splitting
//!
//! Dial targets arrive as text. Only the host part takes part in routing,
//! so the port is split off here and otherwise left alone: an empty or
//! non-numeric port is the dialer's problem, not the router's.

use crate::error::{Error, Result};

const MISSING_PORT: &str = "missing port in address";
const TOO_MANY_COLONS: &str = "too many colons in address";

/// Split `address` into host and port.
///
/// Accepts `host:port`, `1.2.3.4:port` and `[v6]:port`. Brackets are
/// stripped from IPv6 hosts. IPv6 literals must be bracketed.
///
/// # Errors
///
/// Returns [`Error::AddressFormat`] when the address has no port, has an
/// unbracketed host containing colons, or has unbalanced brackets.
pub fn split_host_port(address: &str) -> Result<(&str, &str)> {
    let err = |reason| Err(Error::address_format(address, reason));

    let Some(colon) = address.rfind(':') else {
        return err(MISSING_PORT);
    };

    let (host, host_start, host_end) = if address.starts_with('[') {
        let Some(close) = address.find(']') else {
            return err("missing ']' in address");
        };
        if close + 1 == address.len() {
            return err(MISSING_PORT);
        }
        if close + 1 != colon {
            if address.as_bytes()[close + 1] == b':' {
                return err(TOO_MANY_COLONS);
            }
            return err(MISSING_PORT);
        }
        (&address[1..close], 1, close + 1)
    } else {
        let host = &address[..colon];
        if host.contains(':') {
            return err(TOO_MANY_COLONS);
        }
        (host, 0, 0)
    };

    if address[host_start..].contains('[') {
        return err("unexpected '[' in address");
    }
    if address[host_end..].contains(']') {
        return err("unexpected ']' in address");
    }

    Ok((host, &address[colon + 1..]))
}
