use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

const LOCALHOST: &str = "localhost";

/// `host:port` of a sibling node. The host is a literal IPv4/IPv6 address
/// or `localhost`; ordering is by host, then port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerAddress {
    host: String,
    port: u16,
}

impl PeerAddress {
    pub fn new(host: &str, port: u16) -> Result<PeerAddress> {
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let valid_host = host == LOCALHOST
            || host.parse::<Ipv4Addr>().is_ok()
            || host.parse::<Ipv6Addr>().is_ok();
        if !valid_host {
            return Err(LedgerError::MalformedAddress(format!("{host}:{port}")));
        }
        Ok(PeerAddress {
            host: host.to_string(),
            port,
        })
    }

    /// Accepts `v4:port`, `localhost:port`, `[v6]:port` and bare `v6:port`
    pub fn parse(text: &str) -> Result<PeerAddress> {
        let malformed = || LedgerError::MalformedAddress(text.to_string());
        let text = text.trim();
        let text = text
            .strip_prefix("http://")
            .unwrap_or(text)
            .trim_end_matches('/');

        let (host, port) = match text.strip_prefix('[') {
            Some(rest) => rest.split_once("]:").ok_or_else(malformed)?,
            None => text.rsplit_once(':').ok_or_else(malformed)?,
        };
        let port = port.parse::<u16>().map_err(|_| malformed())?;
        Self::new(host, port).map_err(|_| malformed())
    }

    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL the HTTP transport talks to
    pub fn base_url(&self) -> String {
        format!("http://{self}")
    }

    /// Key under which the peer is stored
    pub fn key(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for PeerAddress {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<PeerAddress> {
        PeerAddress::parse(s)
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<PeerAddress> {
        PeerAddress::parse(&value)
    }
}

impl From<PeerAddress> for String {
    fn from(value: PeerAddress) -> String {
        value.to_string()
    }
}
