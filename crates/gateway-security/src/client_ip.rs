//! Client identity for rate limiting.
//!
//! Forwarding headers are only believed when the TCP peer is a trusted
//! proxy. Any other peer is keyed by its own address, so rotating
//! `x-forwarded-for` does not buy a fresh rate-limit window.

use crate::error::{Result, SecurityError};
use gateway_core::ClientKey;
use http::HeaderMap;
use ipnetwork::IpNetwork;
use std::net::IpAddr;
use std::str::FromStr;

/// Proxies whose forwarding headers are trusted
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    proxies: Vec<IpNetwork>,
}

impl TrustedProxies {
    /// Trust nobody
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse addresses or CIDR networks.
    ///
    /// # Errors
    /// Returns a config error naming the first entry that does not parse
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        let proxies = entries
            .iter()
            .map(|entry| parse_ip_or_network(entry.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { proxies })
    }

    /// Whether `ip` belongs to a trusted proxy
    #[must_use]
    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        self.proxies.iter().any(|network| network.contains(ip))
    }

    /// Resolve the rate-limit key of a request.
    ///
    /// An untrusted peer is keyed by its address. Behind a trusted proxy (or
    /// with no peer known) the key comes from `cf-connecting-ip`, then the
    /// nearest untrusted `x-forwarded-for` hop, then `x-real-ip`, then the
    /// peer itself.
    #[must_use]
    pub fn client_key(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> ClientKey {
        if let Some(peer) = peer.filter(|ip| !self.is_trusted(*ip)) {
            return ClientKey::new(peer.to_string());
        }

        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        header("cf-connecting-ip")
            .map(ToString::to_string)
            .or_else(|| header("x-forwarded-for").and_then(|xff| self.forwarded_for(xff)))
            .or_else(|| header("x-real-ip").map(ToString::to_string))
            .or_else(|| peer.map(|ip| ip.to_string()))
            .map_or_else(ClientKey::anonymous, ClientKey::new)
    }

    /// Walk the chain from the nearest hop and stop at the first address not
    /// owned by a trusted proxy
    fn forwarded_for(&self, xff: &str) -> Option<String> {
        let hops: Vec<&str> = xff
            .split(',')
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .collect();

        hops.iter()
            .rev()
            .find(|hop| !hop.parse::<IpAddr>().is_ok_and(|ip| self.is_trusted(ip)))
            .or_else(|| hops.first())
            .map(|hop| (*hop).to_string())
    }
}

fn parse_ip_or_network(s: &str) -> Result<IpNetwork> {
    let s = s.trim();
    if let Ok(ip) = IpAddr::from_str(s) {
        return Ok(IpNetwork::from(ip));
    }
    IpNetwork::from_str(s)
        .map_err(|e| SecurityError::config(format!("Invalid trusted proxy '{s}': {e}")))
}
