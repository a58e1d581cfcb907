//! UDP dial probe
//!
//! UDP has no handshake, so a successful "dial" only proves the address
//! resolves and a local socket can be associated with it. Pair it with a
//! log probe when the service must actually be reading the port.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::{lookup_host, UdpSocket};

use super::{ProbeKind, ProbeTarget, ProbeTiming};
use crate::traits::Probe;

#[derive(Debug, Clone)]
pub struct UdpDialProbe {
    address: String,
    timing: ProbeTiming,
}

impl UdpDialProbe {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timing: ProbeTiming::dial(),
        }
    }

    pub fn with_timing(mut self, timing: ProbeTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn resolve(&self) -> Result<SocketAddr, String> {
        let addrs: Vec<SocketAddr> = lookup_host(self.address.as_str())
            .await
            .map_err(|e| format!("resolve udp {}: {}", self.address, e))?
            .collect();

        // Prefer IPv4 like a udp4 dial would
        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| format!("resolve udp {}: no addresses", self.address))
    }
}

#[async_trait]
impl Probe for UdpDialProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::UdpDial
    }

    fn timing(&self) -> ProbeTiming {
        self.timing
    }

    async fn attempt(&self, _target: &ProbeTarget) -> Result<(), String> {
        let remote = self.resolve().await?;
        let local = if remote.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };

        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| format!("bind udp {}: {}", local, e))?;
        socket
            .connect(remote)
            .await
            .map_err(|e| format!("dial udp {}: {}", self.address, e))
    }
}
