//! TCP dial probe: ready once a connection can be opened

use async_trait::async_trait;
use tokio::net::TcpStream;

use super::{ProbeKind, ProbeTarget, ProbeTiming};
use crate::traits::Probe;

#[derive(Debug, Clone)]
pub struct TcpDialProbe {
    address: String,
    timing: ProbeTiming,
}

impl TcpDialProbe {
    /// `address` is anything `TcpStream::connect` resolves, e.g. `localhost:55005`
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
}

#[async_trait]
impl Probe for TcpDialProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::TcpDial
    }

    fn timing(&self) -> ProbeTiming {
        self.timing
    }

    async fn attempt(&self, _target: &ProbeTarget) -> Result<(), String> {
        // The connection is closed again as soon as it is dropped
        TcpStream::connect(self.address.as_str())
            .await
            .map(drop)
            .map_err(|e| format!("dial tcp {}: {}", self.address, e))
    }
}
