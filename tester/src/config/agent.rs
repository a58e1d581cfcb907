//! Metrics agent config file

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{path_string, StackIdentity, TlsFixtures};
use crate::error::StackError;

/// Transport the agent uses to forward to the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Udp,
    Tcp,
    Tls,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => write!(f, "udp"),
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Tls => write!(f, "tls"),
        }
    }
}

impl FromStr for Protocol {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Protocol::Udp),
            "tcp" => Ok(Protocol::Tcp),
            "tls" => Ok(Protocol::Tls),
            _ => Err(StackError::UnknownProtocol { input: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentTlsConfig {
    pub cert_file: String,
    pub key_file: String,
    #[serde(rename = "CAFile")]
    pub ca_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentConfig {
    pub deployment: String,
    pub zone: String,
    pub job: String,
    pub index: String,
    #[serde(rename = "IncomingUDPPort")]
    pub incoming_udp_port: u16,
    pub store_urls: Vec<String>,
    pub shared_secret: String,
    pub metric_batch_interval_milliseconds: u32,
    pub runtime_stats_interval_milliseconds: u32,
    pub store_max_concurrent_requests: u32,
    pub protocols: Vec<Protocol>,
    #[serde(rename = "TLSConfig", default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<AgentTlsConfig>,
    #[serde(rename = "TCPBatchIntervalMilliseconds", default, skip_serializing_if = "Option::is_none")]
    pub tcp_batch_interval_milliseconds: Option<u32>,
    #[serde(rename = "TCPBatchSizeBytes", default, skip_serializing_if = "Option::is_none")]
    pub tcp_batch_size_bytes: Option<u32>,
}

impl AgentConfig {
    pub fn new(
        port: u16,
        store_url: &str,
        protocol: Protocol,
        identity: &StackIdentity,
        fixtures: &TlsFixtures,
    ) -> Self {
        let mut config = Self {
            deployment: identity.deployment.clone(),
            zone: identity.zone.clone(),
            job: identity.job_name.clone(),
            index: identity.job_index.clone(),
            incoming_udp_port: port,
            store_urls: vec![store_url.to_string()],
            shared_secret: identity.shared_secret.clone(),
            metric_batch_interval_milliseconds: 10,
            runtime_stats_interval_milliseconds: 10,
            store_max_concurrent_requests: 10,
            protocols: vec![protocol],
            tls_config: None,
            tcp_batch_interval_milliseconds: None,
            tcp_batch_size_bytes: None,
        };

        // TLS rides on TCP, so it needs the batching settings as well
        if protocol == Protocol::Tls {
            config.tls_config = Some(AgentTlsConfig {
                cert_file: path_string(fixtures.client_cert()),
                key_file: path_string(fixtures.client_key()),
                ca_file: path_string(fixtures.ca_cert()),
            });
        }
        if matches!(protocol, Protocol::Tcp | Protocol::Tls) {
            config.tcp_batch_interval_milliseconds = Some(100);
            config.tcp_batch_size_bytes = Some(10240);
        }

        config
    }
}
