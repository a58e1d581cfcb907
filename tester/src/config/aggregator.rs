//! Aggregator config file

use serde::{Deserialize, Serialize};

use super::{path_string, StackIdentity, TlsFixtures};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TlsListenerConfig {
    pub port: u16,
    pub cert_file: String,
    pub key_file: String,
    #[serde(rename = "CAFile")]
    pub ca_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AggregatorConfig {
    #[serde(rename = "IncomingUDPPort")]
    pub incoming_udp_port: u16,
    #[serde(rename = "IncomingTCPPort")]
    pub incoming_tcp_port: u16,
    pub outgoing_port: u16,
    pub store_urls: Vec<String>,
    #[serde(rename = "EnableTLSTransport")]
    pub enable_tls_transport: bool,
    #[serde(rename = "TLSListenerConfig")]
    pub tls_listener_config: TlsListenerConfig,
    pub max_retained_log_messages: u32,
    pub message_drain_buffer_size: u32,
    pub sink_dial_timeout_seconds: u32,
    #[serde(rename = "SinkIOTimeoutSeconds")]
    pub sink_io_timeout_seconds: u32,
    pub sink_inactivity_timeout_seconds: u32,
    pub unmarshaller_count: u32,
    pub index: String,
    pub job_name: String,
    pub shared_secret: String,
    pub zone: String,
}

/// Listener ports of one aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorPorts {
    pub udp: u16,
    pub tcp: u16,
    pub tls: u16,
    pub outgoing: u16,
}

impl AggregatorConfig {
    pub fn new(ports: AggregatorPorts, store_url: &str, identity: &StackIdentity, fixtures: &TlsFixtures) -> Self {
        Self {
            incoming_udp_port: ports.udp,
            incoming_tcp_port: ports.tcp,
            outgoing_port: ports.outgoing,
            store_urls: vec![store_url.to_string()],
            enable_tls_transport: true,
            tls_listener_config: TlsListenerConfig {
                port: ports.tls,
                cert_file: path_string(fixtures.server_cert()),
                key_file: path_string(fixtures.server_key()),
                ca_file: path_string(fixtures.ca_cert()),
            },
            max_retained_log_messages: 10,
            message_drain_buffer_size: 100,
            sink_dial_timeout_seconds: 10,
            sink_io_timeout_seconds: 10,
            sink_inactivity_timeout_seconds: 10,
            unmarshaller_count: 5,
            index: identity.job_index.clone(),
            job_name: identity.job_name.clone(),
            shared_secret: identity.shared_secret.clone(),
            zone: identity.zone.clone(),
        }
    }
}
