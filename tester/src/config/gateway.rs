//! Traffic gateway config file

use serde::{Deserialize, Serialize};

use super::StackIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayConfig {
    pub store_urls: Vec<String>,
    pub store_max_concurrent_requests: u32,
    pub job_name: String,
    pub index: String,
    /// Aggregator's outgoing port
    pub aggregator_port: u16,
    pub outgoing_port: u16,
    pub agent_host: String,
    pub agent_port: u16,
    pub system_domain: String,
    pub skip_cert_verify: bool,
}

impl GatewayConfig {
    pub fn new(
        outgoing_port: u16,
        aggregator_port: u16,
        agent_port: u16,
        store_url: &str,
        identity: &StackIdentity,
    ) -> Self {
        Self {
            store_urls: vec![store_url.to_string()],
            store_max_concurrent_requests: 10,
            job_name: identity.job_name.clone(),
            index: identity.job_index.clone(),
            aggregator_port,
            outgoing_port,
            agent_host: "localhost".to_string(),
            agent_port,
            system_domain: "vcap.me".to_string(),
            skip_cert_verify: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_at_aggregator_and_agent() {
        let config = GatewayConfig::new(55113, 55111, 55112, "http://localhost:55106", &StackIdentity::default());
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["AggregatorPort"], 55111);
        assert_eq!(json["OutgoingPort"], 55113);
        assert_eq!(json["AgentHost"], "localhost");
        assert_eq!(json["AgentPort"], 55112);
        assert_eq!(json["SkipCertVerify"], true);
        assert_eq!(json["SystemDomain"], "vcap.me");
    }
}
