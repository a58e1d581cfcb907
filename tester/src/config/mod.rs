//! Typed configuration for the services of the stack
//!
//! Each service reads a JSON file whose field names follow the services'
//! own conventions (`IncomingUDPPort`, `StoreUrls`, ...), so every struct
//! here pins its serialized names explicitly.

pub mod agent;
pub mod aggregator;
pub mod gateway;
pub mod store;

pub use agent::{AgentConfig, AgentTlsConfig, Protocol};
pub use aggregator::{AggregatorConfig, AggregatorPorts, TlsListenerConfig};
pub use gateway::GatewayConfig;
pub use store::StoreSettings;

use std::path::{Path, PathBuf};

/// Identity shared by every service in one stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackIdentity {
    pub shared_secret: String,
    pub zone: String,
    pub job_name: String,
    pub job_index: String,
    pub deployment: String,
}

impl Default for StackIdentity {
    fn default() -> Self {
        Self {
            shared_secret: "test-shared-secret".to_string(),
            zone: "test-availability-zone".to_string(),
            job_name: "test-job-name".to_string(),
            job_index: "42".to_string(),
            deployment: "deployment".to_string(),
        }
    }
}

/// Certificate fixtures used by TLS listeners and clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFixtures {
    dir: PathBuf,
}

impl TlsFixtures {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn server_cert(&self) -> PathBuf {
        self.dir.join("server.crt")
    }

    pub fn server_key(&self) -> PathBuf {
        self.dir.join("server.key")
    }

    pub fn client_cert(&self) -> PathBuf {
        self.dir.join("client.crt")
    }

    pub fn client_key(&self) -> PathBuf {
        self.dir.join("client.key")
    }

    pub fn ca_cert(&self) -> PathBuf {
        self.dir.join("ca.crt")
    }
}

impl Default for TlsFixtures {
    fn default() -> Self {
        Self::new("../fixtures")
    }
}

fn path_string(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}
