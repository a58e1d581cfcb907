//! Coordinator configuration
//!
//! Everything the coordinator needs is passed in explicitly through
//! [`CoordinatorConfig`]; the library never consults the process
//! environment on its own.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ports::PortAllocator;

/// Where captured child output goes besides the service's output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Forward each line as a tracing event tagged with the service label
    #[default]
    Tracing,
    /// Write each line to stderr behind a colored `[o][name]` prefix
    Prefixed,
    /// Keep lines in the buffer only
    Discard,
}

/// How a running service is stopped on release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ReleasePolicy {
    /// SIGKILL straight away
    #[default]
    Kill,
    /// SIGTERM, then SIGKILL once the grace period has passed
    Terminate {
        #[serde(with = "duration_ms")]
        grace: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub worker_index: u16,
    pub ports: PortAllocator,
    pub artifact_dir: PathBuf,
    pub output: OutputMode,
    pub release: ReleasePolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_index: 1,
            ports: PortAllocator::default(),
            artifact_dir: std::env::temp_dir(),
            output: OutputMode::default(),
            release: ReleasePolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn new(worker_index: u16) -> Self {
        Self {
            worker_index,
            ..Self::default()
        }
    }

    /// Configure port allocation (fluent API)
    pub fn with_ports(mut self, ports: PortAllocator) -> Self {
        self.ports = ports;
        self
    }

    /// Configure where config artifacts are written (fluent API)
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Configure child output forwarding (fluent API)
    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Configure how services are stopped (fluent API)
    pub fn with_release(mut self, release: ReleasePolicy) -> Self {
        self.release = release;
        self
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
