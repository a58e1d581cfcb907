//! Trait definitions with mockall annotations for testing
//!
//! These are the seams the coordinator is built around: how a service name
//! becomes an executable, how a config payload becomes a file, how readiness
//! is checked, and who hears about lifecycle transitions.

use shared::ServiceLabel;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::probe::{ProbeKind, ProbeTarget, ProbeTiming};
use crate::services::codec::ConfigArtifact;

/// Resolves a named service to the executable that runs it
#[mockall::automock]
pub trait ExecutableLocator: Send + Sync {
    /// Fails with `MissingExecutable` when nothing is registered for `service`
    fn locate(&self, service: &str) -> CoordinatorResult<PathBuf>;
}

/// Turns a service's config payload into a file the service can read
#[mockall::automock]
pub trait ConfigCodec: Send + Sync {
    /// Write `config` for `label` and return the artifact that owns the file
    fn write(&self, label: &ServiceLabel, config: &serde_json::Value) -> CoordinatorResult<ConfigArtifact>;
}

/// One readiness check
///
/// A probe is stateless: [`crate::probe::evaluate`] calls `attempt` over and
/// over until it succeeds or the deadline derived from `timing` passes. New
/// kinds of readiness signal only need a new implementation of this trait.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    fn kind(&self) -> ProbeKind;

    fn timing(&self) -> ProbeTiming;

    /// A single check; `Err` carries why the service is not ready yet
    async fn attempt(&self, target: &ProbeTarget) -> Result<(), String>;
}

/// Observer for service lifecycle transitions within a session
#[mockall::automock]
pub trait LifecycleObserver: Send + Sync {
    fn on_launched(&self, service: &str, pid: Option<u32>);

    fn on_ready(&self, service: &str, probe: &ProbeKind, elapsed: Duration);

    fn on_failed(&self, service: &str, error: &CoordinatorError);

    fn on_released(&self, service: &str);
}
