//! Readiness coordinator for dependent network services
//!
//! Starts a set of services in dependency order, blocks until each one
//! proves it is ready through its own probes, and hands back a [`Session`]
//! whose teardown stops everything in reverse order. Ports come from a
//! per-worker [`PortAllocator`] block so parallel sessions never collide.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod output;
pub mod plan;
pub mod ports;
pub mod probe;
pub mod service;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::{CoordinatorConfig, OutputMode, ReleasePolicy};
pub use coordinator::{Coordinator, Session, TeardownReport};
pub use error::{CoordinatorError, CoordinatorResult};
pub use output::OutputBuffer;
pub use plan::{PortTable, SessionPlan};
pub use ports::{PortAllocator, WorkerPorts};
pub use probe::{
    evaluate, HttpStatusProbe, LogMatchProbe, LogPattern, ProbeKind, ProbeOutcome, ProbeSpec, ProbeTarget,
    ProbeTiming, TcpDialProbe, UdpDialProbe,
};
pub use service::{launch, LaunchOptions, RunningService, ServiceSpec, ServiceSpecBuilder};
pub use services::{ConfigArtifact, EnvExecutableLocator, JsonConfigCodec, StaticExecutableLocator, TracingObserver};
pub use traits::{ConfigCodec, ExecutableLocator, LifecycleObserver, Probe};
