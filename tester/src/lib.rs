//! Four-service stack on top of the readiness coordinator
//!
//! Brings up a discovery store, an aggregator, a metrics agent and a traffic
//! gateway for one worker, each proven ready before the next one starts.

pub mod config;
pub mod error;
pub mod stack;

pub use config::{Protocol, StackIdentity, TlsFixtures};
pub use error::{StackError, StackResult};
pub use stack::{build_specs, Stack, StackOptions, StackPorts, StackService, StackSpecs};
