//! Service implementations
//!
//! Real implementations of the collaborator traits in [`crate::traits`].

pub mod codec;
pub mod locator;
pub mod observer;

// Re-export all service implementations
pub use codec::{ConfigArtifact, JsonConfigCodec};
pub use locator::{EnvExecutableLocator, StaticExecutableLocator};
pub use observer::TracingObserver;
