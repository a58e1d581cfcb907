//! Common test utilities and infrastructure
//!
//! Stand-in services are `/bin/sh` scripts; the recording observer captures
//! lifecycle events so ordering can be asserted.

#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::TestFixtures;
pub use helpers::{Event, RecordingObserver, TestHelpers};
