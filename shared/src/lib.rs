//! Shared types for the readiness coordinator workspace
//!
//! Holds what both the coordinator library and the stack harness need:
//! service labels for merged output, logging setup and the small error type
//! used when parsing those from user input.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
