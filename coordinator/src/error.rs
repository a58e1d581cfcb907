//! Coordinator-specific error types

use shared::SharedError;
use std::time::Duration;
use thiserror::Error;

use crate::probe::ProbeKind;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("No executable for service '{service}': {hint}")]
    MissingExecutable { service: String, hint: String },

    #[error("Failed to write config artifact for service '{service}': {message}")]
    ConfigWriteFailure { service: String, message: String },

    #[error("Failed to launch service '{service}' from {executable}: {message}")]
    LaunchFailure {
        service: String,
        executable: String,
        message: String,
    },

    #[error(
        "Service '{service}' not ready: {probe} probe timed out after {timeout:?} (last error: {})",
        .last_error.as_deref().unwrap_or("none")
    )]
    ProbeTimeout {
        service: String,
        probe: ProbeKind,
        timeout: Duration,
        last_error: Option<String>,
    },

    #[error("Service '{service}' exited while waiting for its {probe} probe: {status}")]
    ServiceExited {
        service: String,
        probe: ProbeKind,
        status: String,
    },

    #[error("Failed to release service '{service}': {message}")]
    ReleaseFailure { service: String, message: String },

    #[error("Port role offset {offset} must be below stride {stride}")]
    InvalidPortOffset { offset: u16, stride: u16 },

    #[error("Port for worker {worker_index} at offset {offset} is outside the valid range")]
    PortOutOfRange { worker_index: u16, offset: u16 },

    #[error("Invalid service spec: {message}")]
    InvalidSpec { message: String },

    #[error("Session plan error: {message}")]
    PlanError { message: String },

    #[error("{0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoordinatorError {
    pub fn spec(message: impl Into<String>) -> Self {
        CoordinatorError::InvalidSpec {
            message: message.into(),
        }
    }

    pub fn plan(message: impl Into<String>) -> Self {
        CoordinatorError::PlanError {
            message: message.into(),
        }
    }

    /// Name of the service the error concerns, when there is one
    pub fn service(&self) -> Option<&str> {
        match self {
            CoordinatorError::MissingExecutable { service, .. }
            | CoordinatorError::ConfigWriteFailure { service, .. }
            | CoordinatorError::LaunchFailure { service, .. }
            | CoordinatorError::ProbeTimeout { service, .. }
            | CoordinatorError::ServiceExited { service, .. }
            | CoordinatorError::ReleaseFailure { service, .. } => Some(service),
            _ => None,
        }
    }

    /// Kind of the probe that failed, for readiness failures
    pub fn probe_kind(&self) -> Option<&ProbeKind> {
        match self {
            CoordinatorError::ProbeTimeout { probe, .. } | CoordinatorError::ServiceExited { probe, .. } => Some(probe),
            _ => None,
        }
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
