//! Shared error types for the readiness coordinator workspace

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Invalid service label: {input}")]
    InvalidLabel { input: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
