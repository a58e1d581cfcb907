//! Stack harness error types

use coordinator::CoordinatorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("Unknown agent protocol '{input}' (expected udp, tcp or tls)")]
    UnknownProtocol { input: String },

    #[error("Unknown stack service '{input}' (expected store, aggregator, agent or gateway)")]
    UnknownService { input: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StackResult<T> = Result<T, StackError>;
