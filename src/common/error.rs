//! Error types for rsgroup

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Membership Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // === Transition Errors ===
    /// The membership change was applied but live placement did not converge
    /// before the deadline.
    #[error("Timed out after {waited:?} waiting for server transition to finish: {servers:?}")]
    TransitionTimeout {
        servers: Vec<String>,
        waited: Duration,
    },

    #[error("Wait for server transition was cancelled")]
    Cancelled,

    // === Scheduler Errors ===
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Is this a retryable error?
    ///
    /// `TransitionTimeout` is deliberately not retryable: the change is
    /// already applied and retrying does not unstick the scheduler.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConnectionFailed(_))
    }

    /// True when the registry was updated even though the call failed.
    pub fn is_applied(&self) -> bool {
        matches!(self, Error::TransitionTimeout { .. } | Error::Cancelled)
    }
}
