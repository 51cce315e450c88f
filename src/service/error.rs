//! Errors raised by service builders and lifecycle hooks

use crate::error::ContainerError;
use thiserror::Error;

/// Errors a service can raise while being built, initialized or cleaned up
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Construction or `init()` failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// `cleanup()` failed
    #[error("Cleanup failed: {0}")]
    CleanupFailed(String),

    /// A lifecycle phase did not finish in time
    #[error("Timeout during {phase}: {message}")]
    Timeout {
        /// The lifecycle phase where timeout occurred
        phase: String,
        /// Additional error message
        message: String,
    },

    /// A dependency could not be handed to the builder
    #[error(transparent)]
    Dependency(#[from] ContainerError),

    /// Any other error raised by service code
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Create an initialization failure error
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a cleanup failure error
    pub fn cleanup_failed(msg: impl Into<String>) -> Self {
        Self::CleanupFailed(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Timeout {
            phase: phase.into(),
            message: message.into(),
        }
    }

    /// Wrap an arbitrary error raised by service code
    pub fn other(err: impl std::fmt::Display) -> Self {
        Self::Other(err.to_string())
    }
}
