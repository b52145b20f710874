//! Error types for the core domain

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the domain model
#[derive(Debug, Error)]
pub enum Error {
    /// Urn does not match the expected format
    #[error("Invalid urn: {0}")]
    InvalidUrn(String),

    /// Plan has no further task to move to
    #[error("Plan {0} is already complete")]
    PlanAlreadyComplete(String),

    /// Task states do not map to any aggregate plan state
    #[error("Plan {0} is in an inconsistent state")]
    PlanInconsistent(String),

    /// Virtual clock can only move forward
    #[error("Invalid time step: {0}")]
    InvalidTimeStep(String),

    /// Input failed validation
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid urn error
    pub fn invalid_urn(urn: impl Into<String>) -> Self {
        Self::InvalidUrn(urn.into())
    }
}
