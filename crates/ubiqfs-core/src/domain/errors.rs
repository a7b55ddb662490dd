//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures, invalid state transitions, and path errors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Malformed cloud container identifier
    #[error("Invalid container identifier: {0}")]
    InvalidContainerId(String),
}
