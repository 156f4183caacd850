//! Unified error taxonomy for profiling runs

use thiserror::Error;

/// Result type for profiling operations
pub type ProfileResult<T> = std::result::Result<T, ProfileError>;

/// Errors produced while profiling a database
///
/// Task-local failures are reported through the orchestrator join as the
/// run's first error. Sibling tasks that already committed their fact data
/// keep it - a failed run means "incomplete", not "rolled back".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    /// Store unreachable or misconfigured; fatal to the whole run
    #[error("connection error: {0}")]
    Connection(String),

    /// The type mapper cannot classify a value or scan kind
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// DDL failure against the profile store
    #[error("schema error: {0}")]
    Schema(String),

    /// Sample, aggregate, or lookup query failure
    #[error("query error: {0}")]
    Query(String),

    /// The registry observed more than one row for a single natural key
    #[error("duplicate dimension rows for natural key {0}")]
    DuplicateDimensionRace(String),

    /// An identifier failed allowlist validation before SQL generation
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The profile definition file could not be read or parsed
    #[error("profile definition error: {0}")]
    Definition(String),

    /// The run was aborted by the caller
    #[error("profile run cancelled")]
    Cancelled,
}

impl ProfileError {
    /// Whether retrying the failed operation could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProfileError::DuplicateDimensionRace(_))
    }
}
