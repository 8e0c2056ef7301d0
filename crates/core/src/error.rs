//! Domain and storage error models.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type returned by every record-store operation.
pub type StoreResult<T> = Result<T, StoreError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants). Infrastructure concerns belong in [`StoreError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Classified outcome of a failed record-store operation.
///
/// Every storage backend maps its low-level failures into this taxonomy;
/// callers never see driver error types. The store never retries internally:
/// each variant is returned to the immediate caller, which decides whether to
/// retry or surface the failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No active row matched the lookup (missing or soft-deleted).
    #[error("record not found")]
    NotFound,

    /// A version-gated write affected zero rows.
    ///
    /// Deliberately indistinguishable from "no such id": the conditional
    /// UPDATE cannot tell a stale version from a missing row, and callers
    /// must not assume which occurred.
    #[error("record conflict: version mismatch")]
    Conflict,

    /// A natural-key uniqueness constraint was violated among active rows.
    #[error("record already exists")]
    Duplicate,

    /// The operation's context deadline expired before the I/O completed.
    #[error("operation cancelled")]
    Cancelled,

    /// Any storage failure not otherwise recognized. The message is for
    /// logs only and must never reach a client.
    #[error("storage error: {0}")]
    Unknown(String),
}

impl StoreError {
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }
}
