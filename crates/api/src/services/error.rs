use thiserror::Error;

use cashnote_core::{DomainError, StoreError};

/// Outcomes the HTTP layer maps onto status codes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    /// Wrong email or wrong password; deliberately one outcome so the API
    /// does not reveal whether an account exists.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0} already exists")]
    Duplicate(&'static str),

    #[error("not found")]
    NotFound,

    /// Version-gated write lost the race (or the record is gone).
    #[error("conflicting update, reload and retry")]
    Conflict,

    #[error("request cancelled")]
    Cancelled,

    /// Never surfaced verbatim to clients.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::Conflict => ServiceError::Conflict,
            StoreError::Duplicate => ServiceError::Duplicate("record"),
            StoreError::Cancelled => ServiceError::Cancelled,
            StoreError::Unknown(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}
