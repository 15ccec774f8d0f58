//! Error taxonomy shared by every store and service
//!
//! Four families, kept distinct so callers can react to each:
//! - validation: rejected before any write, carries a stable code
//! - backend-unavailable / operational: drives read-path fallback
//! - immutability: append-only violation, never retried
//! - not-found is NOT an error: lookups return `Option` / empty collections

use thiserror::Error;

/// Stable machine-readable codes for rejected input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationCode {
    InvalidAccountId,
    InvalidContactId,
    InvalidPollNumber,
    InvalidSupportScore,
    InvalidSupportCategory,
    InvalidCategory,
    InvalidDateRange,
    InvalidFilterConfig,
    InvalidListId,
    InvalidListName,
    ListNameTooLong,
    InvalidTotalVoters,
    DuplicateVerificationCode,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::InvalidAccountId => "INVALID_ACCOUNT_ID",
            ValidationCode::InvalidContactId => "INVALID_CONTACT_ID",
            ValidationCode::InvalidPollNumber => "INVALID_POLL_NUMBER",
            ValidationCode::InvalidSupportScore => "INVALID_SUPPORT_SCORE",
            ValidationCode::InvalidSupportCategory => "INVALID_SUPPORT_CATEGORY",
            ValidationCode::InvalidCategory => "INVALID_CATEGORY",
            ValidationCode::InvalidDateRange => "INVALID_DATE_RANGE",
            ValidationCode::InvalidFilterConfig => "INVALID_FILTER_CONFIG",
            ValidationCode::InvalidListId => "INVALID_LIST_ID",
            ValidationCode::InvalidListName => "INVALID_LIST_NAME",
            ValidationCode::ListNameTooLong => "LIST_NAME_TOO_LONG",
            ValidationCode::InvalidTotalVoters => "INVALID_TOTAL_VOTERS",
            ValidationCode::DuplicateVerificationCode => "DUPLICATE_VERIFICATION_CODE",
        }
    }
}

impl std::fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Relational backend not configured or not ready
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Update/delete attempted on an append-only record
    #[error("Immutable record: {0}")]
    Immutable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trigger messages raised by the append-only guards in the relational schema
pub(crate) const APPEND_ONLY_MARKERS: [&str; 2] = ["is append-only", "is immutable"];

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let message = err.to_string();
        if APPEND_ONLY_MARKERS.iter().any(|m| message.contains(m)) {
            return StoreError::Immutable(message);
        }
        if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && message.contains("verification_code")
            {
                return StoreError::Validation(ValidationError::new(
                    ValidationCode::DuplicateVerificationCode,
                    "verification code already exists",
                ));
            }
        }
        StoreError::Database(message)
    }
}

impl StoreError {
    pub fn validation(code: ValidationCode, message: impl Into<String>) -> Self {
        StoreError::Validation(ValidationError::new(code, message))
    }

    /// Failures that justify switching to the other backend for this call
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            StoreError::BackendUnavailable(_)
                | StoreError::Database(_)
                | StoreError::Io(_)
                | StoreError::Serialization(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::Immutable(_) | StoreError::Validation(_))
    }

    /// Stable code for validation failures
    pub fn code(&self) -> Option<&'static str> {
        match self {
            StoreError::Validation(v) => Some(v.code.as_str()),
            StoreError::Immutable(_) => Some("IMMUTABLE_RECORD"),
            StoreError::BackendUnavailable(_) => Some("BACKEND_UNAVAILABLE"),
            _ => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
