//! Domain and store error model.

use thiserror::Error;

use crate::query::QueryError;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// lookups, conflicts). Infrastructure concerns belong in [`StoreError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// One or more fields failed validation. Each entry is a user-facing sentence.
    #[error("Invalid input data. {}", .0.join(" "))]
    Validation(Vec<String>),

    /// An identifier could not be parsed.
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// A requested resource was not found.
    #[error("No {0} found with that ID")]
    NotFound(&'static str),

    /// A uniqueness rule was violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(vec![msg.into()])
    }

    pub fn invalid_id(value: impl Into<String>) -> Self {
        Self::InvalidId(value.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound(entity)
    }
}

/// Failure raised by a document store or a repository built on one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("duplicate value {value:?} for unique field `{field}`")]
    Duplicate { field: String, value: String },

    /// The query handle could not be executed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A stored document does not decode into the expected record.
    #[error("stored document is malformed: {0}")]
    Corrupt(String),

    /// Connection, timeout or other backend failure.
    #[error("store backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}
