//! Error handler for userstore.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Enum representing every failure surfaced by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filter is empty, names an unknown field or carries a mistyped value.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// No record matched the filter.
    #[error("no user found")]
    NotFound,

    /// Update names a field the record does not have, or cannot change.
    #[error("invalid attribute '{0}'")]
    InvalidAttribute(String),

    /// Backing store failure, passed through as-is.
    #[error("SQL request failed: {0}")]
    Sql(#[from] sqlx::Error),
}
