//! Error types for the event model

use thiserror::Error;

/// Result type for event key construction
pub type EventKeyResult<T> = Result<T, EventKeyError>;

/// Errors raised while building an [`EventKey`](crate::EventKey)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventKeyError {
    /// The resource uid is empty
    #[error("Resource uid cannot be empty")]
    EmptyUid,

    /// The resource uid has leading or trailing whitespace
    #[error("Resource uid cannot have leading or trailing whitespace: {0:?}")]
    Whitespace(String),

    /// The resource uid exceeds the maximum length
    #[error("Resource uid too long ({length} chars, max {max})")]
    TooLong { length: usize, max: usize },
}
