//! Error types for policy mutation.

use thiserror::Error;

/// Errors returned when mutating the denylist.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The store already holds its maximum number of words.
    #[error("denylist is full ({0} words)")]
    Full(usize),

    /// The word exceeds the per-word length bound.
    #[error("word exceeds {max} bytes")]
    WordTooLong {
        /// The configured maximum word length.
        max: usize,
    },

    /// An empty word cannot be denylisted.
    #[error("word is empty")]
    EmptyWord,
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
