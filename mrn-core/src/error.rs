//! Error taxonomy shared by every component.
//!
//! Each component has its own `thiserror` enum; all of them map onto one of the
//! five [`ErrorKind`]s so callers can pick a UI state (loading / not found /
//! ambiguous / retryable / fatal) without matching every variant.

use thiserror::Error;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed identifier or query. Rejected before any I/O, never retried.
    Validation,
    /// A valid query matched nothing.
    NotFound,
    /// More than one record matched where exactly one was expected.
    Duplicate,
    /// Store unreachable or device timeout. Safe to retry with backoff.
    Transient,
    /// Permission denied, no camera. Needs explicit user action.
    Fatal,
}

impl ErrorKind {
    /// Whether automatic retry is permitted for this kind.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Duplicate => "duplicate",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// Implemented by every error type in the crate.
pub trait Classify {
    fn kind(&self) -> ErrorKind;

    fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Reasons a raw string is not a medical identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Identifier is empty")]
    Empty,

    #[error("Identifier must be exactly {expected} characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("Identifier contains non-alphanumeric characters")]
    NonAlphanumeric,

    #[error("Identifier has no digit (all-letter tokens are rejected)")]
    MissingDigit,

    #[error("Identifier has no letter")]
    MissingLetter,
}

impl Classify for IdentifierError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
