//! Exit codes following sysexits.h conventions.
//!
//! These codes give scripts a way to tell "bad input" from "no such patient"
//! from "try again later" without parsing output.

use mrn_core::{Classify, ErrorKind, IdentifierError, ResolveError};

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Malformed identifier or query, or an ambiguous match.
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open or parse an input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// A valid query matched no patient.
/// Maps to EX_NOUSER from sysexits.h.
pub const NOT_FOUND: i32 = 67;

/// Store or camera unavailable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: i32 = 69;

/// A lookup matched nothing. Returned by commands so the exit code can
/// distinguish it from failures.
#[derive(Debug)]
pub struct NoMatch(pub String);

impl std::fmt::Display for NoMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "No patient found for {}", self.0)
    }
}

impl std::error::Error for NoMatch {}

/// Input files that could not be read or parsed.
#[derive(Debug)]
pub struct BadInput(pub String);

impl std::fmt::Display for BadInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BadInput {}

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// Classify an error by the typed causes in its chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let code = err
            .chain()
            .find_map(|cause| {
                if cause.is::<NoMatch>() {
                    Some(NOT_FOUND)
                } else if cause.is::<BadInput>() || cause.is::<std::io::Error>() {
                    Some(INPUT_ERROR)
                } else if cause.is::<IdentifierError>() {
                    Some(DATA_ERROR)
                } else if let Some(e) = cause.downcast_ref::<ResolveError>() {
                    Some(code_for_kind(e.kind()))
                } else if let Some(e) = cause.downcast_ref::<mrn_core::DeviceError>() {
                    Some(code_for_kind(e.kind()))
                } else {
                    None
                }
            })
            .unwrap_or(GENERAL_ERROR);

        Self::error(code, format!("{err:#}"))
    }
}

fn code_for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Validation | ErrorKind::Duplicate => DATA_ERROR,
        ErrorKind::NotFound => NOT_FOUND,
        ErrorKind::Transient => UNAVAILABLE,
        ErrorKind::Fatal => GENERAL_ERROR,
    }
}
