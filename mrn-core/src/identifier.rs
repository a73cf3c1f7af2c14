//! Medical identifier (MRN) validation and display formatting.
//!
//! A medical identifier is the permanent, patient-facing token printed on
//! wristbands and encoded in QR codes: exactly five ASCII alphanumerics, stored
//! uppercase, containing at least one letter and at least one digit.
//!
//! Display formatting is deliberately a separate type: [`DisplayIdentifier`]
//! may hold a token derived from an opaque record id, and must never flow back
//! into lookups or persistence.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;

/// Length of a canonical medical identifier.
pub const MEDICAL_ID_LEN: usize = 5;

/// Shown when a record has no identifier.
pub const NOT_ASSIGNED: &str = "Not Assigned";

/// Shown when the stored value looks like a name artifact rather than an id.
pub const INVALID_FORMAT: &str = "Invalid Format";

/// Marker prefixed to display tokens derived from non-canonical ids.
pub const DERIVED_MARKER: &str = "ID-";

/// A validated, uppercase medical identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MedicalIdentifier(String);

impl MedicalIdentifier {
    /// Trim, uppercase and validate a raw identifier.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let candidate = raw.trim().to_ascii_uppercase();
        check_token(&candidate)?;
        Ok(Self(candidate))
    }

    /// Parse a decoded QR payload.
    ///
    /// Payloads are either the bare token or `namespace:TOKEN`; the namespace
    /// is ignored.
    pub fn from_qr_payload(payload: &str) -> Result<Self, IdentifierError> {
        let trimmed = payload.trim();
        let token = match trimmed.rsplit_once(':') {
            Some((_, token)) => token,
            None => trimmed,
        };
        Self::parse(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MedicalIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MedicalIdentifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MedicalIdentifier> for String {
    fn from(id: MedicalIdentifier) -> Self {
        id.0
    }
}

impl AsRef<str> for MedicalIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A string meant only for display next to a patient.
///
/// Has no conversion into [`MedicalIdentifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DisplayIdentifier(String);

impl DisplayIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the `Not Assigned` / `Invalid Format` placeholders.
    pub fn is_sentinel(&self) -> bool {
        self.0 == NOT_ASSIGNED || self.0 == INVALID_FORMAT
    }

    /// True when the token was derived from a non-canonical id.
    pub fn is_derived(&self) -> bool {
        self.0.starts_with(DERIVED_MARKER)
    }
}

impl fmt::Display for DisplayIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns true iff `raw` is a valid medical identifier once trimmed and
/// uppercased.
pub fn validate_format(raw: &str) -> bool {
    check_token(&raw.trim().to_ascii_uppercase()).is_ok()
}

/// Format any stored identifier-ish value for display. Never fails.
pub fn to_display_form(raw: Option<&str>) -> DisplayIdentifier {
    let trimmed = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return DisplayIdentifier(NOT_ASSIGNED.to_string()),
    };

    let upper = trimmed.to_ascii_uppercase();
    match check_token(&upper) {
        Ok(()) => DisplayIdentifier(upper),
        // Right shape, wrong content: most likely derived from a name.
        Err(IdentifierError::MissingDigit | IdentifierError::MissingLetter) => {
            DisplayIdentifier(INVALID_FORMAT.to_string())
        }
        Err(_) => {
            let prefix: String = upper
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .take(MEDICAL_ID_LEN)
                .collect();
            if prefix.is_empty() {
                DisplayIdentifier(INVALID_FORMAT.to_string())
            } else {
                DisplayIdentifier(format!("{DERIVED_MARKER}{prefix}"))
            }
        }
    }
}

fn check_token(candidate: &str) -> Result<(), IdentifierError> {
    if candidate.is_empty() {
        return Err(IdentifierError::Empty);
    }

    let len = candidate.chars().count();
    if len != MEDICAL_ID_LEN {
        return Err(IdentifierError::WrongLength {
            expected: MEDICAL_ID_LEN,
            actual: len,
        });
    }

    if !candidate.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(IdentifierError::NonAlphanumeric);
    }
    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        return Err(IdentifierError::MissingDigit);
    }
    if !candidate.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(IdentifierError::MissingLetter);
    }

    Ok(())
}
