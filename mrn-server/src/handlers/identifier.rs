//! Identifier display handler
//!
//! Pure formatting; no store access and no caller identity required.

use axum::extract::Path;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use mrn_core::{to_display_form, validate_format};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierDisplayResponse {
    /// The raw value as received
    #[schema(example = "ab12c")]
    pub input: String,
    /// Whether the raw value is a valid medical identifier
    pub valid: bool,
    /// Text for display next to the patient
    #[schema(example = "AB12C")]
    pub display: String,
    /// True for the "Not Assigned" / "Invalid Format" placeholders
    pub placeholder: bool,
    /// True when the display text was derived from a non-canonical id
    pub derived: bool,
}

/// Format a stored identifier-ish value for display.
#[utoipa::path(
    get,
    path = "/identifiers/{raw}/display",
    tag = "Identifiers",
    params(("raw" = String, Path, description = "Stored identifier value")),
    responses((status = 200, description = "Display form", body = IdentifierDisplayResponse))
)]
pub async fn display_identifier_handler(Path(raw): Path<String>) -> Json<IdentifierDisplayResponse> {
    let display = to_display_form(Some(&raw));
    Json(IdentifierDisplayResponse {
        valid: validate_format(&raw),
        placeholder: display.is_sentinel(),
        derived: display.is_derived(),
        display: display.to_string(),
        input: raw,
    })
}
