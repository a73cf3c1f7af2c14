//! Patient resolution handler
//!
//! Handles POST /patients/resolve requests.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mrn_core::{LookupQuery, Resolution};

use super::patient::{DuplicateWarningResponse, PatientResponse};
use crate::auth::CallerIdentity;
use crate::error::ApiError;
use crate::state::AppState;

/// Identifiers known for the patient. Every supplied field is tried in
/// priority order: system id, system id as medical identifier, medical
/// identifier, email.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    #[serde(default)]
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub system_id: Option<String>,

    #[serde(default)]
    #[schema(example = "ab12c")]
    pub medical_identifier: Option<String>,

    #[serde(default)]
    #[schema(example = "john@example.com")]
    pub email_address: Option<String>,
}

impl From<ResolveRequest> for LookupQuery {
    fn from(request: ResolveRequest) -> Self {
        Self {
            system_id: request.system_id,
            medical_identifier: request.medical_identifier,
            email_address: request.email_address,
        }
    }
}

/// A resolved patient.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    /// Which lookup produced the match
    #[schema(example = "medical_id")]
    pub strategy: String,

    pub patient: PatientResponse,

    /// Set when the match came from an email shared by several patients
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_warning: Option<DuplicateWarningResponse>,
}

/// Resolve exactly one patient from the identifiers a caller has.
#[utoipa::path(
    post,
    path = "/patients/resolve",
    tag = "Patients",
    request_body = ResolveRequest,
    params(
        ("x-caller-id" = String, Header, description = "Caller id set by the gateway"),
        ("x-caller-role" = String, Header, description = "staff, admin or patient")
    ),
    responses(
        (status = 200, description = "Patient resolved", body = ResolveResponse),
        (status = 400, description = "Empty query or malformed identifier"),
        (status = 401, description = "No caller identity"),
        (status = 403, description = "Caller may not look up patients"),
        (status = 404, description = "No patient matched"),
        (status = 409, description = "Email shared by several patients (reject policy)"),
        (status = 503, description = "Patient store unavailable")
    )
)]
pub async fn resolve_handler(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    caller.require_staff()?;

    let query = LookupQuery::from(request);
    match state.resolver.resolve(&query).await? {
        Resolution::Found(resolved) => {
            tracing::debug!(
                caller_id = %caller.id,
                strategy = resolved.strategy.as_str(),
                "Resolve request served"
            );
            Ok(Json(ResolveResponse {
                strategy: resolved.strategy.as_str().to_string(),
                patient: resolved.record.into(),
                duplicate_warning: resolved.duplicate.map(Into::into),
            }))
        }
        Resolution::NotFound => Err(ApiError::not_found("no patient matched the query")),
    }
}
