//! Patient search handler
//!
//! Handles GET /patients/search requests.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::patient::PatientResponse;
use crate::auth::CallerIdentity;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Text matched against patient names and medical identifiers
    #[serde(default)]
    pub q: String,
    /// Maximum number of results (capped by the server)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    #[schema(example = 1)]
    pub count: usize,
    pub results: Vec<PatientResponse>,
}

/// Search patients by name or medical identifier.
///
/// Blank text returns an empty list without querying the store.
#[utoipa::path(
    get,
    path = "/patients/search",
    tag = "Patients",
    params(
        SearchParams,
        ("x-caller-id" = String, Header, description = "Caller id set by the gateway"),
        ("x-caller-role" = String, Header, description = "staff, admin or patient")
    ),
    responses(
        (status = 200, description = "Matching patients, sorted by name", body = SearchResponse),
        (status = 401, description = "No caller identity"),
        (status = 403, description = "Caller may not look up patients"),
        (status = 503, description = "Patient store unavailable")
    )
)]
pub async fn search_handler(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    caller.require_staff()?;

    let limit = params
        .limit
        .unwrap_or(state.config.search_limit)
        .min(state.config.search_limit_max);

    let results: Vec<PatientResponse> = state
        .resolver
        .search(&params.q, limit)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(SearchResponse {
        count: results.len(),
        results,
    }))
}
