//! Patient response DTOs shared by the resolve and search handlers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use mrn_core::{to_display_form, DuplicateWarning, PatientRecord};

/// A normalized patient record.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientResponse {
    /// Opaque record id
    #[schema(value_type = String, example = "550e8400-e29b-41d4-a716-446655440000")]
    pub system_id: Uuid,
    /// Canonical medical identifier, absent when unassigned or malformed
    #[schema(example = "AB12C")]
    pub medical_identifier: Option<String>,
    /// Identifier text for display only; never send it back as an identifier
    #[schema(example = "AB12C")]
    pub display_identifier: String,
    #[schema(example = "John Doe")]
    pub full_name: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john@example.com")]
    pub email_address: Option<String>,
    #[schema(example = "+1 555 0100")]
    pub phone_number: Option<String>,
    #[schema(example = "1 Main St, Springfield, IL 62701, US")]
    pub address: String,
    pub photo_reference: Option<String>,
    #[schema(value_type = Option<String>, example = "1980-04-12")]
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub hospital_affiliation: Option<String>,
    #[schema(value_type = String, example = "2026-01-08T10:00:00Z")]
    pub updated_at: DateTime<Utc>,
}

impl From<PatientRecord> for PatientResponse {
    fn from(record: PatientRecord) -> Self {
        let medical_identifier = record
            .medical_identifier
            .as_ref()
            .map(|id| id.as_str().to_string());
        let display_identifier = to_display_form(medical_identifier.as_deref())
            .as_str()
            .to_string();
        Self {
            system_id: record.system_id,
            medical_identifier,
            display_identifier,
            full_name: record.full_name,
            first_name: record.first_name,
            last_name: record.last_name,
            email_address: record.email_address,
            phone_number: record.phone_number,
            address: record.address,
            photo_reference: record.photo_reference,
            date_of_birth: record.date_of_birth,
            gender: record.gender,
            hospital_affiliation: record.hospital_affiliation,
            updated_at: record.updated_at,
        }
    }
}

/// Several patients share the email that produced the match.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateWarningResponse {
    #[schema(example = "shared@example.com")]
    pub email: String,
    #[schema(example = 2)]
    pub match_count: usize,
    #[schema(value_type = Vec<String>)]
    pub candidate_ids: Vec<Uuid>,
}

impl From<DuplicateWarning> for DuplicateWarningResponse {
    fn from(warning: DuplicateWarning) -> Self {
        Self {
            email: warning.email,
            match_count: warning.match_count,
            candidate_ids: warning.candidate_ids,
        }
    }
}
