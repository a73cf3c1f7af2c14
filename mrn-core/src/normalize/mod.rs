//! Patient data normalization.
//!
//! Stored patients arrive with names, contacts and addresses in whatever shape
//! the writing service used (plain strings, FHIR-style structures, lists of
//! those, or JSON encoded into text columns). Every field is first classified
//! into a tagged input enum, then flattened. None of these functions fail:
//! anything unparseable degrades to an empty value or the `"Unknown"` sentinel.

mod address;
mod contact;
mod name;

pub use address::{normalize_address, AddressInput, StructuredAddress};
pub use contact::{normalize_contact, ContactInfo, ContactInput, ContactPoint};
pub use name::{normalize_name, NameInput, NameParts, StructuredName, UNKNOWN_NAME};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::identifier::MedicalIdentifier;
use crate::store::StoredPatient;

/// The resolved, flattened view of a stored patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub system_id: Uuid,
    pub medical_identifier: Option<MedicalIdentifier>,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub address: String,
    pub photo_reference: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub hospital_affiliation: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Flatten a stored patient into a [`PatientRecord`].
pub fn normalize_patient(stored: &StoredPatient) -> PatientRecord {
    let name = normalize_name(&NameInput::classify(&stored.name));
    let contact = normalize_contact(&ContactInput::classify(&stored.contact));
    let address = normalize_address(&AddressInput::classify(&stored.address));

    let medical_identifier = stored.medical_id.as_deref().and_then(|raw| {
        MedicalIdentifier::parse(raw)
            .map_err(|e| {
                warn!(
                    system_id = %stored.id,
                    error = %e,
                    "Stored medical identifier is malformed; treating as unassigned"
                );
            })
            .ok()
    });

    PatientRecord {
        system_id: stored.id,
        medical_identifier,
        full_name: name.full_name,
        first_name: name.first_name,
        last_name: name.last_name,
        email_address: contact.email_address,
        phone_number: contact.phone_number,
        address,
        photo_reference: non_blank(stored.photo.as_deref()),
        date_of_birth: stored.date_of_birth,
        gender: non_blank(stored.gender.as_deref()),
        hospital_affiliation: non_blank(stored.hospital.as_deref()),
        updated_at: stored.updated_at,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn stored() -> StoredPatient {
        StoredPatient {
            id: Uuid::parse_str("6f1c9f0e-3f0a-4c7b-9a61-0d2b8c1e5a77").unwrap(),
            medical_id: Some("ab12c".into()),
            name: json!([{"given": ["John"], "family": "Doe"}]),
            contact: json!(r#"[{"system":"email","value":"john@example.com"},{"system":"phone","value":"555-123-4567"}]"#),
            address: json!([{"line": ["123 Main St"], "city": "Anytown", "state": "CA", "postalCode": "12345"}]),
            photo: Some("  ".into()),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 15),
            gender: Some("male".into()),
            hospital: Some("St. Mary's".into()),
            updated_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_normalize_patient_flattens_every_field() {
        let record = normalize_patient(&stored());
        assert_eq!(record.full_name, "John Doe");
        assert_eq!(record.first_name, "John");
        assert_eq!(record.last_name, "Doe");
        assert_eq!(record.medical_identifier.unwrap().as_str(), "AB12C");
        assert_eq!(record.email_address.as_deref(), Some("john@example.com"));
        assert_eq!(record.phone_number.as_deref(), Some("555-123-4567"));
        assert_eq!(record.address, "123 Main St, Anytown, CA, 12345");
        assert_eq!(record.photo_reference, None);
        assert_eq!(record.hospital_affiliation.as_deref(), Some("St. Mary's"));
    }

    #[test]
    fn test_malformed_stored_identifier_is_dropped() {
        let mut patient = stored();
        patient.medical_id = Some("SMITH".into());
        assert_eq!(normalize_patient(&patient).medical_identifier, None);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let value = serde_json::to_value(normalize_patient(&stored())).unwrap();
        assert_eq!(value["fullName"], "John Doe");
        assert_eq!(value["medicalIdentifier"], "AB12C");
        assert!(value.get("systemId").is_some());
    }
}
