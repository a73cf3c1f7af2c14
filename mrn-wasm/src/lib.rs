//! WebAssembly bindings for medical identifiers and patient data normalization.
//!
//! Lets the browser validate a typed identifier and flatten patient fields
//! with exactly the rules the server uses. Every function returns a value;
//! none of them throw.

use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

use mrn_core::{
    normalize_address, normalize_contact, normalize_name, normalize_patient, AddressInput,
    ContactInput, MedicalIdentifier, NameInput, StoredPatient,
};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// True iff `raw` is a valid medical identifier once trimmed and uppercased.
#[wasm_bindgen]
pub fn validate_format(raw: &str) -> bool {
    mrn_core::validate_format(raw)
}

/// Canonical (uppercase) form of a valid identifier, or `undefined`.
#[wasm_bindgen]
pub fn canonicalize(raw: &str) -> Option<String> {
    MedicalIdentifier::parse(raw)
        .ok()
        .map(|id| id.as_str().to_string())
}

/// Reason `raw` is not a valid identifier, or `undefined` when it is.
#[wasm_bindgen]
pub fn validation_error(raw: &str) -> Option<String> {
    MedicalIdentifier::parse(raw).err().map(|e| e.to_string())
}

/// Display form of a stored identifier value. Pass `undefined` for a
/// missing value.
#[wasm_bindgen]
pub fn to_display_form(raw: Option<String>) -> String {
    mrn_core::to_display_form(raw.as_deref()).to_string()
}

/// Flatten a name field (JSON text, or a bare name) into
/// `{firstName, lastName, fullName}`.
#[wasm_bindgen]
pub fn normalize_name_json(input: &str) -> String {
    to_json(&normalize_name(&NameInput::classify(&parse_field(input))))
}

/// Extract `{emailAddress, phoneNumber}` from a contact field.
#[wasm_bindgen]
pub fn normalize_contact_json(input: &str) -> String {
    to_json(&normalize_contact(&ContactInput::classify(&parse_field(input))))
}

/// Render an address field as one line.
#[wasm_bindgen]
pub fn normalize_address_json(input: &str) -> String {
    normalize_address(&AddressInput::classify(&parse_field(input)))
}

/// Normalize a whole stored patient row into a patient record.
///
/// Returns `{"error": ...}` when the row lacks an id or timestamp.
#[wasm_bindgen]
pub fn normalize_patient_json(input: &str) -> String {
    match serde_json::from_str::<StoredPatient>(input) {
        Ok(stored) => to_json(&normalize_patient(&stored)),
        Err(e) => error_json(&format!("Invalid patient row: {e}")),
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Parse a field as JSON; anything that is not JSON is taken as plain text.
fn parse_field(input: &str) -> Value {
    serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| error_json(&format!("Serialization error: {e}")))
}

fn error_json(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}
