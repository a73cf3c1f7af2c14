//! Contact (telecom) normalization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// One `{system, value}` telecom entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPoint {
    pub system: String,
    pub value: String,
}

/// Classified contact data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactInput {
    /// A list of telecom entries (a single entry is promoted to a list).
    Entries(Vec<ContactPoint>),
    /// A flat `{email, phone}` object.
    Flat {
        email: Option<String>,
        phone: Option<String>,
    },
    /// Input that could not be understood; carries the reason for logging.
    Unparseable(String),
    Missing,
}

/// Extracted email and phone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
}

const PHONE_SYSTEMS: [&str; 3] = ["phone", "mobile", "sms"];

impl ContactInput {
    /// Classify a raw contact value. JSON-encoded strings are decoded once.
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::String(encoded) => {
                let encoded = encoded.trim();
                if encoded.is_empty() {
                    return Self::Missing;
                }
                match serde_json::from_str::<Value>(encoded) {
                    Ok(decoded @ (Value::Array(_) | Value::Object(_))) => Self::classify(&decoded),
                    Ok(other) => Self::Unparseable(format!(
                        "encoded contact is not a list or object: {other}"
                    )),
                    Err(e) => Self::Unparseable(format!("invalid contact JSON: {e}")),
                }
            }
            Value::Array(items) => Self::Entries(items.iter().filter_map(point_from_value).collect()),
            Value::Object(map) => classify_object(map),
            Value::Bool(_) | Value::Number(_) => {
                Self::Unparseable(format!("unexpected contact value: {value}"))
            }
        }
    }
}

fn classify_object(map: &Map<String, Value>) -> ContactInput {
    if let Some(point) = point_from_map(map) {
        return ContactInput::Entries(vec![point]);
    }
    if let Some(telecom) = map.get("telecom") {
        return ContactInput::classify(telecom);
    }

    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    };
    let email = text(&["email", "emailAddress", "email_address"]);
    let phone = text(&["phone", "phoneNumber", "phone_number"]);
    if email.is_none() && phone.is_none() {
        return ContactInput::Missing;
    }
    ContactInput::Flat { email, phone }
}

fn point_from_value(value: &Value) -> Option<ContactPoint> {
    value.as_object().and_then(point_from_map)
}

fn point_from_map(map: &Map<String, Value>) -> Option<ContactPoint> {
    let system = map.get("system")?.as_str()?;
    let value = map.get("value")?.as_str()?;
    Some(ContactPoint {
        system: system.to_string(),
        value: value.to_string(),
    })
}

/// Pull the first email and first phone out of any contact shape.
///
/// Malformed input yields an empty [`ContactInfo`]; it is logged, not raised.
pub fn normalize_contact(input: &ContactInput) -> ContactInfo {
    match input {
        ContactInput::Entries(points) => {
            let first_of = |systems: &[&str]| {
                points
                    .iter()
                    .filter(|p| systems.iter().any(|s| p.system.trim().eq_ignore_ascii_case(s)))
                    .find_map(|p| non_blank(&p.value))
            };
            ContactInfo {
                email_address: first_of(&["email"]),
                phone_number: first_of(&PHONE_SYSTEMS),
            }
        }
        ContactInput::Flat { email, phone } => ContactInfo {
            email_address: email.as_deref().and_then(non_blank),
            phone_number: phone.as_deref().and_then(non_blank),
        },
        ContactInput::Unparseable(reason) => {
            warn!(reason = %reason, "Ignoring malformed contact data");
            ContactInfo::default()
        }
        ContactInput::Missing => ContactInfo::default(),
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn normalize_json(value: Value) -> ContactInfo {
        normalize_contact(&ContactInput::classify(&value))
    }

    #[test]
    fn test_entry_list_takes_first_per_system() {
        let info = normalize_json(json!([
            {"system": "phone", "value": "555-123-4567"},
            {"system": "email", "value": "john@example.com"},
            {"system": "email", "value": "second@example.com"},
            {"system": "phone", "value": "555-000-0000"}
        ]));
        assert_eq!(info.email_address.as_deref(), Some("john@example.com"));
        assert_eq!(info.phone_number.as_deref(), Some("555-123-4567"));
    }

    #[test]
    fn test_json_encoded_string_is_decoded() {
        let encoded = r#"[{"system":"email","value":" jane@example.com "}]"#;
        let info = normalize_json(json!(encoded));
        assert_eq!(info.email_address.as_deref(), Some("jane@example.com"));
        assert_eq!(info.phone_number, None);
    }

    #[test]
    fn test_single_entry_object() {
        let info = normalize_json(json!({"system": "mobile", "value": "07700 900123"}));
        assert_eq!(info.phone_number.as_deref(), Some("07700 900123"));
    }

    #[test]
    fn test_flat_object_and_nested_telecom() {
        let info = normalize_json(json!({"email": "a@b.org", "phone_number": "123"}));
        assert_eq!(info.email_address.as_deref(), Some("a@b.org"));
        assert_eq!(info.phone_number.as_deref(), Some("123"));

        let info = normalize_json(json!({"telecom": [{"system": "EMAIL", "value": "c@d.org"}]}));
        assert_eq!(info.email_address.as_deref(), Some("c@d.org"));
    }

    #[test]
    fn test_blank_values_are_skipped() {
        let info = normalize_json(json!([
            {"system": "email", "value": "  "},
            {"system": "email", "value": "real@example.com"}
        ]));
        assert_eq!(info.email_address.as_deref(), Some("real@example.com"));
    }

    #[test]
    fn test_malformed_input_yields_nothing() {
        for value in [
            json!("not json at all"),
            json!("\"just a string\""),
            json!("[{\"system\": \"email\""),
            json!(17),
            json!(true),
            json!(null),
            json!({}),
            json!([1, 2, 3]),
        ] {
            assert_eq!(normalize_json(value.clone()), ContactInfo::default(), "{value}");
        }
    }

    #[test]
    fn test_classification() {
        assert!(matches!(
            ContactInput::classify(&json!("{{broken")),
            ContactInput::Unparseable(_)
        ));
        assert_eq!(ContactInput::classify(&json!(null)), ContactInput::Missing);
        assert_eq!(
            ContactInput::classify(&json!([{"system": "email", "value": "x@y.z"}])),
            ContactInput::Entries(vec![ContactPoint {
                system: "email".into(),
                value: "x@y.z".into()
            }])
        );
    }
}
