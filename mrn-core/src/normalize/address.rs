//! Address normalization.

use serde_json::{Map, Value};

/// Structured address components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredAddress {
    pub line: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressInput {
    Text(String),
    Structured(StructuredAddress),
    /// Only the first entry is used.
    List(Vec<StructuredAddress>),
    Missing,
}

impl AddressInput {
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::String(text) => {
                let trimmed = text.trim();
                // Some rows hold a JSON-encoded address in a text column.
                if trimmed.starts_with('{') || trimmed.starts_with('[') {
                    if let Ok(decoded @ (Value::Object(_) | Value::Array(_))) =
                        serde_json::from_str::<Value>(trimmed)
                    {
                        return Self::classify(&decoded);
                    }
                }
                Self::Text(text.clone())
            }
            Value::Object(map) => Self::Structured(structured_from_map(map)),
            Value::Array(items) => Self::List(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Object(map) => Some(structured_from_map(map)),
                        Value::String(text) => Some(StructuredAddress {
                            text: Some(text.clone()),
                            ..Default::default()
                        }),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::Null | Value::Bool(_) | Value::Number(_) => Self::Missing,
        }
    }
}

fn structured_from_map(map: &Map<String, Value>) -> StructuredAddress {
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    };
    let line = match map.get("line") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    };

    StructuredAddress {
        line,
        city: text(&["city"]),
        state: text(&["state"]),
        postal_code: text(&["postalCode", "postal_code", "zip"]),
        country: text(&["country"]),
        text: text(&["text"]),
    }
}

/// Render any address shape as a single `", "`-joined line. Empty when
/// nothing usable is present.
pub fn normalize_address(input: &AddressInput) -> String {
    match input {
        AddressInput::Text(text) => text.trim().to_string(),
        AddressInput::Structured(address) => render(address),
        AddressInput::List(addresses) => addresses.first().map(render).unwrap_or_default(),
        AddressInput::Missing => String::new(),
    }
}

fn render(address: &StructuredAddress) -> String {
    let joined = address
        .line
        .iter()
        .map(String::as_str)
        .chain(
            [
                &address.city,
                &address.state,
                &address.postal_code,
                &address.country,
            ]
            .into_iter()
            .filter_map(|part| part.as_deref()),
        )
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    if !joined.is_empty() {
        return joined;
    }
    address
        .text
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}
