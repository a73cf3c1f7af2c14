//! Name normalization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Full-name sentinel used when nothing resolvable is present.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Canonical name triple. `full_name` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameParts {
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}

impl NameParts {
    pub fn unknown() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            full_name: UNKNOWN_NAME.to_string(),
        }
    }

    fn from_full_text(text: &str) -> Option<Self> {
        let full_name = collapse_whitespace(text);
        if full_name.is_empty() {
            return None;
        }
        let (first_name, last_name) = split_full_name(&full_name);
        Some(Self {
            first_name,
            last_name,
            full_name,
        })
    }
}

/// A structured (FHIR-like) name: given names, family name, optional text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredName {
    pub given: Vec<String>,
    pub family: Option<String>,
    pub text: Option<String>,
}

/// Every shape a stored name has been seen in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameInput {
    /// `"John Doe"`
    Text(String),
    /// `{"given": ["John"], "family": "Doe"}`
    Structured(StructuredName),
    /// `[{"given": [...], "family": ...}, ...]`; only the first is used.
    List(Vec<StructuredName>),
    /// `{"firstName": ..., "lastName": ..., "fullName": ...}`
    Parts(NameParts),
    Missing,
}

impl NameInput {
    /// Classify a raw JSON value into one of the known shapes.
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text.clone()),
            Value::Array(items) => Self::List(items.iter().filter_map(structured_from_value).collect()),
            Value::Object(map) if is_parts_map(map) => Self::Parts(parts_from_map(map)),
            Value::Object(map) => match structured_from_map(map) {
                Some(name) => Self::Structured(name),
                None => Self::Missing,
            },
            Value::Null | Value::Bool(_) | Value::Number(_) => Self::Missing,
        }
    }
}

/// Collapse any name shape into the canonical triple.
///
/// Precedence: explicit full-name text, then structured given/family, then a
/// whitespace split of a single string. Idempotent on its own output.
pub fn normalize_name(input: &NameInput) -> NameParts {
    let parts = match input {
        NameInput::Text(text) => NameParts::from_full_text(text),
        NameInput::Structured(name) => from_structured(name),
        NameInput::List(names) => names.first().and_then(from_structured),
        NameInput::Parts(parts) => from_parts(parts),
        NameInput::Missing => None,
    };
    parts.unwrap_or_else(NameParts::unknown)
}

fn from_structured(name: &StructuredName) -> Option<NameParts> {
    let given: Vec<String> = name
        .given
        .iter()
        .map(|g| collapse_whitespace(g))
        .filter(|g| !g.is_empty())
        .collect();
    let family = name
        .family
        .as_deref()
        .map(collapse_whitespace)
        .unwrap_or_default();
    let has_structure = !given.is_empty() || !family.is_empty();

    if let Some(text) = name.text.as_deref() {
        let full_name = collapse_whitespace(text);
        if !full_name.is_empty() {
            if !has_structure {
                return NameParts::from_full_text(&full_name);
            }
            return Some(NameParts {
                first_name: given.first().cloned().unwrap_or_default(),
                last_name: family,
                full_name,
            });
        }
    }

    if !has_structure {
        return None;
    }

    let full_name = given
        .iter()
        .map(String::as_str)
        .chain(Some(family.as_str()).filter(|f| !f.is_empty()))
        .collect::<Vec<_>>()
        .join(" ");

    Some(NameParts {
        first_name: given.first().cloned().unwrap_or_default(),
        last_name: family,
        full_name,
    })
}

fn from_parts(parts: &NameParts) -> Option<NameParts> {
    let first_name = collapse_whitespace(&parts.first_name);
    let last_name = collapse_whitespace(&parts.last_name);
    let full_name = collapse_whitespace(&parts.full_name);

    if full_name.is_empty() {
        let composed = collapse_whitespace(&format!("{first_name} {last_name}"));
        if composed.is_empty() {
            return None;
        }
        return Some(NameParts {
            first_name,
            last_name,
            full_name: composed,
        });
    }

    if first_name.is_empty() && last_name.is_empty() {
        if full_name == UNKNOWN_NAME {
            return None;
        }
        return NameParts::from_full_text(&full_name);
    }

    Some(NameParts {
        first_name,
        last_name,
        full_name,
    })
}

fn structured_from_value(value: &Value) -> Option<StructuredName> {
    match value {
        Value::Object(map) => structured_from_map(map),
        Value::String(text) => Some(StructuredName {
            text: Some(text.clone()),
            ..Default::default()
        }),
        _ => None,
    }
}

fn structured_from_map(map: &Map<String, Value>) -> Option<StructuredName> {
    let given = match map.get("given") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    };
    let family = match map.get("family") {
        Some(Value::String(family)) => Some(family.clone()),
        // Older FHIR revisions allowed repeating family names.
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    };
    let text = map.get("text").and_then(Value::as_str).map(str::to_string);

    if given.is_empty() && family.is_none() && text.is_none() {
        return None;
    }
    Some(StructuredName {
        given,
        family,
        text,
    })
}

const PARTS_KEYS: [(&str, &str); 3] = [
    ("firstName", "first_name"),
    ("lastName", "last_name"),
    ("fullName", "full_name"),
];

fn is_parts_map(map: &Map<String, Value>) -> bool {
    PARTS_KEYS
        .iter()
        .any(|(camel, snake)| map.contains_key(*camel) || map.contains_key(*snake))
}

fn parts_from_map(map: &Map<String, Value>) -> NameParts {
    let field = |camel: &str, snake: &str| {
        map.get(camel)
            .or_else(|| map.get(snake))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    NameParts {
        first_name: field("firstName", "first_name"),
        last_name: field("lastName", "last_name"),
        full_name: field("fullName", "full_name"),
    }
}

fn split_full_name(full_name: &str) -> (String, String) {
    match full_name.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.to_string()),
        None => (full_name.to_string(), String::new()),
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn normalize_json(value: Value) -> NameParts {
        normalize_name(&NameInput::classify(&value))
    }

    #[test]
    fn test_plain_string_is_split_on_whitespace() {
        let parts = normalize_json(json!("  Mary   Ann Smith "));
        assert_eq!(parts.first_name, "Mary");
        assert_eq!(parts.last_name, "Ann Smith");
        assert_eq!(parts.full_name, "Mary Ann Smith");
    }

    #[test]
    fn test_single_token_string() {
        let parts = normalize_json(json!("Madonna"));
        assert_eq!(parts.first_name, "Madonna");
        assert_eq!(parts.last_name, "");
        assert_eq!(parts.full_name, "Madonna");
    }

    #[test]
    fn test_structured_name() {
        let parts = normalize_json(json!({"given": ["John", "Paul"], "family": "Doe"}));
        assert_eq!(parts.first_name, "John");
        assert_eq!(parts.last_name, "Doe");
        assert_eq!(parts.full_name, "John Paul Doe");
    }

    #[test]
    fn test_list_takes_first_element() {
        let parts = normalize_json(json!([
            {"given": ["Jane"], "family": "Smith"},
            {"given": ["Janet"], "family": "Smythe"}
        ]));
        assert_eq!(parts.full_name, "Jane Smith");
    }

    #[test]
    fn test_explicit_text_beats_structured_parts() {
        let parts = normalize_json(json!({
            "text": "Dr. Jane Q. Smith",
            "given": ["Jane"],
            "family": "Smith"
        }));
        assert_eq!(parts.full_name, "Dr. Jane Q. Smith");
        assert_eq!(parts.first_name, "Jane");
        assert_eq!(parts.last_name, "Smith");
    }

    #[test]
    fn test_text_only_structured_is_split() {
        let parts = normalize_json(json!({"text": "Ada Lovelace"}));
        assert_eq!(parts.first_name, "Ada");
        assert_eq!(parts.last_name, "Lovelace");
    }

    #[test]
    fn test_family_only() {
        let parts = normalize_json(json!({"family": "Doe"}));
        assert_eq!(parts.first_name, "");
        assert_eq!(parts.last_name, "Doe");
        assert_eq!(parts.full_name, "Doe");
    }

    #[test]
    fn test_parts_without_full_name_are_composed() {
        let parts = normalize_json(json!({"first_name": "John", "last_name": "Doe"}));
        assert_eq!(parts.full_name, "John Doe");
    }

    #[test]
    fn test_unresolvable_inputs_fall_back_to_unknown() {
        for value in [
            json!(null),
            json!(""),
            json!("   "),
            json!(42),
            json!([]),
            json!({}),
            json!({"given": [], "family": ""}),
            json!({"fullName": "", "firstName": " "}),
        ] {
            assert_eq!(normalize_json(value.clone()), NameParts::unknown(), "{value}");
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for value in [
            json!("John Doe"),
            json!("Madonna"),
            json!({"given": ["John", "Paul"], "family": "Doe"}),
            json!({"family": "Doe"}),
            json!({"text": "Dr. Jane Q. Smith", "given": ["Jane"], "family": "Smith"}),
            json!(null),
        ] {
            let once = normalize_json(value);
            let twice = normalize_name(&NameInput::Parts(once.clone()));
            assert_eq!(once, twice);

            let via_json = normalize_json(serde_json::to_value(&once).unwrap());
            assert_eq!(once, via_json);
        }
    }
}
