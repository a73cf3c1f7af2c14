//! Common utility functions shared across CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use tracing::debug;

use mrn_core::scanner::ScriptStep;
use mrn_core::{to_display_form, DeviceError, InMemoryPatientStore, PatientRecord};

use crate::exit_codes::BadInput;

/// Load a JSON array of stored patients into an in-memory store.
pub fn load_fixture(path: &Path) -> Result<Arc<InMemoryPatientStore>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture: {}", path.display()))?;
    let store = InMemoryPatientStore::from_json(&json).map_err(|e| {
        BadInput(format!("Failed to parse fixture {}: {e}", path.display()))
    })?;
    debug!(path = %path.display(), patients = store.len(), "Loaded fixture");
    Ok(Arc::new(store))
}

/// Parse a frame script into capture sessions, one frame per line.
///
/// - `---`: ends the current capture session; the next acquisition replays
///   the following block
/// - blank line or `-`: a frame with no readable code
/// - `!timeout`, `!denied`, `!missing`, `!fail <reason>`: a device fault
/// - anything else: a frame carrying that QR payload
pub fn parse_frames(script: &str) -> Result<Vec<Vec<ScriptStep>>, BadInput> {
    let mut sessions = vec![Vec::new()];
    for (index, line) in script.lines().enumerate() {
        if line.trim() == "---" {
            sessions.push(Vec::new());
            continue;
        }
        let step = parse_frame(line).map_err(|e| BadInput(format!("line {}: {e}", index + 1)))?;
        if let Some(current) = sessions.last_mut() {
            current.push(step);
        }
    }
    Ok(sessions)
}

fn parse_frame(line: &str) -> Result<ScriptStep, String> {
    let line = line.trim();
    if line.is_empty() || line == "-" {
        return Ok(ScriptStep::Miss);
    }
    let Some(directive) = line.strip_prefix('!') else {
        return Ok(ScriptStep::payload(line));
    };
    let (name, rest) = directive
        .split_once(char::is_whitespace)
        .unwrap_or((directive, ""));
    let fault = match name {
        "timeout" => DeviceError::Timeout,
        "denied" => DeviceError::PermissionDenied,
        "missing" => DeviceError::NotFound,
        "fail" => DeviceError::Failure(rest.trim().to_string()),
        other => return Err(format!("unknown frame directive '!{other}'")),
    };
    Ok(ScriptStep::Fault(fault))
}

/// Format a record timestamp as a human-readable UTC string.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Print one patient as a labelled block.
pub fn print_patient(record: &PatientRecord) {
    let medical_id = record.medical_identifier.as_ref().map(|id| id.as_str());
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    println!("   {} {}", "Name:".dimmed(), record.full_name.bold());
    println!(
        "   {} {}",
        "Medical ID:".dimmed(),
        to_display_form(medical_id)
    );
    println!("   {} {}", "System ID:".dimmed(), record.system_id);
    println!("   {} {}", "Email:".dimmed(), optional(&record.email_address));
    println!("   {} {}", "Phone:".dimmed(), optional(&record.phone_number));
    if !record.address.is_empty() {
        println!("   {} {}", "Address:".dimmed(), record.address);
    }
    if let Some(dob) = record.date_of_birth {
        println!("   {} {}", "Born:".dimmed(), dob);
    }
    println!(
        "   {} {}",
        "Updated:".dimmed(),
        format_timestamp(record.updated_at)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frames() {
        let sessions = parse_frames("-\n\n!timeout\n---\nab12c\n!fail lens cap on\n").unwrap();
        assert_eq!(
            sessions,
            vec![
                vec![
                    ScriptStep::Miss,
                    ScriptStep::Miss,
                    ScriptStep::Fault(DeviceError::Timeout),
                ],
                vec![
                    ScriptStep::payload("ab12c"),
                    ScriptStep::Fault(DeviceError::Failure("lens cap on".into())),
                ],
            ]
        );
    }

    #[test]
    fn test_parse_frames_rejects_unknown_directive() {
        let err = parse_frames("AB12C\n!smudge").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_format_timestamp() {
        let at: DateTime<Utc> = "2024-01-15T12:30:45Z".parse().unwrap();
        assert_eq!(format_timestamp(at), "2024-01-15 12:30:45 UTC");
    }
}
