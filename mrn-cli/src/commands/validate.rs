//! Validate command implementation.

use anyhow::{bail, Result};
use colored::Colorize;
use tracing::debug;

use mrn_core::{IdentifierError, MedicalIdentifier};

/// Check each value against the medical identifier format.
///
/// Fails when any value is invalid; the first rejection is kept as the cause.
pub fn execute(identifiers: Vec<String>, quiet: bool) -> Result<()> {
    let mut first_error: Option<IdentifierError> = None;

    for raw in &identifiers {
        match MedicalIdentifier::parse(raw) {
            Ok(id) => {
                debug!(input = %raw, canonical = %id, "Valid identifier");
                if !quiet {
                    println!("{} {} -> {}", "VALID  ".green().bold(), raw, id);
                }
            }
            Err(e) => {
                if !quiet {
                    println!("{} {} ({})", "INVALID".red().bold(), raw, e);
                }
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if identifiers.len() == 1 => Err(e.into()),
        Some(e) => Err(anyhow::Error::new(e).context("One or more identifiers are invalid")),
        None if identifiers.is_empty() => bail!("No identifiers given"),
        None => Ok(()),
    }
}
