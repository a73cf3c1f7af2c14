//! Search command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use mrn_core::{to_display_form, IdentityResolver};

use crate::utils::load_fixture;

/// Search patients by name or medical identifier.
///
/// No matches is not an error; the list is just empty.
pub async fn execute(
    fixture: PathBuf,
    text: String,
    limit: usize,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let store = load_fixture(&fixture)?;
    let resolver = IdentityResolver::new(store);

    let results = resolver
        .search(&text, limit)
        .await
        .context("Search failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    if results.is_empty() {
        println!("{}", "No matching patients".dimmed());
        return Ok(());
    }
    for record in &results {
        let medical_id = record.medical_identifier.as_ref().map(|id| id.as_str());
        println!(
            "{:<16} {}  {}",
            to_display_form(medical_id).to_string().bold(),
            record.full_name,
            record.system_id.to_string().dimmed()
        );
    }
    println!("{}", format!("{} result(s)", results.len()).dimmed());
    Ok(())
}
