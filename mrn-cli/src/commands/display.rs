//! Display command implementation.

use anyhow::Result;

use mrn_core::to_display_form;

/// Print the display form of each stored value. An empty argument list
/// prints the form of a missing value. Never fails.
pub fn execute(values: Vec<String>) -> Result<()> {
    if values.is_empty() {
        println!("{}", to_display_form(None));
        return Ok(());
    }
    for raw in &values {
        println!("{}", to_display_form(Some(raw)));
    }
    Ok(())
}
