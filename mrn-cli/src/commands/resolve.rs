//! Resolve command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use mrn_core::{
    DuplicatePolicy, IdentityResolver, LookupQuery, PatientRecord, Resolution, ResolverConfig,
};

use crate::exit_codes::NoMatch;
use crate::utils::{load_fixture, print_patient};

pub struct ResolveArgs {
    pub fixture: PathBuf,
    pub query: LookupQuery,
    pub policy: DuplicatePolicy,
    pub json: bool,
    pub quiet: bool,
}

/// Resolve one patient from the fixture store.
pub async fn execute(args: ResolveArgs) -> Result<()> {
    let store = load_fixture(&args.fixture)?;
    let resolver = IdentityResolver::with_config(
        store,
        ResolverConfig {
            duplicate_policy: args.policy,
        },
    );

    let resolved = match resolver
        .resolve(&args.query)
        .await
        .context("Lookup failed")?
    {
        Resolution::Found(resolved) => resolved,
        Resolution::NotFound => return Err(NoMatch(describe(&args.query)).into()),
    };

    info!(
        strategy = resolved.strategy.as_str(),
        system_id = %resolved.record.system_id,
        "Resolved"
    );

    if args.json {
        let mut out = serde_json::json!({
            "strategy": resolved.strategy,
            "patient": resolved.record,
        });
        if let Some(warning) = &resolved.duplicate {
            out["duplicateWarning"] = serde_json::to_value(warning)?;
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if !args.quiet {
        print_resolved(&resolved.record, resolved.strategy.as_str());
        if let Some(warning) = &resolved.duplicate {
            println!();
            println!(
                "   {} {} patients share {}; showing the most recently updated",
                "Warning:".yellow().bold(),
                warning.match_count,
                warning.email
            );
            for id in &warning.candidate_ids {
                println!("     - {id}");
            }
        }
    }
    Ok(())
}

fn print_resolved(record: &PatientRecord, strategy: &str) {
    println!();
    println!("{} via {}", "FOUND".green().bold(), strategy);
    print_patient(record);
}

fn describe(query: &LookupQuery) -> String {
    [
        ("system id", &query.system_id),
        ("medical id", &query.medical_identifier),
        ("email", &query.email_address),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label} '{v}'")))
    .collect::<Vec<_>>()
    .join(", ")
}
