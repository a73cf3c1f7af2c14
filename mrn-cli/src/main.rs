//! MRN CLI - medical identifier checks, patient lookup and scripted QR scans.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use mrn_core::{CameraFacing, DuplicatePolicy, LookupQuery};

mod commands;
mod exit_codes;
mod utils;

use commands::resolve::ResolveArgs;
use commands::scan::ScanArgs;
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   success
  1   general error
  65  invalid identifier, invalid query or ambiguous match
  66  input file missing or unreadable
  67  no patient matched
  69  patient store or camera unavailable";

#[derive(Parser)]
#[command(name = "mrn")]
#[command(author, version, about = "Medical identifier and patient lookup tool", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check values against the medical identifier format
    Validate {
        /// Values to check
        #[arg(value_name = "ID", required = true)]
        identifiers: Vec<String>,
    },

    /// Print the display form of stored identifier values
    Display {
        /// Stored values; none prints the form of a missing value
        #[arg(value_name = "VALUE")]
        values: Vec<String>,
    },

    /// Resolve exactly one patient from known identifiers
    Resolve {
        /// JSON array of stored patients
        #[arg(short, long, value_name = "FILE")]
        fixture: PathBuf,

        /// Opaque record id (or a medical identifier passed as one)
        #[arg(long)]
        system_id: Option<String>,

        /// Medical identifier
        #[arg(long, short = 'm')]
        medical_id: Option<String>,

        /// Email address
        #[arg(long, short = 'e')]
        email: Option<String>,

        /// What to do when several patients share the email: best-effort or reject
        #[arg(long, default_value = "best-effort", value_parser = parse_policy)]
        policy: DuplicatePolicy,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Search patients by name or medical identifier
    Search {
        /// JSON array of stored patients
        #[arg(short, long, value_name = "FILE")]
        fixture: PathBuf,

        /// Search text
        #[arg(value_name = "TEXT")]
        text: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Run a frame script through the scanner and select the scanned patient
    Scan {
        /// JSON array of stored patients
        #[arg(short, long, value_name = "FILE")]
        fixture: PathBuf,

        /// Frame script: one payload per line, `-` for a blank frame,
        /// `!timeout`/`!denied`/`!missing`/`!fail <reason>` for faults,
        /// `---` between capture sessions
        #[arg(long, value_name = "FILE")]
        frames: PathBuf,

        /// Preferred camera: back or front
        #[arg(long, value_parser = parse_facing)]
        facing: Option<CameraFacing>,

        /// Give up if no code is read within this many milliseconds
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
    },
}

fn parse_policy(raw: &str) -> Result<DuplicatePolicy, String> {
    raw.parse()
}

fn parse_facing(raw: &str) -> Result<CameraFacing, String> {
    raw.parse()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}

async fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Validate { identifiers } => commands::validate::execute(identifiers, quiet),
        Commands::Display { values } => commands::display::execute(values),
        Commands::Resolve {
            fixture,
            system_id,
            medical_id,
            email,
            policy,
            json,
        } => {
            commands::resolve::execute(ResolveArgs {
                fixture,
                query: LookupQuery {
                    system_id,
                    medical_identifier: medical_id,
                    email_address: email,
                },
                policy,
                json,
                quiet,
            })
            .await
        }
        Commands::Search {
            fixture,
            text,
            limit,
            json,
        } => commands::search::execute(fixture, text, limit, json, quiet).await,
        Commands::Scan {
            fixture,
            frames,
            facing,
            timeout_ms,
        } => {
            commands::scan::execute(ScanArgs {
                fixture,
                frames,
                facing,
                timeout: Duration::from_millis(timeout_ms),
                quiet,
            })
            .await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}
