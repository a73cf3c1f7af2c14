//! Scan command implementation.
//!
//! Replays a frame script through a scripted camera and the full patient
//! picker: scanner session, QR payload validation, lookup and selection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use tracing::{debug, info};

use mrn_core::scanner::ScriptedCamera;
use mrn_core::{
    CameraFacing, IdentityResolver, PatientPicker, PickerEvent, ResolveError, ScanEvent, Scanner,
    ScannerConfig, SearchConfig,
};

use crate::exit_codes::{BadInput, NoMatch};
use crate::utils::{load_fixture, parse_frames, print_patient};

pub struct ScanArgs {
    pub fixture: PathBuf,
    pub frames: PathBuf,
    pub facing: Option<CameraFacing>,
    pub timeout: Duration,
    pub quiet: bool,
}

/// Scan until a code is read and resolved, the scanner gives up, or the
/// timeout passes without a code.
pub async fn execute(args: ScanArgs) -> Result<()> {
    let store = load_fixture(&args.fixture)?;
    let script = std::fs::read_to_string(&args.frames)
        .with_context(|| format!("Failed to read frame script: {}", args.frames.display()))?;
    let sessions = parse_frames(&script)
        .map_err(|e| BadInput(format!("{}: {e}", args.frames.display())))?;

    let camera = Arc::new(ScriptedCamera::with_default_devices());
    for session in sessions {
        camera.push_session(session);
    }

    let mut config = ScannerConfig::from_env();
    if let Some(facing) = args.facing {
        config.facing = facing;
    }
    let scanner = Scanner::new(camera.clone(), camera.clone(), config);
    let (mut picker, _selected) = PatientPicker::new(
        IdentityResolver::new(store),
        scanner,
        SearchConfig::from_env(),
    );

    picker.open_scanner().context("Failed to open scanner")?;

    loop {
        let event = tokio::time::timeout(args.timeout, picker.next_event())
            .await
            .map_err(|_| {
                anyhow!(
                    "No code scanned within {} ms",
                    args.timeout.as_millis()
                )
            })?;
        let Some(event) = event else {
            bail!("Scanner stopped without reading a code");
        };
        debug!(?event, "Picker event");

        match event {
            PickerEvent::Selected(record) => {
                info!(system_id = %record.system_id, "Patient selected from scan");
                if !args.quiet {
                    println!();
                    println!("{}", "SELECTED".green().bold());
                    print_patient(&record);
                }
                return Ok(());
            }
            PickerEvent::NotFound(medical_id) => {
                return Err(NoMatch(format!("scanned medical id '{medical_id}'")).into());
            }
            PickerEvent::InvalidCode { payload, error } => {
                return Err(anyhow::Error::new(error)
                    .context(format!("Scanned code '{payload}' is not a medical identifier")));
            }
            PickerEvent::LookupFailed { message, retryable } => {
                if retryable {
                    return Err(anyhow::Error::new(ResolveError::StoreUnavailable(message))
                        .context("Lookup failed"));
                }
                bail!("Lookup failed: {message}");
            }
            PickerEvent::Results(_) => {}
            PickerEvent::Scanner(event) => report_scanner_event(event, args.quiet)?,
        }
    }
}

/// Print lifecycle progress; terminal scanner failures become errors.
fn report_scanner_event(event: ScanEvent, quiet: bool) -> Result<()> {
    match event {
        ScanEvent::Started { session_id, device } => {
            if !quiet {
                println!(
                    "{} {} ({})",
                    "Scanning with".dimmed(),
                    device.label,
                    session_id
                );
            }
            Ok(())
        }
        ScanEvent::RetryScheduled {
            attempt,
            delay,
            error,
        } => {
            if !quiet {
                println!(
                    "{} {} (attempt {}, retrying in {} ms)",
                    "Camera fault:".yellow(),
                    error,
                    attempt,
                    delay.as_millis()
                );
            }
            Ok(())
        }
        ScanEvent::Retrying { attempt, .. } => {
            if !quiet {
                println!("{} {}", "Retrying after fault".dimmed(), attempt);
            }
            Ok(())
        }
        ScanEvent::RetriesExhausted { attempts, error } => Err(anyhow::Error::new(error)
            .context(format!("Scanner gave up after {attempts} consecutive faults"))),
        ScanEvent::Fatal(error) => Err(anyhow::Error::new(error).context("Scanner failed")),
        ScanEvent::Blocked(error) => {
            Err(anyhow::Error::new(error).context("Camera is held by another scanner"))
        }
        // The picker consumes decodes itself.
        ScanEvent::Decoded { .. } => Ok(()),
    }
}
