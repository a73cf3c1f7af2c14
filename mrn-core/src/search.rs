//! Patient picker: one "select a patient" contract over typed search and
//! QR scanning.
//!
//! Typing is debounced before the resolver is queried. A decoded QR payload
//! is validated as a medical identifier first, so malformed codes never reach
//! the store. Every selection, manual or scanned, is published on the channel
//! returned by [`PatientPicker::new`] and clears the query and results.

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::error::{Classify, IdentifierError};
use crate::identifier::MedicalIdentifier;
use crate::normalize::PatientRecord;
use crate::resolver::{IdentityResolver, Resolution};
use crate::scanner::{ScanEvent, Scanner, ScannerError, SessionId};

/// What the picker reports from [`PatientPicker::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
    /// Search results replaced the previous list.
    Results(Vec<PatientRecord>),
    /// A scanned code is not a medical identifier. No lookup was made.
    InvalidCode {
        payload: String,
        error: IdentifierError,
    },
    /// A patient was selected and published.
    Selected(PatientRecord),
    /// A scanned identifier matched no patient.
    NotFound(MedicalIdentifier),
    /// Scanner lifecycle event other than a decode.
    Scanner(ScanEvent),
    /// The resolver failed; `retryable` mirrors the error classification.
    LookupFailed { message: String, retryable: bool },
}

pub struct PatientPicker {
    resolver: IdentityResolver,
    scanner: Scanner,
    config: SearchConfig,
    query: String,
    results: Vec<PatientRecord>,
    search_at: Option<Instant>,
    /// Decoded payload whose lookup has not finished yet.
    pending_scan: Option<String>,
    selected: mpsc::UnboundedSender<PatientRecord>,
}

impl PatientPicker {
    /// Build a picker and the stream of selected patients.
    pub fn new(
        resolver: IdentityResolver,
        scanner: Scanner,
        config: SearchConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PatientRecord>) {
        let (selected, rx) = mpsc::unbounded_channel();
        let picker = Self {
            resolver,
            scanner,
            config,
            query: String::new(),
            results: Vec::new(),
            search_at: None,
            pending_scan: None,
            selected,
        };
        (picker, rx)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[PatientRecord] {
        &self.results
    }

    pub fn search_pending(&self) -> bool {
        self.search_at.is_some()
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut Scanner {
        &mut self.scanner
    }

    /// The search text changed.
    ///
    /// Restarts the debounce timer. Blank text clears results at once and
    /// cancels any pending search.
    pub fn on_input(&mut self, text: impl Into<String>) {
        self.query = text.into();
        if self.query.trim().is_empty() {
            self.search_at = None;
            self.results.clear();
            debug!("Search cleared");
        } else {
            self.search_at = Some(Instant::now() + self.config.debounce);
        }
    }

    pub fn open_scanner(&mut self) -> Result<SessionId, ScannerError> {
        self.scanner.open()
    }

    pub async fn close_scanner(&mut self) {
        self.scanner.stop().await;
    }

    /// Manual selection from the result list.
    pub fn select(&mut self, record: PatientRecord) {
        info!(system_id = %record.system_id, source = "list", "Patient selected");
        self.publish(record);
    }

    /// Wait for the debounce timer or the scanner, whichever fires first.
    ///
    /// Returns `None` when neither has anything pending. Cancel-safe: a due
    /// search and a decoded payload stay in `self` until their lookup
    /// finishes, so a dropped call resumes them on the next call.
    pub async fn next_event(&mut self) -> Option<PickerEvent> {
        if self.pending_scan.is_none() {
            let search_at = self.search_at;
            let scanning = self.scanner.is_engaged();

            tokio::select! {
                _ = sleep_until(search_at.unwrap_or_else(Instant::now)), if search_at.is_some() => {
                    let event = self.run_search().await;
                    self.search_at = None;
                    return Some(event);
                }
                Some(event) = self.scanner.next_event(), if scanning => {
                    match event {
                        ScanEvent::Decoded { payload, .. } => self.pending_scan = Some(payload),
                        other => return Some(PickerEvent::Scanner(other)),
                    }
                }
                else => return None,
            }
        }

        let payload = self.pending_scan.clone()?;
        let event = self.on_scan(payload).await;
        self.pending_scan = None;
        Some(event)
    }

    async fn run_search(&mut self) -> PickerEvent {
        let text = self.query.trim().to_string();
        match self.resolver.search(&text, self.config.result_limit).await {
            Ok(results) => {
                debug!(results = results.len(), "Search results updated");
                self.results = results.clone();
                PickerEvent::Results(results)
            }
            Err(e) => {
                warn!(error = %e, "Search failed");
                PickerEvent::LookupFailed {
                    message: e.to_string(),
                    retryable: e.is_retryable(),
                }
            }
        }
    }

    async fn on_scan(&mut self, payload: String) -> PickerEvent {
        let medical_id = match MedicalIdentifier::from_qr_payload(&payload) {
            Ok(id) => id,
            Err(error) => {
                warn!(error = %error, "Scanned code is not a medical identifier");
                return PickerEvent::InvalidCode { payload, error };
            }
        };

        match self.resolver.resolve_medical_id(&medical_id).await {
            Ok(Resolution::Found(resolved)) => {
                self.scanner.stop().await;
                info!(
                    system_id = %resolved.record.system_id,
                    source = "scanner",
                    "Patient selected"
                );
                self.publish(resolved.record.clone());
                PickerEvent::Selected(resolved.record)
            }
            Ok(Resolution::NotFound) => {
                info!(medical_id = %medical_id, "Scanned identifier matched no patient");
                PickerEvent::NotFound(medical_id)
            }
            Err(e) => {
                warn!(error = %e, "Scanned identifier lookup failed");
                PickerEvent::LookupFailed {
                    message: e.to_string(),
                    retryable: e.is_retryable(),
                }
            }
        }
    }

    fn publish(&mut self, record: PatientRecord) {
        self.query.clear();
        self.results.clear();
        self.search_at = None;
        if self.selected.send(record).is_err() {
            debug!("Selection receiver dropped");
        }
    }
}
