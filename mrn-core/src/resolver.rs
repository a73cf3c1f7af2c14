//! Identity resolution.
//!
//! Resolves exactly one patient (or an explicit not-found) from whatever
//! identifiers a caller has. Strategies run in a fixed order and stop at the
//! first match:
//!
//! 1. **Direct id**: `system_id` shaped like a UUID, primary-key lookup.
//! 2. **System id as medical id**: `system_id` that is not a UUID is retried
//!    as a medical identifier. This means the caller sent the wrong id type;
//!    it is tolerated and logged.
//! 3. **Medical id**: indexed lookup.
//! 4. **Email**: containment search over the contact field. All matches are
//!    counted; more than one is a data-hygiene problem reported through
//!    [`DuplicateWarning`].
//!
//! ## Duplicate emails
//!
//! Under [`DuplicatePolicy::BestEffort`] (the default) the most recently
//! updated match is returned together with the warning. This favours
//! availability over strict correctness: the picked record may not be the one
//! the caller meant. Under [`DuplicatePolicy::Reject`] the lookup fails with
//! [`ResolveError::Ambiguous`] instead.

use std::cmp::Reverse;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::ResolverConfig;
use crate::error::{Classify, ErrorKind, IdentifierError};
use crate::identifier::MedicalIdentifier;
use crate::normalize::{normalize_patient, PatientRecord};
use crate::store::{PatientStore, StoreError, StoredPatient};

/// Identifiers a caller has for a patient. Every supplied field is tried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupQuery {
    pub system_id: Option<String>,
    pub medical_identifier: Option<String>,
    pub email_address: Option<String>,
}

impl LookupQuery {
    pub fn by_system_id(id: impl Into<String>) -> Self {
        Self {
            system_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_medical_identifier(id: impl Into<String>) -> Self {
        Self {
            medical_identifier: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email_address: Some(email.into()),
            ..Default::default()
        }
    }

    /// True when no field carries a non-blank value.
    pub fn is_empty(&self) -> bool {
        [&self.system_id, &self.medical_identifier, &self.email_address]
            .into_iter()
            .all(|field| non_blank(field).is_none())
    }
}

/// Which strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    DirectId,
    SystemIdAsMedicalId,
    MedicalId,
    Email,
}

impl LookupStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DirectId => "direct_id",
            Self::SystemIdAsMedicalId => "system_id_as_medical_id",
            Self::MedicalId => "medical_id",
            Self::Email => "email",
        }
    }
}

/// How to answer when an email matches more than one patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Return the most recently updated match, with a [`DuplicateWarning`].
    #[default]
    BestEffort,
    /// Fail with [`ResolveError::Ambiguous`].
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best_effort" | "best-effort" => Ok(Self::BestEffort),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown duplicate policy: {other}")),
        }
    }
}

/// Several patients share one email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateWarning {
    pub email: String,
    pub match_count: usize,
    /// Matching ids, most recently updated first.
    pub candidate_ids: Vec<Uuid>,
}

/// A single resolved patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPatient {
    pub record: PatientRecord,
    pub strategy: LookupStrategy,
    /// Set when the answer was picked among duplicates.
    pub duplicate: Option<DuplicateWarning>,
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ResolvedPatient),
    NotFound,
}

impl Resolution {
    pub fn found(&self) -> Option<&ResolvedPatient> {
        match self {
            Self::Found(resolved) => Some(resolved),
            Self::NotFound => None,
        }
    }

    pub fn into_found(self) -> Option<ResolvedPatient> {
        match self {
            Self::Found(resolved) => Some(resolved),
            Self::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid medical identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("{} patients share email {}", .0.match_count, .0.email)]
    Ambiguous(DuplicateWarning),

    #[error("Patient store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Patient store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ResolveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
            other => Self::Store(other),
        }
    }
}

impl Classify for ResolveError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidQuery(_) | Self::InvalidIdentifier(_) => ErrorKind::Validation,
            Self::Ambiguous(_) => ErrorKind::Duplicate,
            Self::StoreUnavailable(_) => ErrorKind::Transient,
            Self::Store(_) => ErrorKind::Fatal,
        }
    }
}

/// One planned store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    ById(Uuid),
    ByMedicalId(MedicalIdentifier, LookupStrategy),
    ByEmail(String),
}

/// Resolves patients against a [`PatientStore`].
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn PatientStore>,
    config: ResolverConfig,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn PatientStore>) -> Self {
        Self::with_config(store, ResolverConfig::default())
    }

    pub fn with_config(store: Arc<dyn PatientStore>, config: ResolverConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn PatientStore> {
        &self.store
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.config.duplicate_policy
    }

    /// Resolve one patient from a query.
    ///
    /// Malformed queries fail before the store is touched. Store outages
    /// surface as [`ResolveError::StoreUnavailable`], which is retryable.
    #[instrument(
        level = "debug",
        skip_all,
        fields(
            has_system_id = query.system_id.is_some(),
            has_medical_id = query.medical_identifier.is_some(),
            has_email = query.email_address.is_some()
        )
    )]
    pub async fn resolve(&self, query: &LookupQuery) -> Result<Resolution, ResolveError> {
        for step in plan(query)? {
            if let Some(resolved) = self.run_step(step).await? {
                info!(
                    strategy = resolved.strategy.as_str(),
                    system_id = %resolved.record.system_id,
                    duplicate = resolved.duplicate.is_some(),
                    "Patient resolved"
                );
                return Ok(Resolution::Found(resolved));
            }
        }
        debug!("No strategy matched");
        Ok(Resolution::NotFound)
    }

    /// Strategy 3 on its own; used by the scanner path.
    #[instrument(level = "debug", skip(self), fields(medical_id = %medical_id))]
    pub async fn resolve_medical_id(
        &self,
        medical_id: &MedicalIdentifier,
    ) -> Result<Resolution, ResolveError> {
        let step = Step::ByMedicalId(medical_id.clone(), LookupStrategy::MedicalId);
        Ok(match self.run_step(step).await? {
            Some(resolved) => Resolution::Found(resolved),
            None => Resolution::NotFound,
        })
    }

    /// Free-text search over normalized names and medical identifiers.
    ///
    /// Blank text returns no results without touching the store.
    #[instrument(level = "debug", skip(self, text), fields(text_len = text.len()))]
    pub async fn search(&self, text: &str, limit: usize) -> Result<Vec<PatientRecord>, ResolveError> {
        let needle = text.trim();
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let lowered = needle.to_lowercase();

        let mut records: Vec<PatientRecord> = self
            .store
            .search_text(needle, limit)
            .await?
            .iter()
            .map(normalize_patient)
            .filter(|record| {
                record.full_name.to_lowercase().contains(&lowered)
                    || record
                        .medical_identifier
                        .as_ref()
                        .is_some_and(|id| id.as_str().to_lowercase().contains(&lowered))
            })
            .collect();
        records.sort_by(|a, b| {
            a.full_name
                .to_lowercase()
                .cmp(&b.full_name.to_lowercase())
                .then(a.system_id.cmp(&b.system_id))
        });
        records.truncate(limit);

        debug!(results = records.len(), "Search completed");
        Ok(records)
    }

    async fn run_step(&self, step: Step) -> Result<Option<ResolvedPatient>, ResolveError> {
        match step {
            Step::ById(id) => Ok(self
                .store
                .find_by_id(id)
                .await?
                .map(|stored| single(&stored, LookupStrategy::DirectId))),
            Step::ByMedicalId(medical_id, strategy) => {
                if strategy == LookupStrategy::SystemIdAsMedicalId {
                    warn!(
                        strategy = strategy.as_str(),
                        medical_id = %medical_id,
                        "system_id is not an opaque id; retrying it as a medical identifier"
                    );
                }
                Ok(self
                    .store
                    .find_by_medical_id(&medical_id)
                    .await?
                    .map(|stored| single(&stored, strategy)))
            }
            Step::ByEmail(email) => self.resolve_email(email).await,
        }
    }

    async fn resolve_email(&self, email: String) -> Result<Option<ResolvedPatient>, ResolveError> {
        // The store matches by containment; only records carrying this exact
        // address count as matches.
        let candidates = self.store.find_by_contact(&email).await?;
        let candidate_count = candidates.len();
        let mut matches: Vec<PatientRecord> = candidates
            .iter()
            .map(normalize_patient)
            .filter(|record| {
                record
                    .email_address
                    .as_deref()
                    .is_some_and(|address| address.trim().to_lowercase() == email)
            })
            .collect();
        if matches.len() < candidate_count {
            debug!(
                candidates = candidate_count,
                exact = matches.len(),
                "Dropped partial email matches"
            );
        }

        if matches.len() <= 1 {
            return Ok(matches.pop().map(|record| ResolvedPatient {
                record,
                strategy: LookupStrategy::Email,
                duplicate: None,
            }));
        }

        // Most recently updated first; id breaks exact ties deterministically.
        matches.sort_by_key(|record| (Reverse(record.updated_at), record.system_id));
        let warning = DuplicateWarning {
            email,
            match_count: matches.len(),
            candidate_ids: matches.iter().map(|record| record.system_id).collect(),
        };
        warn!(
            match_count = warning.match_count,
            candidates = ?warning.candidate_ids,
            policy = ?self.config.duplicate_policy,
            "Multiple patients share one email address"
        );

        match self.config.duplicate_policy {
            DuplicatePolicy::Reject => Err(ResolveError::Ambiguous(warning)),
            DuplicatePolicy::BestEffort => Ok(Some(ResolvedPatient {
                record: matches.swap_remove(0),
                strategy: LookupStrategy::Email,
                duplicate: Some(warning),
            })),
        }
    }
}

fn single(stored: &StoredPatient, strategy: LookupStrategy) -> ResolvedPatient {
    ResolvedPatient {
        record: normalize_patient(stored),
        strategy,
        duplicate: None,
    }
}

/// Turn a query into ordered store lookups.
///
/// A malformed field is skipped when other usable fields exist; if nothing
/// usable remains, the first rejection is returned.
fn plan(query: &LookupQuery) -> Result<Vec<Step>, ResolveError> {
    if query.is_empty() {
        return Err(ResolveError::InvalidQuery(
            "one of system_id, medical_identifier or email_address is required".into(),
        ));
    }

    let mut steps = Vec::new();
    let mut rejection: Option<ResolveError> = None;

    if let Some(raw) = non_blank(&query.system_id) {
        match Uuid::try_parse(raw) {
            Ok(id) => steps.push(Step::ById(id)),
            Err(_) => match MedicalIdentifier::parse(raw) {
                Ok(id) => steps.push(Step::ByMedicalId(id, LookupStrategy::SystemIdAsMedicalId)),
                Err(e) => {
                    debug!(error = %e, "system_id is neither a UUID nor a medical identifier");
                    rejection.get_or_insert(ResolveError::InvalidQuery(
                        "system_id is neither a UUID nor a medical identifier".into(),
                    ));
                }
            },
        }
    }

    if let Some(raw) = non_blank(&query.medical_identifier) {
        match MedicalIdentifier::parse(raw) {
            Ok(id) => {
                let already_planned = steps
                    .iter()
                    .any(|step| matches!(step, Step::ByMedicalId(planned, _) if *planned == id));
                if !already_planned {
                    steps.push(Step::ByMedicalId(id, LookupStrategy::MedicalId));
                }
            }
            Err(e) => {
                debug!(error = %e, "Skipping malformed medical identifier");
                rejection.get_or_insert(ResolveError::InvalidIdentifier(e));
            }
        }
    }

    if let Some(raw) = non_blank(&query.email_address) {
        if raw.contains('@') {
            steps.push(Step::ByEmail(raw.to_lowercase()));
        } else {
            rejection.get_or_insert(ResolveError::InvalidQuery(
                "email_address is not an email address".into(),
            ));
        }
    }

    match (steps.is_empty(), rejection) {
        (true, Some(err)) => Err(err),
        _ => Ok(steps),
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
