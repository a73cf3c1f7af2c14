//! Patient store collaborator.
//!
//! The database is owned elsewhere; this module only fixes the contract the
//! resolver needs:
//!
//! - point lookup by opaque record id
//! - indexed lookup by medical identifier
//! - containment lookup over the semi-structured contact field
//! - free-text lookup over names and identifiers
//!
//! Every record carries `updated_at` for tie-breaking.
//!
//! Two implementations live here: [`InMemoryPatientStore`] (fixtures, tests,
//! development) and [`RetryingPatientStore`], a wrapper that retries transient
//! outages with exponential backoff.

#[cfg(feature = "runtime")]
mod memory;
#[cfg(feature = "runtime")]
mod retry;

#[cfg(feature = "runtime")]
pub use memory::{InMemoryPatientStore, MemoryStoreStats};
#[cfg(feature = "runtime")]
pub use retry::{RetryingPatientStore, StoreRetryConfig};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{Classify, ErrorKind};

#[cfg(feature = "runtime")]
use crate::identifier::MedicalIdentifier;

/// A patient row as the store returns it, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPatient {
    pub id: Uuid,
    #[serde(default, alias = "medical_id", alias = "mrn")]
    pub medical_id: Option<String>,
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub contact: Value,
    #[serde(default)]
    pub address: Value,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default, alias = "date_of_birth")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub hospital: Option<String>,
    #[serde(alias = "updated_at")]
    pub updated_at: DateTime<Utc>,
}

/// Errors surfaced by a patient store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached. Retryable.
    #[error("Patient store unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the query.
    #[error("Query error: {0}")]
    Query(String),

    /// A row could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::Transient,
            Self::Query(_) | Self::Serialization(_) => ErrorKind::Fatal,
        }
    }
}

/// Read-only access to stored patients.
///
/// Implementations must be thread-safe (`Send + Sync`); lookups are
/// idempotent and may run concurrently.
#[cfg(feature = "runtime")]
#[async_trait::async_trait]
pub trait PatientStore: Send + Sync {
    /// Primary-key lookup.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredPatient>, StoreError>;

    /// Indexed lookup by medical identifier (case-insensitive).
    async fn find_by_medical_id(
        &self,
        medical_id: &MedicalIdentifier,
    ) -> Result<Option<StoredPatient>, StoreError>;

    /// Every record whose contact field contains `needle` (case-insensitive).
    async fn find_by_contact(&self, needle: &str) -> Result<Vec<StoredPatient>, StoreError>;

    /// Records whose name or medical identifier contains `text`, at most `limit`.
    async fn search_text(&self, text: &str, limit: usize)
        -> Result<Vec<StoredPatient>, StoreError>;

    /// Cheap liveness check.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
