//! In-memory patient store.
//!
//! Backs the CLI fixtures, the server's development mode and the test suites.
//! Lookups are counted so callers can assert which strategies touched the store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::{PatientStore, StoreError, StoredPatient};
use crate::identifier::MedicalIdentifier;
use crate::normalize::normalize_patient;

/// Lookup counters for an [`InMemoryPatientStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub records: usize,
    pub by_id: usize,
    pub by_medical_id: usize,
    pub by_contact: usize,
    pub search_text: usize,
}

impl MemoryStoreStats {
    /// Total number of lookups of any kind.
    pub fn total_lookups(&self) -> usize {
        self.by_id + self.by_medical_id + self.by_contact + self.search_text
    }
}

#[derive(Debug, Default)]
struct Counters {
    by_id: AtomicUsize,
    by_medical_id: AtomicUsize,
    by_contact: AtomicUsize,
    search_text: AtomicUsize,
}

/// Thread-safe in-memory store keyed by record id.
#[derive(Debug)]
pub struct InMemoryPatientStore {
    patients: DashMap<Uuid, StoredPatient>,
    available: AtomicBool,
    counters: Counters,
}

impl Default for InMemoryPatientStore {
    fn default() -> Self {
        Self {
            patients: DashMap::new(),
            available: AtomicBool::new(true),
            counters: Counters::default(),
        }
    }
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from existing records.
    pub fn with_patients(patients: impl IntoIterator<Item = StoredPatient>) -> Self {
        let store = Self::new();
        for patient in patients {
            store.insert(patient);
        }
        store
    }

    /// Load a JSON array of stored patients.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let patients: Vec<StoredPatient> = serde_json::from_str(json)
            .map_err(|e| StoreError::Serialization(format!("Invalid patient fixture: {e}")))?;
        debug!(count = patients.len(), "Loaded patient fixture");
        Ok(Self::with_patients(patients))
    }

    /// Insert or replace a record.
    pub fn insert(&self, patient: StoredPatient) {
        self.patients.insert(patient.id, patient);
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    /// Simulate an outage: while unavailable every lookup fails with
    /// [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            records: self.patients.len(),
            by_id: self.counters.by_id.load(Ordering::SeqCst),
            by_medical_id: self.counters.by_medical_id.load(Ordering::SeqCst),
            by_contact: self.counters.by_contact.load(Ordering::SeqCst),
            search_text: self.counters.search_text.load(Ordering::SeqCst),
        }
    }

    fn check_available(&self, counter: &AtomicUsize) -> Result<(), StoreError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store marked unavailable".into()))
        }
    }
}

#[async_trait]
impl PatientStore for InMemoryPatientStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredPatient>, StoreError> {
        self.check_available(&self.counters.by_id)?;
        Ok(self.patients.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_medical_id(
        &self,
        medical_id: &MedicalIdentifier,
    ) -> Result<Option<StoredPatient>, StoreError> {
        self.check_available(&self.counters.by_medical_id)?;
        Ok(self
            .patients
            .iter()
            .find(|entry| {
                entry
                    .medical_id
                    .as_deref()
                    .is_some_and(|stored| stored.trim().eq_ignore_ascii_case(medical_id.as_str()))
            })
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_contact(&self, needle: &str) -> Result<Vec<StoredPatient>, StoreError> {
        self.check_available(&self.counters.by_contact)?;
        let needle = needle.to_lowercase();
        Ok(self
            .patients
            .iter()
            .filter(|entry| {
                let haystack = match &entry.contact {
                    serde_json::Value::String(raw) => raw.to_lowercase(),
                    other => other.to_string().to_lowercase(),
                };
                haystack.contains(&needle)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn search_text(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<StoredPatient>, StoreError> {
        self.check_available(&self.counters.search_text)?;
        let text = text.to_lowercase();
        let mut matches: Vec<(String, StoredPatient)> = self
            .patients
            .iter()
            .filter_map(|entry| {
                let record = normalize_patient(entry.value());
                let name = record.full_name.to_lowercase();
                let id_matches = record
                    .medical_identifier
                    .as_ref()
                    .is_some_and(|id| id.as_str().to_lowercase().contains(&text));
                (name.contains(&text) || id_matches).then(|| (name, entry.value().clone()))
            })
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
        matches.truncate(limit);
        Ok(matches.into_iter().map(|(_, patient)| patient).collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store marked unavailable".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    fn patient(id: &str, mrn: &str, name: &str, email: &str) -> StoredPatient {
        StoredPatient {
            id: Uuid::parse_str(id).unwrap(),
            medical_id: Some(mrn.into()),
            name: json!(name),
            contact: json!([{"system": "email", "value": email}]),
            address: json!(null),
            photo: None,
            date_of_birth: None,
            gender: None,
            hospital: None,
            updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn store() -> InMemoryPatientStore {
        InMemoryPatientStore::with_patients([
            patient("00000000-0000-4000-8000-000000000001", "AB12C", "John Doe", "john@example.com"),
            patient("00000000-0000-4000-8000-000000000002", "ZX98Y", "Johnny Cash", "jc@example.com"),
            patient("00000000-0000-4000-8000-000000000003", "QQ11Q", "Ann Lee", "ann@example.com"),
        ])
    }

    #[tokio::test]
    async fn test_find_by_medical_id_is_case_insensitive() {
        let store = store();
        store.insert(patient(
            "00000000-0000-4000-8000-000000000004",
            "mm55m",
            "Lower Case",
            "lc@example.com",
        ));
        let id = MedicalIdentifier::parse("MM55M").unwrap();
        let found = store.find_by_medical_id(&id).await.unwrap().unwrap();
        assert_eq!(found.name, json!("Lower Case"));
    }

    #[tokio::test]
    async fn test_find_by_contact_is_containment() {
        let store = store();
        let matches = store.find_by_contact("JOHN@example").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(store.stats().by_contact, 1);
    }

    #[tokio::test]
    async fn test_search_text_matches_names_and_ids() {
        let store = store();
        let matches = store.search_text("john", 10).await.unwrap();
        assert_eq!(matches.len(), 2);

        let matches = store.search_text("zx9", 10).await.unwrap();
        assert_eq!(matches.len(), 1);

        let matches = store.search_text("john", 1).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, json!("John Doe"));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_lookup() {
        let store = store();
        store.set_available(false);
        let id = Uuid::parse_str("00000000-0000-4000-8000-000000000001").unwrap();
        assert!(matches!(
            store.find_by_id(id).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.health_check().await.is_err());

        store.set_available(true);
        assert!(store.find_by_id(id).await.unwrap().is_some());
        assert_eq!(store.stats().by_id, 2);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            InMemoryPatientStore::from_json("{not json"),
            Err(StoreError::Serialization(_))
        ));
        let store = InMemoryPatientStore::from_json("[]").unwrap();
        assert!(store.is_empty());
    }
}
