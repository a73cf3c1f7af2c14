//! Retrying store wrapper.
//!
//! Wraps any [`PatientStore`] and retries [`StoreError::Unavailable`] with
//! exponential backoff. Query and serialization errors are permanent and
//! returned immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{PatientStore, StoreError, StoredPatient};
use crate::identifier::MedicalIdentifier;

/// Default initial retry interval.
const INITIAL_INTERVAL: Duration = Duration::from_millis(100);

/// Default maximum retry interval.
const MAX_INTERVAL: Duration = Duration::from_secs(2);

/// Default total time budget for one lookup including retries.
const MAX_ELAPSED: Duration = Duration::from_secs(10);

/// Backoff settings for [`RetryingPatientStore`].
#[derive(Debug, Clone)]
pub struct StoreRetryConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for StoreRetryConfig {
    fn default() -> Self {
        Self {
            initial_interval: INITIAL_INTERVAL,
            max_interval: MAX_INTERVAL,
            max_elapsed: MAX_ELAPSED,
        }
    }
}

/// A [`PatientStore`] that retries transient outages of an inner store.
pub struct RetryingPatientStore {
    inner: Arc<dyn PatientStore>,
    config: StoreRetryConfig,
}

impl RetryingPatientStore {
    pub fn new(inner: Arc<dyn PatientStore>) -> Self {
        Self::with_config(inner, StoreRetryConfig::default())
    }

    pub fn with_config(inner: Arc<dyn PatientStore>, config: StoreRetryConfig) -> Self {
        Self { inner, config }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let start = Instant::now();
        let result = retry_notify(
            self.build_backoff(),
            || {
                let attempt = call();
                async move { attempt.await.map_err(into_backoff) }
            },
            |err: StoreError, duration: Duration| {
                warn!(
                    operation,
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Store retry scheduled"
                );
            },
        )
        .await;

        let total_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(operation, total_latency_ms = total_ms, "Store lookup completed"),
            Err(e) => warn!(
                operation,
                error = %e,
                total_latency_ms = total_ms,
                "Store lookup failed after retries"
            ),
        }
        result
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.max_elapsed),
            ..Default::default()
        }
    }
}

fn into_backoff(err: StoreError) -> backoff::Error<StoreError> {
    match err {
        StoreError::Unavailable(_) => backoff::Error::transient(err),
        StoreError::Query(_) | StoreError::Serialization(_) => backoff::Error::permanent(err),
    }
}

#[async_trait]
impl PatientStore for RetryingPatientStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<StoredPatient>, StoreError> {
        self.with_retry("find_by_id", || self.inner.find_by_id(id))
            .await
    }

    async fn find_by_medical_id(
        &self,
        medical_id: &MedicalIdentifier,
    ) -> Result<Option<StoredPatient>, StoreError> {
        self.with_retry("find_by_medical_id", || {
            self.inner.find_by_medical_id(medical_id)
        })
        .await
    }

    async fn find_by_contact(&self, needle: &str) -> Result<Vec<StoredPatient>, StoreError> {
        self.with_retry("find_by_contact", || self.inner.find_by_contact(needle))
            .await
    }

    async fn search_text(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<StoredPatient>, StoreError> {
        self.with_retry("search_text", || self.inner.search_text(text, limit))
            .await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        // Health checks report the current state; no retries.
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Fails with the given error for the first `failures` calls.
    struct FlakyStore {
        failures: usize,
        error: StoreError,
        calls: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failures: usize, error: StoreError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicUsize::new(0),
            }
        }

        fn attempt(&self) -> Result<(), StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl PatientStore for FlakyStore {
        async fn find_by_id(&self, _id: Uuid) -> Result<Option<StoredPatient>, StoreError> {
            self.attempt().map(|_| None)
        }

        async fn find_by_medical_id(
            &self,
            _medical_id: &MedicalIdentifier,
        ) -> Result<Option<StoredPatient>, StoreError> {
            self.attempt().map(|_| None)
        }

        async fn find_by_contact(&self, _needle: &str) -> Result<Vec<StoredPatient>, StoreError> {
            self.attempt().map(|_| Vec::new())
        }

        async fn search_text(
            &self,
            _text: &str,
            _limit: usize,
        ) -> Result<Vec<StoredPatient>, StoreError> {
            self.attempt().map(|_| Vec::new())
        }
    }

    fn fast_config() -> StoreRetryConfig {
        StoreRetryConfig {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let inner = Arc::new(FlakyStore::new(
            2,
            StoreError::Unavailable("connection refused".into()),
        ));
        let store = RetryingPatientStore::with_config(inner.clone(), fast_config());

        let result = store.find_by_contact("x@y.z").await;
        assert!(result.is_ok());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_fail_fast() {
        let inner = Arc::new(FlakyStore::new(5, StoreError::Query("syntax".into())));
        let store = RetryingPatientStore::with_config(inner.clone(), fast_config());

        let result = store.search_text("john", 5).await;
        assert!(matches!(result, Err(StoreError::Query(_))));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
