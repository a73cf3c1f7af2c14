//! Process-wide camera ownership.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{debug, warn};

use super::{ScannerError, SessionId};

/// Tracks which session, if any, currently owns the camera.
///
/// `try_acquire` is an atomic check-and-set; the lock is only ever held
/// synchronously. Use [`CameraRegistry::global`] in applications and a fresh
/// instance per test.
#[derive(Debug, Default)]
pub struct CameraRegistry {
    active: Mutex<Option<SessionId>>,
}

impl CameraRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The shared registry for this process.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<CameraRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(CameraRegistry::new))
    }

    /// Claim the camera for `session_id`, or report the current holder.
    pub fn try_acquire(self: &Arc<Self>, session_id: SessionId) -> Result<CameraLease, ScannerError> {
        let mut slot = self.slot();
        if let Some(holder) = *slot {
            warn!(
                session_id = %session_id,
                holder = %holder,
                "Camera already claimed; start rejected"
            );
            return Err(ScannerError::AlreadyActive { holder });
        }
        *slot = Some(session_id);
        debug!(session_id = %session_id, "Camera claimed");
        Ok(CameraLease {
            registry: Arc::clone(self),
            session_id,
        })
    }

    /// Session currently holding the camera.
    pub fn active_session(&self) -> Option<SessionId> {
        *self.slot()
    }

    pub fn is_free(&self) -> bool {
        self.active_session().is_none()
    }

    fn release(&self, session_id: SessionId) {
        let mut slot = self.slot();
        if *slot == Some(session_id) {
            *slot = None;
            debug!(session_id = %session_id, "Camera released");
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<SessionId>> {
        // The guarded value is a plain Option; a poisoned lock is still consistent.
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of camera ownership. Releases the registry slot on drop.
#[derive(Debug)]
pub struct CameraLease {
    registry: Arc<CameraRegistry>,
    session_id: SessionId,
}

impl CameraLease {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.registry.release(self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let registry = CameraRegistry::new();
        let first = SessionId::next();
        let _lease = registry.try_acquire(first).unwrap();

        let err = registry.try_acquire(SessionId::next()).unwrap_err();
        assert_eq!(err, ScannerError::AlreadyActive { holder: first });
        assert_eq!(registry.active_session(), Some(first));
    }

    #[test]
    fn test_drop_releases_slot() {
        let registry = CameraRegistry::new();
        {
            let _lease = registry.try_acquire(SessionId::next()).unwrap();
            assert!(!registry.is_free());
        }
        assert!(registry.is_free());
        assert!(registry.try_acquire(SessionId::next()).is_ok());
    }

    #[test]
    fn test_stale_release_does_not_clear_new_owner() {
        let registry = CameraRegistry::new();
        let old = SessionId::next();
        let new = SessionId::next();

        registry.release(old);
        let _lease = registry.try_acquire(new).unwrap();
        registry.release(old);
        assert_eq!(registry.active_session(), Some(new));
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&CameraRegistry::global(), &CameraRegistry::global()));
    }
}
