//! The scanner state machine.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, instrument, trace, warn};

use super::{
    choose_device, CameraDevice, CameraFacing, CameraLease, CameraPlatform, CameraRegistry,
    CaptureEvent, CaptureHandle, CaptureStream, DeviceError, FailureTracker, QrDecoder,
    ScannerError, ScannerSession, ScannerState, SessionId,
};
use crate::config::ScannerConfig;

/// What the scanner reports from [`Scanner::next_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// Capture is running.
    Started {
        session_id: SessionId,
        device: CameraDevice,
    },
    /// A code was read. The session has already ended and the camera is free.
    Decoded {
        session_id: SessionId,
        payload: String,
    },
    /// A transient fault ended the session; a retry runs after `delay`.
    RetryScheduled {
        attempt: u32,
        delay: Duration,
        error: DeviceError,
    },
    /// A scheduled retry started a new session.
    Retrying {
        session_id: SessionId,
        attempt: u32,
    },
    /// Too many consecutive transient faults; automatic retry stopped.
    RetriesExhausted { attempts: u32, error: DeviceError },
    /// A fatal fault; only [`Scanner::retry`] restarts the scanner.
    Fatal(DeviceError),
    /// A scheduled retry could not claim the camera.
    Blocked(ScannerError),
}

type Acquisition = Result<(CameraDevice, CaptureStream), DeviceError>;

/// Camera claimed, capture being started in the background.
struct Pending {
    lease: CameraLease,
    task: JoinHandle<Acquisition>,
}

enum Phase {
    Idle,
    Initializing(Pending),
    Active(ScannerSession),
    Failed(DeviceError),
}

enum Step {
    Acquired(Result<Acquisition, tokio::task::JoinError>),
    Capture(Option<CaptureEvent>),
    RetryDue,
}

/// Drives one camera through the session lifecycle.
///
/// All methods take `&mut self`; drive the scanner from a single task.
/// [`next_event`](Self::next_event) is cancel-safe, so it can sit in a
/// `tokio::select!` next to other work.
pub struct Scanner {
    platform: Arc<dyn CameraPlatform>,
    decoder: Arc<dyn QrDecoder>,
    registry: Arc<CameraRegistry>,
    config: ScannerConfig,
    phase: Phase,
    tracker: FailureTracker,
    selected_device: Option<String>,
    retry_at: Option<Instant>,
    suspended: bool,
}

impl Scanner {
    /// Build a scanner using the process-wide [`CameraRegistry`].
    pub fn new(
        platform: Arc<dyn CameraPlatform>,
        decoder: Arc<dyn QrDecoder>,
        config: ScannerConfig,
    ) -> Self {
        let tracker = FailureTracker::new(config.retry.clone());
        Self {
            platform,
            decoder,
            registry: CameraRegistry::global(),
            config,
            phase: Phase::Idle,
            tracker,
            selected_device: None,
            retry_at: None,
            suspended: false,
        }
    }

    /// Use a dedicated registry instead of the global one.
    pub fn with_registry(mut self, registry: Arc<CameraRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn state(&self) -> ScannerState {
        match self.phase {
            Phase::Idle => ScannerState::Idle,
            Phase::Initializing(_) => ScannerState::Initializing,
            Phase::Active(_) => ScannerState::Active,
            Phase::Failed(_) => ScannerState::Error,
        }
    }

    /// Id of the session currently initializing or active.
    pub fn session_id(&self) -> Option<SessionId> {
        match &self.phase {
            Phase::Initializing(pending) => Some(pending.lease.session_id()),
            Phase::Active(session) => Some(session.id()),
            Phase::Idle | Phase::Failed(_) => None,
        }
    }

    /// The running session, if capture has started.
    pub fn session(&self) -> Option<&ScannerSession> {
        match &self.phase {
            Phase::Active(session) => Some(session),
            _ => None,
        }
    }

    /// The fault that put the scanner in the error state.
    pub fn last_error(&self) -> Option<&DeviceError> {
        match &self.phase {
            Phase::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Whether [`next_event`](Self::next_event) has anything to wait for.
    pub fn is_engaged(&self) -> bool {
        matches!(self.phase, Phase::Initializing(_) | Phase::Active(_)) || self.retry_at.is_some()
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_at.is_some()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Consecutive transient failures counted so far.
    pub fn failure_count(&self) -> u32 {
        self.tracker.count()
    }

    pub fn selected_device(&self) -> Option<&str> {
        self.selected_device.as_deref()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Cameras currently offered by the platform.
    pub async fn available_cameras(&self) -> Result<Vec<CameraDevice>, DeviceError> {
        timeout(self.config.acquire_timeout, self.platform.enumerate_devices())
            .await
            .map_err(|_| DeviceError::Timeout)?
    }

    /// Start a new session.
    ///
    /// Rejected with [`ScannerError::AlreadyActive`] when any session in the
    /// process holds the camera. Must be called inside a tokio runtime.
    pub fn open(&mut self) -> Result<SessionId, ScannerError> {
        self.retry_at = None;
        self.suspended = false;
        self.start_session()
    }

    /// Manual retry: clears the failure count and starts over.
    pub fn retry(&mut self) -> Result<SessionId, ScannerError> {
        if matches!(self.phase, Phase::Initializing(_) | Phase::Active(_)) {
            return Err(ScannerError::InvalidTransition {
                state: self.state(),
                action: "retry",
            });
        }
        self.tracker.reset();
        self.retry_at = None;
        self.suspended = false;
        info!("Manual scanner retry; failure count reset");
        self.start_session()
    }

    /// Force the scanner back to idle, releasing the camera.
    ///
    /// Idempotent. Device release is bounded by `stop_timeout`; local state
    /// is cleared even when the platform does not answer.
    pub async fn stop(&mut self) {
        self.retry_at = None;
        self.suspended = false;
        match self.release().await {
            Some(session_id) => info!(session_id = %session_id, "Scanner stopped"),
            None => debug!("Scanner already idle"),
        }
    }

    /// Host visibility changed.
    ///
    /// Hiding releases a running camera and remembers it; showing resumes it
    /// unless the failure count is exhausted. Resuming does not reset the
    /// failure count.
    pub async fn set_visible(&mut self, visible: bool) -> Result<Option<SessionId>, ScannerError> {
        if !visible {
            let was_running = self.retry_at.take().is_some();
            // A failed session holds no camera; keep its error visible.
            let released = match self.phase {
                Phase::Failed(_) => None,
                _ => self.release().await,
            };
            if let Some(session_id) = released {
                info!(session_id = %session_id, "Host hidden; camera released");
                self.suspended = true;
            } else if was_running {
                debug!("Host hidden; pending retry suspended");
                self.suspended = true;
            }
            return Ok(None);
        }

        if !self.suspended {
            return Ok(None);
        }
        self.suspended = false;
        if self.tracker.exhausted() {
            warn!(
                failures = self.tracker.count(),
                "Host visible again; not resuming after repeated failures"
            );
            return Ok(None);
        }
        info!("Host visible again; resuming scanner");
        self.start_session().map(Some)
    }

    /// Restart capture on another camera.
    ///
    /// Allowed while active or idle. While active this is stop followed by
    /// start; while idle the selection is kept for the next start.
    pub async fn switch_camera(
        &mut self,
        device_id: impl Into<String>,
    ) -> Result<Option<SessionId>, ScannerError> {
        match self.phase {
            Phase::Initializing(_) | Phase::Failed(_) => {
                return Err(ScannerError::InvalidTransition {
                    state: self.state(),
                    action: "switch camera",
                });
            }
            Phase::Idle | Phase::Active(_) => {}
        }

        let device_id = device_id.into();
        info!(device_id = %device_id, "Camera selected");
        self.selected_device = Some(device_id);

        if matches!(self.phase, Phase::Active(_)) {
            self.stop().await;
            return self.start_session().map(Some);
        }
        Ok(None)
    }

    /// Wait for the next scanner event.
    ///
    /// Returns `None` when there is nothing to wait for (idle with no retry
    /// pending, or in the error state). Decode misses are filtered here.
    pub async fn next_event(&mut self) -> Option<ScanEvent> {
        loop {
            let step = match &mut self.phase {
                Phase::Initializing(pending) => Step::Acquired((&mut pending.task).await),
                Phase::Active(session) => Step::Capture(session.next_capture_event().await),
                Phase::Idle => match self.retry_at {
                    Some(deadline) => {
                        sleep_until(deadline).await;
                        Step::RetryDue
                    }
                    None => return None,
                },
                Phase::Failed(_) => return None,
            };

            if let Some(event) = self.apply(step) {
                return Some(event);
            }
        }
    }

    /// Handle one step. Never awaits, so `next_event` stays cancel-safe.
    fn apply(&mut self, step: Step) -> Option<ScanEvent> {
        match step {
            Step::Acquired(Ok(Ok((device, stream)))) => self.activate(device, stream),
            Step::Acquired(Ok(Err(error))) => {
                let session_id = self.release_detached();
                self.fail(session_id, error)
            }
            Step::Acquired(Err(join_error)) => {
                let session_id = self.release_detached();
                self.fail(
                    session_id,
                    DeviceError::Failure(format!("camera start aborted: {join_error}")),
                )
            }
            Step::Capture(Some(CaptureEvent::Frame(frame))) => match self.decoder.decode(&frame) {
                Ok(payload) => Some(self.succeed(payload)),
                Err(miss) => {
                    trace!(sequence = frame.sequence, reason = %miss, "Frame skipped");
                    None
                }
            },
            Step::Capture(Some(CaptureEvent::Fault(error))) => {
                let session_id = self.release_detached();
                self.fail(session_id, error)
            }
            Step::Capture(None) => {
                let session_id = self.release_detached();
                self.fail(
                    session_id,
                    DeviceError::Failure("capture stream closed".into()),
                )
            }
            Step::RetryDue => {
                self.retry_at = None;
                let attempt = self.tracker.count();
                Some(match self.start_session() {
                    Ok(session_id) => {
                        info!(session_id = %session_id, attempt, "Retrying scanner");
                        ScanEvent::Retrying {
                            session_id,
                            attempt,
                        }
                    }
                    Err(e) => ScanEvent::Blocked(e),
                })
            }
        }
    }

    fn activate(&mut self, device: CameraDevice, stream: CaptureStream) -> Option<ScanEvent> {
        let Phase::Initializing(pending) = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return None;
        };
        let session = ScannerSession::new(pending.lease, device.clone(), stream);
        let session_id = session.id();
        info!(
            session_id = %session_id,
            device_id = %device.id,
            from = %ScannerState::Initializing,
            to = %ScannerState::Active,
            "Scanner active"
        );
        self.phase = Phase::Active(session);
        Some(ScanEvent::Started { session_id, device })
    }

    fn succeed(&mut self, payload: String) -> ScanEvent {
        let session_id = self.release_detached().unwrap_or_else(SessionId::next);
        self.tracker.reset();
        info!(
            session_id = %session_id,
            from = %ScannerState::Active,
            to = %ScannerState::Success,
            "Code decoded; camera released"
        );
        ScanEvent::Decoded {
            session_id,
            payload,
        }
    }

    fn fail(&mut self, session_id: Option<SessionId>, error: DeviceError) -> Option<ScanEvent> {
        if error.is_fatal() {
            error!(session_id = ?session_id, error = %error, "Fatal camera fault; auto-retry disabled");
            self.phase = Phase::Failed(error.clone());
            return Some(ScanEvent::Fatal(error));
        }

        let attempt = self.tracker.record_failure(Instant::now());
        if self.tracker.exhausted() {
            warn!(
                session_id = ?session_id,
                error = %error,
                attempts = attempt,
                "Camera retries exhausted"
            );
            self.phase = Phase::Failed(error.clone());
            return Some(ScanEvent::RetriesExhausted {
                attempts: attempt,
                error,
            });
        }

        let delay = self.tracker.next_delay();
        warn!(
            session_id = ?session_id,
            error = %error,
            attempt,
            retry_after_ms = delay.as_millis() as u64,
            "Transient camera fault; retry scheduled"
        );
        self.retry_at = Some(Instant::now() + delay);
        Some(ScanEvent::RetryScheduled {
            attempt,
            delay,
            error,
        })
    }

    fn start_session(&mut self) -> Result<SessionId, ScannerError> {
        if let Some(holder) = self.session_id() {
            warn!(holder = %holder, "Scanner already running; start rejected");
            return Err(ScannerError::AlreadyActive { holder });
        }

        let session_id = SessionId::next();
        let lease = self.registry.try_acquire(session_id)?;
        let task = tokio::spawn(acquire(
            Arc::clone(&self.platform),
            self.selected_device.clone(),
            self.config.facing,
            self.config.acquire_timeout,
        ));

        info!(
            session_id = %session_id,
            from = %self.state(),
            to = %ScannerState::Initializing,
            "Scanner initializing"
        );
        self.phase = Phase::Initializing(Pending { lease, task });
        Ok(session_id)
    }

    /// Tear down whatever is running and return to idle, waiting for the
    /// device to stop.
    async fn release(&mut self) -> Option<SessionId> {
        let limit = self.config.stop_timeout;
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Active(session) => {
                let session_id = session.id();
                let (handle, lease) = session.into_release();
                stop_device(Arc::clone(&self.platform), limit, session_id, handle).await;
                drop(lease);
                Some(session_id)
            }
            Phase::Initializing(Pending { lease, mut task }) => {
                let session_id = lease.session_id();
                match timeout(limit, &mut task).await {
                    Ok(Ok(Ok((_, stream)))) => {
                        stop_device(Arc::clone(&self.platform), limit, session_id, stream.handle)
                            .await
                    }
                    Ok(_) => {}
                    Err(_) => {
                        warn!(session_id = %session_id, "Camera start still pending; aborting");
                        task.abort();
                    }
                }
                drop(lease);
                Some(session_id)
            }
            Phase::Idle | Phase::Failed(_) => None,
        }
    }

    /// Return to idle immediately; the device is stopped in the background.
    /// Only used once the acquisition task has finished.
    fn release_detached(&mut self) -> Option<SessionId> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Active(session) => {
                let session_id = session.id();
                let (handle, lease) = session.into_release();
                spawn_stop(
                    Arc::clone(&self.platform),
                    self.config.stop_timeout,
                    session_id,
                    handle,
                );
                drop(lease);
                Some(session_id)
            }
            Phase::Initializing(Pending { lease, task }) => {
                task.abort();
                Some(lease.session_id())
            }
            Phase::Idle | Phase::Failed(_) => None,
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        // Leases are released with the phase; a running device still needs stopping.
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Active(session) => {
                let session_id = session.id();
                let (handle, _lease) = session.into_release();
                spawn_stop(
                    Arc::clone(&self.platform),
                    self.config.stop_timeout,
                    session_id,
                    handle,
                );
            }
            Phase::Initializing(pending) => pending.task.abort(),
            Phase::Idle | Phase::Failed(_) => {}
        }
    }
}

#[instrument(level = "debug", skip_all, fields(session_id = %session_id))]
async fn stop_device(
    platform: Arc<dyn CameraPlatform>,
    limit: Duration,
    session_id: SessionId,
    handle: CaptureHandle,
) {
    match timeout(limit, platform.stop_capture(handle)).await {
        Ok(Ok(())) => debug!("Capture stopped"),
        Ok(Err(e)) => warn!(error = %e, "Camera stop failed; state cleared anyway"),
        Err(_) => warn!("Camera stop timed out; state cleared anyway"),
    }
}

fn spawn_stop(
    platform: Arc<dyn CameraPlatform>,
    limit: Duration,
    session_id: SessionId,
    handle: CaptureHandle,
) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(stop_device(platform, limit, session_id, handle));
        }
        Err(_) => warn!(session_id = %session_id, "No runtime to stop camera on"),
    }
}

/// Enumerate, choose and start capture, all bounded by `limit`.
async fn acquire(
    platform: Arc<dyn CameraPlatform>,
    selected: Option<String>,
    facing: CameraFacing,
    limit: Duration,
) -> Acquisition {
    let started = Instant::now();
    let result = timeout(limit, async {
        let devices = platform.enumerate_devices().await?;
        let device = choose_device(&devices, selected.as_deref(), facing)
            .cloned()
            .ok_or(DeviceError::NotFound)?;
        let stream = platform.start_capture(&device).await?;
        Ok::<_, DeviceError>((device, stream))
    })
    .await
    .unwrap_or(Err(DeviceError::Timeout));

    debug!(
        latency_ms = started.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "Camera acquisition finished"
    );
    result
}
