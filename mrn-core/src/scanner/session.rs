use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{CameraDevice, CameraLease, CaptureEvent, CaptureHandle, CaptureStream, SessionId};

/// One running camera capture.
///
/// Created by [`Scanner`](super::Scanner) once capture has started and
/// discarded on every exit path; a stopped session is never restarted.
#[derive(Debug)]
pub struct ScannerSession {
    lease: CameraLease,
    device: CameraDevice,
    handle: CaptureHandle,
    events: mpsc::Receiver<CaptureEvent>,
    started_at: Instant,
}

impl ScannerSession {
    pub(crate) fn new(lease: CameraLease, device: CameraDevice, stream: CaptureStream) -> Self {
        Self {
            lease,
            device,
            handle: stream.handle,
            events: stream.events,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.lease.session_id()
    }

    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    pub fn handle(&self) -> CaptureHandle {
        self.handle
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Next capture event; `None` once the platform closed the feed.
    /// Cancel-safe.
    pub(crate) async fn next_capture_event(&mut self) -> Option<CaptureEvent> {
        self.events.recv().await
    }

    /// Split into what must be released.
    pub(crate) fn into_release(self) -> (CaptureHandle, CameraLease) {
        (self.handle, self.lease)
    }
}
