//! Deterministic camera for demos and tests.
//!
//! Each `start_capture` consumes the next queued session script and feeds its
//! steps into the capture stream. The stream stays open until
//! `stop_capture`, like a real camera pointed at nothing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    CameraDevice, CameraPlatform, CaptureEvent, CaptureHandle, CaptureStream, DecodeMiss,
    DeviceError, Frame, QrDecoder,
};

/// One scripted capture event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// A frame containing this QR payload.
    Payload(String),
    /// A frame with no readable code.
    Miss,
    /// A device fault.
    Fault(DeviceError),
}

impl ScriptStep {
    pub fn payload(payload: impl Into<String>) -> Self {
        Self::Payload(payload.into())
    }
}

impl From<&str> for ScriptStep {
    fn from(payload: &str) -> Self {
        Self::payload(payload)
    }
}

enum StartOverride {
    Fail(DeviceError),
    Hang,
}

#[derive(Default)]
struct Script {
    sessions: VecDeque<Vec<ScriptStep>>,
    start_overrides: VecDeque<StartOverride>,
    open: HashMap<CaptureHandle, mpsc::Sender<CaptureEvent>>,
    last_device: Option<CameraDevice>,
}

/// Scripted [`CameraPlatform`] and [`QrDecoder`].
///
/// Frames carry the payload bytes; an empty frame is a decode miss.
pub struct ScriptedCamera {
    devices: Vec<CameraDevice>,
    script: Mutex<Script>,
    next_handle: AtomicU64,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ScriptedCamera {
    pub fn new(devices: Vec<CameraDevice>) -> Self {
        Self {
            devices,
            script: Mutex::new(Script::default()),
            next_handle: AtomicU64::new(1),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// A back camera (`back`) and a front camera (`front`).
    pub fn with_default_devices() -> Self {
        Self::new(vec![
            CameraDevice::new("back", "Back Camera"),
            CameraDevice::new("front", "Front Camera"),
        ])
    }

    /// Queue the events for the next capture.
    pub fn push_session<I, S>(&self, steps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<ScriptStep>,
    {
        self.script()
            .sessions
            .push_back(steps.into_iter().map(Into::into).collect());
    }

    /// Make the next `start_capture` fail.
    pub fn fail_next_start(&self, error: DeviceError) {
        self.script()
            .start_overrides
            .push_back(StartOverride::Fail(error));
    }

    /// Make the next `start_capture` never complete.
    pub fn hang_next_start(&self) {
        self.script().start_overrides.push_back(StartOverride::Hang);
    }

    /// Number of `start_capture` calls, failed ones included.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop_capture` calls for known captures.
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Captures started and not yet stopped.
    pub fn open_captures(&self) -> usize {
        self.script().open.len()
    }

    pub fn last_started_device(&self) -> Option<CameraDevice> {
        self.script().last_device.clone()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ScriptedCamera {
    fn default() -> Self {
        Self::with_default_devices()
    }
}

#[async_trait]
impl CameraPlatform for ScriptedCamera {
    async fn enumerate_devices(&self) -> Result<Vec<CameraDevice>, DeviceError> {
        Ok(self.devices.clone())
    }

    async fn start_capture(&self, device: &CameraDevice) -> Result<CaptureStream, DeviceError> {
        self.starts.fetch_add(1, Ordering::SeqCst);

        let start_override = self.script().start_overrides.pop_front();
        match start_override {
            Some(StartOverride::Fail(error)) => return Err(error),
            Some(StartOverride::Hang) => std::future::pending::<()>().await,
            None => {}
        }

        let handle = CaptureHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let mut script = self.script();
        let steps = script.sessions.pop_front().unwrap_or_default();
        let (tx, rx) = mpsc::channel(steps.len().max(1));
        for (sequence, step) in (0u64..).zip(steps) {
            let event = match step {
                ScriptStep::Payload(payload) => CaptureEvent::Frame(Frame {
                    sequence,
                    data: payload.into_bytes(),
                }),
                ScriptStep::Miss => CaptureEvent::Frame(Frame {
                    sequence,
                    data: Vec::new(),
                }),
                ScriptStep::Fault(error) => CaptureEvent::Fault(error),
            };
            // Capacity covers the whole script.
            let _ = tx.try_send(event);
        }
        script.open.insert(handle, tx);
        script.last_device = Some(device.clone());
        debug!(device_id = %device.id, handle = handle.0, "Scripted capture started");

        Ok(CaptureStream { handle, events: rx })
    }

    async fn stop_capture(&self, handle: CaptureHandle) -> Result<(), DeviceError> {
        if self.script().open.remove(&handle).is_some() {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl QrDecoder for ScriptedCamera {
    fn decode(&self, frame: &Frame) -> Result<String, DecodeMiss> {
        if frame.data.is_empty() {
            return Err(DecodeMiss);
        }
        String::from_utf8(frame.data.clone()).map_err(|_| DecodeMiss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_is_replayed_in_order() {
        let camera = ScriptedCamera::with_default_devices();
        camera.push_session([ScriptStep::Miss, ScriptStep::payload("AB12C")]);

        let device = camera.enumerate_devices().await.unwrap().remove(0);
        let mut stream = camera.start_capture(&device).await.unwrap();

        let CaptureEvent::Frame(miss) = stream.events.recv().await.unwrap() else {
            panic!("expected frame");
        };
        assert_eq!(camera.decode(&miss), Err(DecodeMiss));

        let CaptureEvent::Frame(hit) = stream.events.recv().await.unwrap() else {
            panic!("expected frame");
        };
        assert_eq!(camera.decode(&hit).unwrap(), "AB12C");

        assert_eq!(camera.open_captures(), 1);
        camera.stop_capture(stream.handle).await.unwrap();
        camera.stop_capture(stream.handle).await.unwrap();
        assert_eq!(camera.open_captures(), 0);
        assert_eq!(camera.stops(), 1);
        assert!(stream.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_start_is_counted() {
        let camera = ScriptedCamera::with_default_devices();
        camera.fail_next_start(DeviceError::PermissionDenied);
        let device = CameraDevice::new("back", "Back Camera");

        assert_eq!(
            camera.start_capture(&device).await.unwrap_err(),
            DeviceError::PermissionDenied
        );
        assert!(camera.start_capture(&device).await.is_ok());
        assert_eq!(camera.starts(), 2);
    }
}
