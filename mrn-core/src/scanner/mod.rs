//! Live QR scanner sessions.
//!
//! A [`Scanner`] owns at most one [`ScannerSession`] at a time and drives it
//! through `Idle → Initializing → Active → (Success | Error) → Idle`. The
//! camera itself is a process-wide exclusive resource guarded by
//! [`CameraRegistry`]: a second start while any session is initializing or
//! active is rejected, never queued.
//!
//! Hardware access goes through two collaborators:
//!
//! - [`CameraPlatform`]: enumerate devices, start and stop capture
//! - [`QrDecoder`]: turn a frame into a payload, or report a miss
//!
//! Device faults are split into **fatal** (permission denied, no device,
//! enumeration failure), which stop the scanner until [`Scanner::retry`], and
//! **transient** (timeout, generic failure), which are retried automatically
//! under a [`RetryPolicy`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mrn_core::scanner::{Scanner, ScanEvent, ScriptedCamera};
//! use mrn_core::config::ScannerConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let camera = Arc::new(ScriptedCamera::with_default_devices());
//! camera.push_session(["AB12C"]);
//!
//! let mut scanner = Scanner::new(camera.clone(), camera, ScannerConfig::default());
//! scanner.open()?;
//! while let Some(event) = scanner.next_event().await {
//!     if let ScanEvent::Decoded { payload, .. } = event {
//!         println!("scanned {payload}");
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod manager;
mod registry;
mod retry;
mod scripted;
mod session;

pub use manager::{ScanEvent, Scanner};
pub use registry::{CameraLease, CameraRegistry};
pub use retry::{FailureTracker, RetryPolicy};
pub use scripted::{ScriptStep, ScriptedCamera};
pub use session::ScannerSession;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::{Classify, ErrorKind};

/// Identifies one scanner session. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scan-{}", self.0)
    }
}

/// Observable scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerState {
    Idle,
    Initializing,
    Active,
    Success,
    Error,
}

impl fmt::Display for ScannerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Success => "success",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Which physical camera to prefer when none is explicitly selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    Front,
    #[default]
    Back,
}

impl CameraFacing {
    /// Label fragments that identify a camera facing this way.
    pub fn label_hints(self) -> &'static [&'static str] {
        match self {
            Self::Front => &["front", "user", "facetime"],
            Self::Back => &["back", "rear", "environment"],
        }
    }
}

impl FromStr for CameraFacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" | "user" => Ok(Self::Front),
            "back" | "rear" | "environment" => Ok(Self::Back),
            other => Err(format!("unknown camera facing: {other}")),
        }
    }
}

/// A camera the platform can capture from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
}

impl CameraDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Whether the label suggests the camera faces `facing`.
    pub fn faces(&self, facing: CameraFacing) -> bool {
        let label = self.label.to_lowercase();
        facing.label_hints().iter().any(|hint| label.contains(hint))
    }
}

/// Platform token for a running capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureHandle(pub u64);

/// One captured frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u64,
    pub data: Vec<u8>,
}

/// What a running capture reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Frame(Frame),
    Fault(DeviceError),
}

/// A started capture: its handle plus the event feed.
#[derive(Debug)]
pub struct CaptureStream {
    pub handle: CaptureHandle,
    pub events: mpsc::Receiver<CaptureEvent>,
}

/// Camera faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera device found")]
    NotFound,

    #[error("Camera enumeration failed: {0}")]
    EnumerationFailed(String),

    #[error("Camera did not respond in time")]
    Timeout,

    #[error("Camera failure: {0}")]
    Failure(String),
}

impl DeviceError {
    /// Fatal faults disable automatic retry.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::NotFound | Self::EnumerationFailed(_)
        )
    }
}

impl Classify for DeviceError {
    fn kind(&self) -> ErrorKind {
        if self.is_fatal() {
            ErrorKind::Fatal
        } else {
            ErrorKind::Transient
        }
    }
}

/// Scanner control errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScannerError {
    #[error("Another scanner session is already active ({holder})")]
    AlreadyActive { holder: SessionId },

    #[error("Cannot {action} while scanner is {state}")]
    InvalidTransition {
        state: ScannerState,
        action: &'static str,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl Classify for ScannerError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyActive { .. } => ErrorKind::Duplicate,
            Self::InvalidTransition { .. } => ErrorKind::Validation,
            Self::Device(e) => e.kind(),
        }
    }
}

/// The frame did not contain a readable code. Not a session error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No code in frame")]
pub struct DecodeMiss;

/// Camera hardware access.
#[async_trait]
pub trait CameraPlatform: Send + Sync {
    /// List available cameras.
    async fn enumerate_devices(&self) -> Result<Vec<CameraDevice>, DeviceError>;

    /// Start capturing from `device`.
    async fn start_capture(&self, device: &CameraDevice) -> Result<CaptureStream, DeviceError>;

    /// Stop a capture and release the device and its render surface.
    async fn stop_capture(&self, handle: CaptureHandle) -> Result<(), DeviceError>;
}

/// Frame decoding. CPU-bound, so synchronous.
pub trait QrDecoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Result<String, DecodeMiss>;
}

/// Pick a camera: the explicitly selected id if present, else the first
/// device whose label matches `facing`, else the first device.
pub fn choose_device<'a>(
    devices: &'a [CameraDevice],
    selected: Option<&str>,
    facing: CameraFacing,
) -> Option<&'a CameraDevice> {
    if let Some(id) = selected {
        if let Some(device) = devices.iter().find(|d| d.id == id) {
            return Some(device);
        }
        tracing::warn!(device_id = id, "Selected camera not present; using preference");
    }
    devices
        .iter()
        .find(|d| d.faces(facing))
        .or_else(|| devices.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<CameraDevice> {
        vec![
            CameraDevice::new("cam-0", "FaceTime HD Camera"),
            CameraDevice::new("cam-1", "Back Ultra Wide"),
            CameraDevice::new("cam-2", "USB Webcam"),
        ]
    }

    #[test]
    fn test_choose_device_by_facing() {
        let devices = devices();
        assert_eq!(
            choose_device(&devices, None, CameraFacing::Back).unwrap().id,
            "cam-1"
        );
        assert_eq!(
            choose_device(&devices, None, CameraFacing::Front).unwrap().id,
            "cam-0"
        );
    }

    #[test]
    fn test_choose_device_prefers_explicit_selection() {
        let devices = devices();
        assert_eq!(
            choose_device(&devices, Some("cam-2"), CameraFacing::Back)
                .unwrap()
                .id,
            "cam-2"
        );
        // Unknown selection falls back to the preference.
        assert_eq!(
            choose_device(&devices, Some("gone"), CameraFacing::Back)
                .unwrap()
                .id,
            "cam-1"
        );
    }

    #[test]
    fn test_choose_device_falls_back_to_first() {
        let devices = vec![CameraDevice::new("only", "Integrated Camera")];
        assert_eq!(
            choose_device(&devices, None, CameraFacing::Back).unwrap().id,
            "only"
        );
        assert!(choose_device(&[], None, CameraFacing::Back).is_none());
    }

    #[test]
    fn test_device_error_classification() {
        assert!(DeviceError::PermissionDenied.is_fatal());
        assert!(DeviceError::EnumerationFailed("x".into()).is_fatal());
        assert!(!DeviceError::Timeout.is_fatal());
        assert!(DeviceError::Failure("glitch".into()).is_retryable());
        assert_eq!(DeviceError::NotFound.kind(), ErrorKind::Fatal);
    }

    #[test]
    fn test_facing_from_str() {
        assert_eq!("environment".parse(), Ok(CameraFacing::Back));
        assert_eq!("USER".parse(), Ok(CameraFacing::Front));
        assert!("sideways".parse::<CameraFacing>().is_err());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("scan-"));
    }
}
