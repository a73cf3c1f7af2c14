//! MRN Core - patient identity resolution and live QR scanning
//!
//! This crate resolves exactly one patient record (or an explicit not-found)
//! from whatever identifiers a caller has, and runs the camera-based QR scanner
//! that feeds scanned medical identifiers back into resolution.
//!
//! # Features
//!
//! - Strict 5-character medical identifier validation and display forms
//! - Deterministic normalization of semi-structured name, contact and address data
//! - Prioritized lookup strategies with surfaced duplicate-email warnings
//! - Single-instance scanner sessions with bounded retry of transient faults
//! - Debounced search and scanner input behind one patient picker
//!
//! The identifier and normalizer modules are pure and build without the
//! `runtime` feature (used by the Wasm bindings).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mrn_core::{IdentityResolver, InMemoryPatientStore, LookupQuery, Resolution};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryPatientStore::from_json(r#"[
//!     {"id": "6f1c9f0e-3f0a-4c7b-9a61-0d2b8c1e5a77", "medicalId": "AB12C",
//!      "name": "John Doe", "updatedAt": "2025-01-01T00:00:00Z"}
//! ]"#)?);
//! let resolver = IdentityResolver::new(store);
//!
//! if let Resolution::Found(patient) = resolver
//!     .resolve(&LookupQuery::by_medical_identifier("ab12c"))
//!     .await?
//! {
//!     println!("{} via {:?}", patient.record.full_name, patient.strategy);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod identifier;
pub mod normalize;
pub mod store;

#[cfg(feature = "runtime")]
pub mod config;
#[cfg(feature = "runtime")]
pub mod resolver;
#[cfg(feature = "runtime")]
pub mod scanner;
#[cfg(feature = "runtime")]
pub mod search;

// Re-export main types for convenience
pub use error::{Classify, ErrorKind, IdentifierError};
pub use identifier::{
    to_display_form, validate_format, DisplayIdentifier, MedicalIdentifier, INVALID_FORMAT,
    MEDICAL_ID_LEN, NOT_ASSIGNED,
};
pub use normalize::{
    normalize_address, normalize_contact, normalize_name, normalize_patient, AddressInput,
    ContactInfo, ContactInput, NameInput, NameParts, PatientRecord,
};
pub use store::{StoreError, StoredPatient};

// Runtime exports (not available in Wasm)
#[cfg(feature = "runtime")]
pub use config::{ResolverConfig, ScannerConfig, SearchConfig};
#[cfg(feature = "runtime")]
pub use resolver::{
    DuplicatePolicy, DuplicateWarning, IdentityResolver, LookupQuery, LookupStrategy,
    ResolveError, Resolution, ResolvedPatient,
};
#[cfg(feature = "runtime")]
pub use scanner::{
    CameraFacing, CameraPlatform, CameraRegistry, DeviceError, QrDecoder, ScanEvent, Scanner,
    ScannerError, ScannerState, ScriptedCamera,
};
#[cfg(feature = "runtime")]
pub use search::{PatientPicker, PickerEvent};
#[cfg(feature = "runtime")]
pub use store::{InMemoryPatientStore, PatientStore, RetryingPatientStore};
