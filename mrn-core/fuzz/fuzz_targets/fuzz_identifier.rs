#![no_main]

//! Fuzz target for medical identifier parsing
//!
//! Display forms must never panic, and anything `validate_format` accepts must
//! parse and display as itself.
//!
//! Run with: cargo +nightly fuzz run fuzz_identifier

use libfuzzer_sys::fuzz_target;
use mrn_core::{to_display_form, validate_format, MedicalIdentifier};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    let display = to_display_form(Some(raw));
    assert!(!display.as_str().is_empty());

    if validate_format(raw) {
        let id = MedicalIdentifier::parse(raw).expect("validated token must parse");
        assert_eq!(display.as_str(), id.as_str());
    }

    let _ = MedicalIdentifier::from_qr_payload(raw);
});
