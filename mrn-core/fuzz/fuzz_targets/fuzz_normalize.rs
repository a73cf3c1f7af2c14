#![no_main]

//! Fuzz target for patient data normalization
//!
//! Arbitrary JSON is classified and normalized as name, contact and address
//! input. None of it may panic, and the full name is never empty.
//!
//! Run with: cargo +nightly fuzz run fuzz_normalize

use libfuzzer_sys::fuzz_target;
use mrn_core::{
    normalize_address, normalize_contact, normalize_name, AddressInput, ContactInput, NameInput,
};

fuzz_target!(|data: &[u8]| {
    let value = match serde_json::from_slice::<serde_json::Value>(data) {
        Ok(value) => value,
        Err(_) => serde_json::Value::String(String::from_utf8_lossy(data).into_owned()),
    };

    let name = normalize_name(&NameInput::classify(&value));
    assert!(!name.full_name.is_empty());

    let _ = normalize_contact(&ContactInput::classify(&value));
    let _ = normalize_address(&AddressInput::classify(&value));
});
