//! Database module for the MRN server
//!
//! The `patients` table is owned by the records service; this crate only reads it.

pub mod patient;

pub use patient::{connect, PostgresPatientStore};
