//! Subcommand implementations.

pub mod display;
pub mod resolve;
pub mod scan;
pub mod search;
pub mod validate;
