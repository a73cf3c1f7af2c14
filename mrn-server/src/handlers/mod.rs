//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod identifier;
pub mod patient;
pub mod resolve;
pub mod search;

pub use crate::state::AppState;
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use identifier::{display_identifier_handler, IdentifierDisplayResponse};
pub use patient::{DuplicateWarningResponse, PatientResponse};
pub use resolve::{resolve_handler, ResolveRequest, ResolveResponse};
pub use search::{search_handler, SearchParams, SearchResponse};
