//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use mrn_core::{IdentityResolver, PatientStore, ResolverConfig};

use crate::config::Config;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Resolver over the configured patient store
    pub resolver: IdentityResolver,
    /// The store itself, for readiness checks
    pub store: Arc<dyn PatientStore>,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn PatientStore>, config: Config) -> Self {
        let resolver = IdentityResolver::with_config(
            store.clone(),
            ResolverConfig {
                duplicate_policy: config.duplicate_policy,
            },
        );
        Self {
            resolver,
            store,
            config: Arc::new(config),
        }
    }
}
