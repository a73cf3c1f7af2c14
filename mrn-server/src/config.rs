//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::time::Duration;

use mrn_core::config::{ResolverConfig, SearchConfig};
use mrn_core::store::StoreRetryConfig;
use mrn_core::DuplicatePolicy;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in KB (default: 64)
    pub body_limit_kb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL URL; the in-memory store is used when unset
    pub database_url: Option<String>,
    /// JSON fixture loaded into the in-memory store
    pub fixture_path: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Database connection pool minimum connections (default: 2)
    pub database_min_connections: u32,
    /// Seconds to wait for a pooled connection (default: 5)
    pub database_acquire_timeout_secs: u64,
    /// Backoff for transient store outages
    pub store_retry: StoreRetryConfig,
    /// How the resolver treats several patients sharing one email
    pub duplicate_policy: DuplicatePolicy,
    /// Default and maximum page size for search (default: 20, max 100)
    pub search_limit: usize,
    pub search_limit_max: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_kb: 64,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            fixture_path: None,
            database_max_connections: 20,
            database_min_connections: 2,
            database_acquire_timeout_secs: 5,
            store_retry: StoreRetryConfig::default(),
            duplicate_policy: DuplicatePolicy::default(),
            search_limit: 20,
            search_limit_max: 100,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let store_retry = StoreRetryConfig {
            initial_interval: env_millis("STORE_RETRY_INITIAL_MS")
                .unwrap_or(defaults.store_retry.initial_interval),
            max_interval: env_millis("STORE_RETRY_MAX_INTERVAL_MS")
                .unwrap_or(defaults.store_retry.max_interval),
            max_elapsed: env_millis("STORE_RETRY_MAX_ELAPSED_MS")
                .unwrap_or(defaults.store_retry.max_elapsed),
        };

        let resolver = ResolverConfig::from_env();
        let search = SearchConfig::from_env();

        Self {
            port,
            host,
            allowed_origins,
            body_limit_kb: env_parse("BODY_LIMIT_KB").unwrap_or(defaults.body_limit_kb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC")
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            database_url,
            fixture_path: std::env::var("MRN_FIXTURE").ok(),
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            database_min_connections: env_parse("DATABASE_MIN_CONNECTIONS")
                .unwrap_or(defaults.database_min_connections),
            database_acquire_timeout_secs: env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS")
                .unwrap_or(defaults.database_acquire_timeout_secs),
            store_retry,
            duplicate_policy: resolver.duplicate_policy,
            search_limit: search.result_limit.min(defaults.search_limit_max),
            search_limit_max: defaults.search_limit_max,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
