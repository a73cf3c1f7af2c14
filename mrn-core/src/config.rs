//! Runtime configuration for the resolver, scanner and search components.
//!
//! Every struct has sensible defaults and a `from_env()` loader reading
//! `MRN_*` variables; unparseable values fall back to the default.

use std::str::FromStr;
use std::time::Duration;

use crate::resolver::DuplicatePolicy;
use crate::scanner::{CameraFacing, RetryPolicy};

/// Default delay between the last keystroke and the search call.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Default number of search results kept.
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Default time allowed for camera acquisition.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for releasing the camera.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Identity resolver settings.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// What to do when an email lookup matches several patients.
    pub duplicate_policy: DuplicatePolicy,
}

impl ResolverConfig {
    /// Reads `MRN_DUPLICATE_POLICY` (`best_effort` | `reject`).
    pub fn from_env() -> Self {
        let raw = std::env::var("MRN_DUPLICATE_POLICY").ok();
        Self {
            duplicate_policy: duplicate_policy_from(raw.as_deref()),
        }
    }
}

/// Unset or unparseable values fall back to [`DuplicatePolicy::default`].
fn duplicate_policy_from(raw: Option<&str>) -> DuplicatePolicy {
    let Some(raw) = raw else {
        return DuplicatePolicy::default();
    };
    raw.trim().parse().unwrap_or_else(|e| {
        tracing::warn!(value = %raw, error = %e, "Ignoring MRN_DUPLICATE_POLICY");
        DuplicatePolicy::default()
    })
}

/// Scanner session settings.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Preferred camera when no device is explicitly selected.
    pub facing: CameraFacing,
    /// Upper bound on device enumeration + capture start.
    pub acquire_timeout: Duration,
    /// Upper bound on releasing the device; local state is cleared regardless.
    pub stop_timeout: Duration,
    /// Automatic retry policy for transient faults.
    pub retry: RetryPolicy,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Back,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl ScannerConfig {
    /// Reads `MRN_CAMERA_FACING`, `MRN_ACQUIRE_TIMEOUT_MS`, `MRN_STOP_TIMEOUT_MS`,
    /// `MRN_RETRY_MAX_ATTEMPTS`, `MRN_RETRY_BASE_DELAY_MS`,
    /// `MRN_RETRY_MULTIPLIER`, `MRN_RETRY_MAX_DELAY_MS`, `MRN_RETRY_WINDOW_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retry_defaults = defaults.retry.clone();

        let retry = RetryPolicy {
            max_attempts: env_parse("MRN_RETRY_MAX_ATTEMPTS").unwrap_or(retry_defaults.max_attempts),
            base_delay: env_millis("MRN_RETRY_BASE_DELAY_MS").unwrap_or(retry_defaults.base_delay),
            multiplier: env_parse("MRN_RETRY_MULTIPLIER")
                .filter(|m: &f64| m.is_finite() && *m >= 1.0)
                .unwrap_or(retry_defaults.multiplier),
            max_delay: env_millis("MRN_RETRY_MAX_DELAY_MS").unwrap_or(retry_defaults.max_delay),
            cooldown_window: env_millis("MRN_RETRY_WINDOW_MS")
                .unwrap_or(retry_defaults.cooldown_window),
        };

        Self {
            facing: env_parse("MRN_CAMERA_FACING").unwrap_or(defaults.facing),
            acquire_timeout: env_millis("MRN_ACQUIRE_TIMEOUT_MS").unwrap_or(defaults.acquire_timeout),
            stop_timeout: env_millis("MRN_STOP_TIMEOUT_MS").unwrap_or(defaults.stop_timeout),
            retry,
        }
    }
}

/// Patient picker settings.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before searching.
    pub debounce: Duration,
    /// Maximum number of results displayed.
    pub result_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

impl SearchConfig {
    /// Reads `MRN_SEARCH_DEBOUNCE_MS` and `MRN_SEARCH_LIMIT`.
    pub fn from_env() -> Self {
        Self {
            debounce: env_millis("MRN_SEARCH_DEBOUNCE_MS").unwrap_or(DEFAULT_DEBOUNCE),
            result_limit: env_parse("MRN_SEARCH_LIMIT")
                .filter(|limit: &usize| *limit > 0)
                .unwrap_or(DEFAULT_RESULT_LIMIT),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
