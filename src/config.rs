use std::env;
use std::time::Duration;

use crate::query::FilterMode;

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_duration_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default_millis))
}

fn env_filter_mode(key: &str) -> FilterMode {
    match env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|err| {
            log::warn!("{}: {}; using conjunctive filters", key, err);
            FilterMode::default()
        }),
        Err(_) => FilterMode::default(),
    }
}

/// Service settings that sit outside Rocket's own figment.
///
/// Address, port and the MongoDB URI come from `Rocket.toml` / `ROCKET_*`;
/// everything here is read from `KILLBOARD_*` variables.
#[derive(Debug, Clone)]
pub struct KillboardConfig {
    /// Database holding the killmail collection.
    pub database: String,
    pub collection: String,
    /// Budget for a single store operation, cursor drain included.
    pub query_timeout: Duration,
    /// How entity filters combine when more than one is supplied.
    pub filter_mode: FilterMode,
}

impl KillboardConfig {
    pub fn from_env() -> Self {
        Self {
            database: env_string("KILLBOARD_DATABASE", "truth"),
            collection: env_string("KILLBOARD_COLLECTION", "killmails"),
            query_timeout: env_duration_millis("KILLBOARD_QUERY_TIMEOUT_MS", 10_000),
            filter_mode: env_filter_mode("KILLBOARD_FILTER_MODE"),
        }
    }
}

impl Default for KillboardConfig {
    fn default() -> Self {
        Self {
            database: "truth".to_string(),
            collection: "killmails".to_string(),
            query_timeout: Duration::from_secs(10),
            filter_mode: FilterMode::default(),
        }
    }
}
