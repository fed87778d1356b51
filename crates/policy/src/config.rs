//! Aggregation cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use gatehouse_core::{PolicyError, PolicyResult};

pub const CACHE_ENABLED_ENV: &str = "GATEHOUSE_POLICY_CACHE";
pub const CACHE_TTL_ENV: &str = "GATEHOUSE_POLICY_CACHE_TTL_MS";

/// Cache settings for aggregated rule sets. Disabled by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    /// `None`: entries live until the next registration.
    #[serde(default)]
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Read `GATEHOUSE_POLICY_CACHE` and `GATEHOUSE_POLICY_CACHE_TTL_MS`.
    pub fn from_env() -> PolicyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CacheConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> PolicyResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = match lookup(CACHE_ENABLED_ENV) {
            None => false,
            Some(raw) => parse_flag(&raw).ok_or_else(|| {
                PolicyError::invalid_config(format!("{CACHE_ENABLED_ENV}: '{raw}' is not a boolean"))
            })?,
        };

        let ttl = match lookup(CACHE_TTL_ENV) {
            None => None,
            Some(raw) => {
                let ms: u64 = raw.trim().parse().map_err(|e| {
                    PolicyError::invalid_config(format!("{CACHE_TTL_ENV}: '{raw}': {e}"))
                })?;
                Some(Duration::from_millis(ms))
            }
        };

        Ok(Self { enabled, ttl })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}
