use serde::{Deserialize, Serialize};

use crate::utils::get_env_with_prefix;

/// Rate limiting configuration for outbound email endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Maximum number of requests allowed per window.
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Shared counter store address. `None` means local-only counters.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Trust X-Forwarded-For / X-Real-IP for client IP detection.
    ///
    /// **SECURITY WARNING**: Only enable this behind a trusted reverse
    /// proxy that overwrites (not appends to) these headers; otherwise
    /// clients can spoof their IP and bypass per-IP limiting.
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_ms: default_window_ms(),
            redis_url: None,
            trust_proxy: false,
        }
    }
}

impl RateLimitConfig {
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::new()
    }

    /// Load rate limit configuration from environment variables:
    /// `EMAIL_RATE_LIMIT`, `EMAIL_RATE_WINDOW_MS`, `REDIS_URL`,
    /// `TRUST_PROXY` (each also accepted with the `FAKTURO_` prefix).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(limit) = get_env_with_prefix("EMAIL_RATE_LIMIT") {
            if let Ok(val) = limit.parse() {
                config.limit = val;
            }
        }

        if let Some(window) = get_env_with_prefix("EMAIL_RATE_WINDOW_MS") {
            if let Ok(val) = window.parse() {
                config.window_ms = val;
            }
        }

        config.redis_url = get_env_with_prefix("REDIS_URL");

        if let Some(trust_proxy) = get_env_with_prefix("TRUST_PROXY") {
            config.trust_proxy = trust_proxy.parse().unwrap_or(false);
        }

        config
    }

    pub fn window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.window_ms)
    }
}

/// Builder for RateLimitConfig
#[must_use = "builder does nothing until you call build()"]
pub struct RateLimitConfigBuilder {
    config: RateLimitConfig,
}

impl RateLimitConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RateLimitConfig::default(),
        }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.config.limit = limit;
        self
    }

    pub fn window_ms(mut self, window_ms: u64) -> Self {
        self.config.window_ms = window_ms;
        self
    }

    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = Some(url.into());
        self
    }

    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.config.trust_proxy = trust;
        self
    }

    pub fn build(self) -> RateLimitConfig {
        self.config
    }
}

impl Default for RateLimitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_limit() -> u64 {
    10
}

fn default_window_ms() -> u64 {
    60_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.limit, 10);
        assert_eq!(config.window_ms, 60_000);
        assert!(config.redis_url.is_none());
        // Security: trust_proxy defaults to false
        assert!(!config.trust_proxy);
    }

    #[test]
    fn test_builder() {
        let config = RateLimitConfig::builder()
            .limit(3)
            .window_ms(1_000)
            .redis_url("redis://127.0.0.1/")
            .build();

        assert_eq!(config.limit, 3);
        assert_eq!(config.window_ms, 1_000);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
        assert!(!config.trust_proxy);
    }

    #[test]
    fn test_window_duration() {
        let config = RateLimitConfig::builder().window_ms(1_500).build();
        assert_eq!(config.window(), std::time::Duration::from_millis(1_500));
    }
}
