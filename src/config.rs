use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::ratelimit::RateLimitConfig;
use crate::utils::get_env_with_prefix;

/// Main configuration for the fakturo server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub rate_limit: RateLimitConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes. Sized for a base64-encoded PDF
    /// attachment while bounding memory per request (default: 4MB).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL; absent means the server cannot start in
    /// production mode (tests inject an in-memory store instead).
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_jwt_secret() -> String {
    "insecure-dev-secret".to_string()
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Config {
    /// Whether the auth secret is still the built-in development default.
    pub fn uses_default_secret(&self) -> bool {
        self.auth.jwt_secret == default_jwt_secret()
    }
}

/// Builder for Config with environment variable support.
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.config.server.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = Some(url.into());
        self
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.auth.jwt_secret = secret.into();
        self
    }

    /// Load configuration from environment variables (each also accepted
    /// with the `FAKTURO_` prefix): `HOST`, `PORT`, `EMAIL_MAX_BODY_BYTES`,
    /// `LOG_LEVEL`, `LOG_JSON`, `DATABASE_URL`, `AUTH_JWT_SECRET`, plus
    /// the rate-limit variables (see [`RateLimitConfig::from_env`]).
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = get_env_with_prefix("PORT") {
            if let Ok(p) = port.parse() {
                self.config.server.port = p;
            }
        }
        if let Some(max_body) = get_env_with_prefix("EMAIL_MAX_BODY_BYTES") {
            if let Ok(size) = max_body.parse() {
                self.config.server.max_body_bytes = size;
            }
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }

        self.config.database.url = get_env_with_prefix("DATABASE_URL");
        if let Some(secret) = get_env_with_prefix("AUTH_JWT_SECRET") {
            self.config.auth.jwt_secret = secret;
        }

        self.config.rate_limit = RateLimitConfig::from_env();

        self
    }

    /// Build the configuration, validating all settings.
    pub fn build(self) -> crate::error::Result<Config> {
        self.config.server.addr().map_err(|e| {
            crate::error::ApiError::validation(format!(
                "invalid server address {}:{} - {}",
                self.config.server.host, self.config.server.port, e
            ))
        })?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(crate::error::ApiError::validation(format!(
                "invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if self.config.server.port == 0 {
            return Err(crate::error::ApiError::validation(
                "server port must be greater than 0",
            ));
        }

        if self.config.server.max_body_bytes == 0 {
            return Err(crate::error::ApiError::validation(
                "maximum body size must be greater than 0",
            ));
        }

        if self.config.rate_limit.limit == 0 {
            return Err(crate::error::ApiError::validation(
                "rate limit must be greater than 0",
            ));
        }

        if self.config.rate_limit.window_ms == 0 {
            return Err(crate::error::ApiError::validation(
                "rate limit window must be greater than 0",
            ));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.max_body_bytes, 4 * 1024 * 1024);
        assert_eq!(config.rate_limit.limit, 10);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert!(config.uses_default_secret());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let result = ConfigBuilder::new().with_log_level("verbose").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let result = ConfigBuilder::new()
            .with_rate_limit(RateLimitConfig::builder().limit(0).build())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_body_cap_rejected() {
        let result = ConfigBuilder::new().with_max_body_bytes(0).build();
        assert!(result.is_err());
    }
}
