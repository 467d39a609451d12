use std::sync::Arc;

use crate::config::Config;
use crate::ratelimit::RateLimiter;
use crate::traits::clock::{Clock, SystemClock};
use crate::traits::mailer::Mailer;
use crate::traits::store::AppStore;

/// Application context for dependency injection and shared state.
///
/// Holds the store, mailer, and rate limiter behind their trait seams so
/// production backends and test fakes are interchangeable.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn AppStore>,
    pub mailer: Arc<dyn Mailer>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }
}

/// Builder for AppContext with fluent API.
#[must_use = "builder does nothing until you call build()"]
pub struct AppContextBuilder {
    config: Option<Config>,
    store: Option<Arc<dyn AppStore>>,
    mailer: Option<Arc<dyn Mailer>>,
    rate_limiter: Option<Arc<RateLimiter>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            store: None,
            mailer: None,
            rate_limiter: None,
            clock: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn AppStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Clock used by the rate limiter's local counters (tests inject a
    /// manual clock here).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> crate::error::Result<AppContext> {
        let config = Arc::new(self.config.unwrap_or_default());
        let store = self
            .store
            .ok_or_else(|| crate::error::ApiError::internal("store not configured"))?;
        let mailer = self
            .mailer
            .unwrap_or_else(|| Arc::new(crate::email::ConsoleMailer::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::from_config(&config.rate_limit, clock)));

        Ok(AppContext {
            config,
            store,
            mailer,
            rate_limiter,
        })
    }
}

impl Default for AppContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
