//! The rate limiter and its degradation policy.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, HeaderMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::config::RateLimitConfig;
use super::store::{CounterStore, LocalCounterStore, RedisCounterStore};
use crate::traits::clock::Clock;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Seconds until the caller may retry; 0 when allowed.
    pub retry_after_seconds: u64,
}

/// Fixed-window rate limiter with a shared primary store and a
/// process-local fallback.
///
/// `check` never fails: a primary-store error (connection refused,
/// timeout) degrades that single call to the local store, and the
/// degradation is logged once rather than per request.
pub struct RateLimiter {
    limit: u64,
    window: std::time::Duration,
    primary: Option<Arc<dyn CounterStore>>,
    fallback: Arc<dyn CounterStore>,
    degraded: AtomicBool,
}

impl RateLimiter {
    pub fn from_config(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let primary: Option<Arc<dyn CounterStore>> = match &config.redis_url {
            Some(url) => match RedisCounterStore::new(url) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    tracing::warn!(error = %e, "invalid REDIS_URL, rate limiting runs on local counters only");
                    None
                }
            },
            None => None,
        };

        Self {
            limit: config.limit,
            window: config.window(),
            primary,
            fallback: Arc::new(LocalCounterStore::new(clock)),
            degraded: AtomicBool::new(false),
        }
    }

    /// Build a limiter over explicit stores (tests inject fakes here).
    pub fn with_stores(
        limit: u64,
        window: std::time::Duration,
        primary: Option<Arc<dyn CounterStore>>,
        fallback: Arc<dyn CounterStore>,
    ) -> Self {
        Self {
            limit,
            window,
            primary,
            fallback,
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the limiter is currently running on the local fallback.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Count this request against `key` and decide whether to allow it.
    ///
    /// The Nth request of a window with `limit = N` is allowed; the
    /// (N+1)th is denied with the seconds remaining until the window
    /// resets (rounded up, at least 1).
    pub async fn check(&self, key: &str) -> RateLimitDecision {
        let hit = match &self.primary {
            Some(primary) => match primary.increment(key, self.window).await {
                Ok(hit) => {
                    if self.degraded.swap(false, Ordering::Relaxed) {
                        tracing::info!("rate limit store reachable again, leaving fallback mode");
                    }
                    hit
                }
                Err(e) => {
                    if !self.degraded.swap(true, Ordering::Relaxed) {
                        tracing::warn!(
                            error = %e,
                            "rate limit store unreachable, falling back to in-process counters"
                        );
                    }
                    match self.fallback.increment(key, self.window).await {
                        Ok(hit) => hit,
                        // The local store is infallible in practice; if it
                        // ever errors, fail open rather than blocking sends.
                        Err(e) => {
                            tracing::error!(error = %e, "local rate limit counter failed");
                            return RateLimitDecision {
                                allowed: true,
                                retry_after_seconds: 0,
                            };
                        }
                    }
                }
            },
            None => match self.fallback.increment(key, self.window).await {
                Ok(hit) => hit,
                Err(e) => {
                    tracing::error!(error = %e, "local rate limit counter failed");
                    return RateLimitDecision {
                        allowed: true,
                        retry_after_seconds: 0,
                    };
                }
            },
        };

        if hit.count <= self.limit {
            RateLimitDecision {
                allowed: true,
                retry_after_seconds: 0,
            }
        } else {
            RateLimitDecision {
                allowed: false,
                retry_after_seconds: (hit.resets_in.as_millis() as u64).div_ceil(1_000).max(1),
            }
        }
    }
}

/// The request's socket peer address, when the server was started with
/// connect-info (absent under some test harnesses).
pub struct ClientAddr(pub Option<SocketAddr>);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(ClientAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0),
        ))
    }
}

/// Compose the rate-limit key for a request: `<route>:<client-ip>`.
///
/// Proxy headers are only trusted when `trust_proxy` is set; otherwise
/// only the socket peer address counts, which prevents clients from
/// spoofing their way past per-IP limits. Requests with no determinable
/// address share one bucket per route.
pub fn client_key(
    route: &str,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy: bool,
) -> String {
    let ip = if trust_proxy {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            // "client, proxy1, proxy2" - the leftmost entry is the client
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string())
            })
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
    } else {
        peer.map(|addr| addr.ip().to_string())
    };

    match ip {
        Some(ip) => format!("{}:{}", route, ip),
        None => format!("{}:unknown", route),
    }
}
