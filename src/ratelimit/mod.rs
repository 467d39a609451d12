//! Fixed-window rate limiting for outbound email endpoints.
//!
//! Counters live in a shared Redis store so limits hold across processes;
//! when Redis is unreachable the limiter transparently falls back to a
//! process-local counter for that call, with identical threshold
//! semantics. Backing-store failures never surface to callers.

mod config;
mod limiter;
mod store;

pub use config::{RateLimitConfig, RateLimitConfigBuilder};
pub use limiter::{client_key, ClientAddr, RateLimitDecision, RateLimiter};
pub use store::{CounterStore, LocalCounterStore, RedisCounterStore, WindowCount};
