//! fakturo - a billing backend for freelancers
//!
//! Manages clients, projects, offers, and invoices, renders documents to
//! PDF, delivers them by email, and locks invoices on finalization. Built
//! on Axum and Tokio.
//!
//! # Core guarantees
//!
//! - **Invoice locking**: sending an invoice finalizes it; a storage-layer
//!   trigger makes locked content immutable against every update path.
//! - **Email abuse control**: the send endpoints sit behind a payload
//!   guard and a fixed-window rate limiter whose shared Redis counters
//!   degrade gracefully to in-process counters when the store is down.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fakturo::{App, AppContext, ConfigBuilder};
//!
//! #[tokio::main]
//! async fn main() {
//!     fakturo::init_tracing("info", false);
//!
//!     let config = ConfigBuilder::new().from_env().build().unwrap();
//!     let store = Arc::new(fakturo::store::InMemoryStore::new());
//!
//!     let context = AppContext::builder()
//!         .with_config(config)
//!         .with_store(store)
//!         .build()
//!         .unwrap();
//!
//!     App::new(context).serve().await.unwrap();
//! }
//! ```

mod app;
pub mod auth;
pub mod clients;
mod config;
mod core;
pub mod documents;
pub mod email;
mod error;
pub mod health;
pub mod http;
pub mod invoices;
pub mod offers;
pub mod projects;
pub mod ratelimit;
pub mod store;
pub mod testing;
pub mod traits;
mod utils;

// Re-exports for the public API
pub use app::{AppContext, AppContextBuilder};
pub use config::{Config, ConfigBuilder, ServerConfig};
pub use core::App;
pub use error::{ApiError, Result};

use tracing_subscriber::EnvFilter;

/// Initialize tracing with an env-filter; `RUST_LOG` overrides `level`.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
