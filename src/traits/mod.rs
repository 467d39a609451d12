//! Core trait seams for swappable backends.
//!
//! Each trait covers one narrow capability so production backends
//! (Postgres, SMTP, Redis-backed counters) and in-memory test fakes can
//! stand in for each other without touching business code.

pub mod clock;
pub mod mailer;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use mailer::{Attachment, Email, Mailer};
pub use store::AppStore;
