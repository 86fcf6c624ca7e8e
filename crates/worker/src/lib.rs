//! The offline cache manager: the service-worker half of the leumas shell.
//!
//! A `CacheManager` owns one versioned cache store. It seeds the store on
//! install, purges stale versions on activation, intercepts fetches with a
//! cache-first strategy (background refresh on hit, network on miss, cached
//! or offline-page fallback when the network fails) and answers a small
//! control-message channel.
//!
//! The decision logic lives in pure functions (`intercept::route`,
//! `intercept::should_store`, ...) so it can be tested without I/O.

pub mod config;
pub mod intercept;
pub mod lifecycle;
pub mod manager;
pub mod messages;
pub mod state;

pub use config::WorkerConfig;
pub use intercept::{FetchOutcome, FetchSource, Route};
pub use lifecycle::{ActivateReport, InstallReport};
pub use manager::{CacheManager, EventOutcome, WorkerEvent, WorkerStatus};
pub use messages::{ControlMessage, ControlReply};
pub use state::WorkerState;
