//! Core types and shared functionality for the leumas offline shell.
//!
//! This crate provides:
//! - Request/response snapshot types and request identity
//! - The `CacheStorage` seam with in-memory and SQLite backends
//! - The `Transport` and `WorkerRegistrar` seams shared by page and worker
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use cache::{CacheDb, CacheStorage, MemoryCacheStorage, RequestKey};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use request::{Destination, InterceptedRequest, ResponseType, StoredResponse};
pub use transport::{Registration, Transport, WorkerRegistrar};
