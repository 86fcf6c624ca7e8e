//! Page-side code for the leumas offline shell.
//!
//! This crate provides the HTTP transport (plain and breadcrumb-instrumented),
//! the resource loader that drives lazy images, cache priming and resource
//! hints, and the session performance summary.

pub mod fetch;
pub mod loader;
pub mod perf;

pub use fetch::{Breadcrumb, BreadcrumbLevel, FetchConfig, HttpTransport, InstrumentedTransport};
pub use loader::{
    Capabilities, ElementDescriptor, ElementId, IntersectionEntry, LazyInit, LoadState, LoaderConfig, Rect,
    ResourceHint, ResourceLoader, prefetch_hints, preload_hints,
};
pub use perf::{LoadBadge, PerformanceSummary, TimingEntry, WebVitals};
