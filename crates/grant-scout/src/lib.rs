//! Scoring and caching core for grant opportunity discovery backends.
//!
//! The crate wraps an upstream grants search API behind a retrying client,
//! caches responses in a bounded TTL cache, and turns raw opportunity records
//! into auditable multi-dimension scores. The HTTP host boundary is a thin
//! axum router over [`scoring::ScoringService`]; everything below it is
//! plain library code.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod scoring;
pub mod telemetry;
