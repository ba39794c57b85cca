//! Firestore REST API client.
//!
//! This crate provides:
//! - Append-only repositories for camera metrics and alerts
//! - Zone/time-range structured queries
//! - Service account authentication via gcp_auth
//! - Retry with backoff, request metrics and tracing spans

pub mod client;
pub mod error;
pub mod metrics;
pub mod records;
pub mod retry;
pub mod token_cache;
pub mod types;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use records::{AlertRepository, CollectionNames, MetricsRepository};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, StructuredQuery, ToFirestoreValue, Value};
