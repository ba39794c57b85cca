//! Axum HTTP API server.
//!
//! This crate provides:
//! - Frame ingestion into the per-camera metrics pipeline
//! - Zone forecasts, recent metrics and summaries
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{SummaryClient, SummaryConfig, ZoneStats};
pub use state::{AppState, Collaborators};
