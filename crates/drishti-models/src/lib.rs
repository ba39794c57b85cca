//! Shared data models for the Drishti backend.
//!
//! This crate provides Serde-serializable types for:
//! - Camera and zone identifiers
//! - Incoming frames and their metadata
//! - Object detections
//! - Persisted metric and alert records
//! - Forecast points and query time ranges

pub mod detection;
pub mod forecast;
pub mod frame;
pub mod ids;
pub mod record;
pub mod time_range;

// Re-export common types
pub use detection::{BoundingBox, Detection};
pub use forecast::ForecastPoint;
pub use frame::{normalize_coordinate, Frame, FrameMetadata};
pub use ids::{CameraId, IdError, ZoneId};
pub use record::{AlertInfo, AlertLevel, AlertRecord, MetricRecord};
pub use time_range::TimeRange;
