//! Crowd metrics pipeline.
//!
//! This crate provides:
//! - Per-frame processing: upload, person detection, density and optical flow
//! - Threshold alerting on person counts
//! - Per-camera ordering with bounded global concurrency
//! - Short-horizon zone forecasts with prediction intervals
//! - In-memory adapters for tests and local runs

pub mod adapters;
pub mod alert;
pub mod config;
pub mod density;
pub mod dispatcher;
pub mod error;
pub mod flow;
pub mod forecast;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod orchestrator;
pub mod recorder;
pub mod registry;

pub use adapters::{AlertSink, DetectionInput, Detector, FittedTrend, FrameStore, MetricsStore, TrendModel};
pub use config::PipelineConfig;
pub use dispatcher::CameraDispatcher;
pub use error::{PipelineError, PipelineResult};
pub use flow::{FlowEstimator, FlowParams};
pub use forecast::{ForecastSettings, ForecastingEngine, LinearTrend};
pub use logging::FrameLogger;
pub use orchestrator::{FrameOutcome, FramePipeline, FrameStage, PreparedFrame};
pub use recorder::MetricsRecorder;
pub use registry::CameraStateRegistry;
