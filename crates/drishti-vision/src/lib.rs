//! Client for a hosted object-detection model.
//!
//! Frames are referenced either by their storage locator or sent inline as
//! base64. Responses use the AutoML image object detection layout:
//! parallel `displayNames`, `confidences` and `bboxes` arrays per prediction.

pub mod client;
pub mod config;
pub mod error;
mod response;

pub use client::VisionClient;
pub use config::{InputMode, VisionConfig};
pub use error::{VisionError, VisionResult};
