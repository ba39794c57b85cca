//! Incoming frames.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::ids::{CameraId, IdError, ZoneId};

/// A single camera frame travelling through the pipeline.
///
/// Frames are ephemeral: only the locator of the stored payload and the
/// derived metrics outlive a pipeline pass.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Per-submission identifier, used for log correlation only
    pub frame_id: Uuid,
    pub camera_id: CameraId,
    pub zone_id: ZoneId,
    /// Encoded image payload (JPEG/PNG)
    pub image: Vec<u8>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Arrival time, which also becomes the metric timestamp
    pub received_at: DateTime<Utc>,
}

impl Frame {
    /// Create a frame that arrived now.
    pub fn new(camera_id: CameraId, zone_id: ZoneId, image: Vec<u8>) -> Self {
        Self {
            frame_id: Uuid::new_v4(),
            camera_id,
            zone_id,
            image,
            lat: None,
            lon: None,
            received_at: Utc::now(),
        }
    }

    /// Attach a geolocation. Zero or non-finite coordinates are dropped.
    pub fn with_location(mut self, lat: Option<f64>, lon: Option<f64>) -> Self {
        self.lat = normalize_coordinate(lat);
        self.lon = normalize_coordinate(lon);
        self
    }

    /// Override the arrival timestamp.
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }
}

/// Keep a coordinate only when it carries information.
///
/// Upstream clients send `0` for "unknown", so zero is treated like absence.
pub fn normalize_coordinate(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

/// Caller-supplied metadata accompanying a frame upload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FrameMetadata {
    #[validate(length(min = 1, max = 128))]
    pub camera_id: String,

    #[validate(length(min = 1, max = 128))]
    pub zone_id: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: Option<f64>,
}

impl FrameMetadata {
    /// Build a frame from validated metadata and an image payload.
    pub fn into_frame(self, image: Vec<u8>) -> Result<Frame, IdError> {
        let camera_id = CameraId::parse(self.camera_id)?;
        let zone_id = ZoneId::parse(self.zone_id)?;
        Ok(Frame::new(camera_id, zone_id, image).with_location(self.lat, self.lon))
    }
}
