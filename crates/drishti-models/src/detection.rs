//! Object detections returned by the detection service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label substring that identifies a person detection.
pub const PERSON_LABEL: &str = "person";

/// Bounding box as reported by the detector, either normalized `[0, 1]` or
/// pixel coordinates depending on the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }
}

/// A single detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Class label (e.g. "person", "Person", "car")
    pub label: String,
    /// Confidence score in [0, 1]
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// Case-insensitive substring match on the person label.
    pub fn is_person(&self) -> bool {
        self.label.to_lowercase().contains(PERSON_LABEL)
    }
}
