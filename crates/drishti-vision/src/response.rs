//! Wire types for `:predict` calls.

use drishti_models::{BoundingBox, Detection};
use serde::{Deserialize, Serialize};

use crate::error::{VisionError, VisionResult};

#[derive(Debug, Serialize)]
pub(crate) struct PredictRequest {
    pub instances: Vec<Instance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum Instance {
    Locator {
        #[serde(rename = "gcsImageUri")]
        gcs_image_uri: String,
    },
    Inline {
        content: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Parameters {
    pub max_predictions: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Prediction {
    #[serde(default)]
    pub display_names: Vec<String>,
    #[serde(default)]
    pub confidences: Vec<f32>,
    /// `[x_min, x_max, y_min, y_max]` per detection
    #[serde(default)]
    pub bboxes: Vec<[f32; 4]>,
}

impl PredictResponse {
    /// Flatten all predictions into detections.
    ///
    /// The three arrays are parallel; entries past the shortest array are
    /// ignored. A confidence outside `[0, 1]` (or NaN) makes the whole
    /// response invalid.
    pub fn into_detections(self) -> VisionResult<Vec<Detection>> {
        let mut detections = Vec::new();
        for p in self.predictions {
            let entries = p.display_names.into_iter().zip(p.confidences).zip(p.bboxes);
            for ((label, confidence), b) in entries {
                if !(0.0..=1.0).contains(&confidence) {
                    return Err(VisionError::invalid_response(format!(
                        "confidence {} for {:?} is outside [0, 1]",
                        confidence, label
                    )));
                }
                detections.push(Detection::new(
                    label,
                    confidence,
                    BoundingBox::new(b[0], b[2], b[1], b[3]),
                ));
            }
        }
        Ok(detections)
    }
}
