//! Vision endpoint configuration.

use std::time::Duration;

use crate::error::{VisionError, VisionResult};

/// How a frame is handed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Send the storage locator (`gcsImageUri`); the model reads the object itself.
    Locator,
    /// Send the image bytes as base64 `content`.
    Inline,
}

impl InputMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "locator" | "uri" => Some(Self::Locator),
            "inline" | "content" => Some(Self::Inline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Full `:predict` URL of the deployed model
    pub endpoint_url: String,
    /// Static bearer token; when absent a service account is used
    pub access_token: Option<String>,
    pub input_mode: InputMode,
    pub timeout: Duration,
    /// Optional cap passed to the model as `maxPredictions`
    pub max_predictions: Option<u32>,
}

impl VisionConfig {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            access_token: None,
            input_mode: InputMode::Locator,
            timeout: Duration::from_secs(20),
            max_predictions: None,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> VisionResult<Self> {
        let endpoint_url = std::env::var("VISION_ENDPOINT_URL")
            .map_err(|_| VisionError::config("VISION_ENDPOINT_URL not set"))?;

        let input_mode = match std::env::var("VISION_INPUT_MODE") {
            Ok(raw) => InputMode::parse(&raw).ok_or_else(|| {
                VisionError::config(format!("VISION_INPUT_MODE must be locator or inline, got {raw}"))
            })?,
            Err(_) => InputMode::Locator,
        };

        Ok(Self {
            endpoint_url,
            access_token: std::env::var("VISION_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            input_mode,
            timeout: std::env::var("VISION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(20)),
            max_predictions: std::env::var("VISION_MAX_PREDICTIONS")
                .ok()
                .and_then(|s| s.parse().ok()),
        })
    }
}
