//! Persisted metric and alert records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{CameraId, ZoneId};

/// Per-frame crowd metrics. Immutable once created; stored append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricRecord {
    pub camera_id: CameraId,
    pub zone_id: ZoneId,
    /// Number of person detections at or above the confidence cutoff
    pub person_count: u32,
    /// Persons per 10,000 square pixels
    pub density: f64,
    /// Mean per-pixel motion magnitude against the previous frame
    pub flow_speed: f64,
    /// Locator of the stored frame payload
    pub frame_locator: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    High,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(AlertLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert metadata returned to callers and embedded in alert records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AlertInfo {
    pub level: AlertLevel,
    pub message: String,
}

/// A metric record that crossed the alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AlertRecord {
    #[serde(flatten)]
    pub metric: MetricRecord,
    pub alert: AlertInfo,
    pub generated_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(metric: MetricRecord, alert: AlertInfo) -> Self {
        Self {
            metric,
            alert,
            generated_at: Utc::now(),
        }
    }
}
