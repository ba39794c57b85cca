//! Forecast output.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One predicted person count with its uncertainty interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}
