//! Threshold alert policy.
//!
//! Every frame at or above the threshold alerts; there is no cooldown or
//! hysteresis, so sustained crowding produces one alert per frame.

use drishti_models::{AlertInfo, AlertLevel};

pub fn evaluate(person_count: u32, threshold: u32) -> Option<AlertInfo> {
    (person_count >= threshold).then(|| AlertInfo {
        level: AlertLevel::High,
        message: format!("High crowd density: {} people detected", person_count),
    })
}
