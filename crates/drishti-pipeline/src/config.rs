//! Pipeline configuration.

use std::time::Duration;

/// Tunables for the frame pipeline, alert engine and forecaster.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum detection confidence counted as a person (inclusive)
    pub detection_confidence_cutoff: f32,
    /// Person count at or above which a frame raises an alert
    pub alert_threshold: u32,
    /// History used to fit a forecast
    pub forecast_lookback: Duration,
    /// Default forecast horizon
    pub forecast_horizon: Duration,
    /// Resampling step for forecasts
    pub forecast_cadence: Duration,
    /// Fewer stored records than this yields "insufficient data"
    pub forecast_min_records: usize,
    /// Coverage of the forecast interval, e.g. 0.8 for 80%
    pub forecast_interval_width: f64,
    pub storage_timeout: Duration,
    pub detection_timeout: Duration,
    pub persistence_timeout: Duration,
    /// Cameras idle this long lose their flow baseline and dispatcher queue
    pub camera_idle_ttl: Duration,
    /// Frames that may wait behind a busy camera
    pub camera_queue_depth: usize,
    /// Frames in flight across all cameras
    pub max_concurrent_frames: usize,
    /// Longest side of the image used for optical flow
    pub flow_max_dimension: u32,
    pub flow_iterations: usize,
    pub flow_smoothness: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection_confidence_cutoff: 0.3,
            alert_threshold: 15,
            forecast_lookback: Duration::from_secs(180 * 60),
            forecast_horizon: Duration::from_secs(20 * 60),
            forecast_cadence: Duration::from_secs(60),
            forecast_min_records: 10,
            forecast_interval_width: 0.8,
            storage_timeout: Duration::from_secs(15),
            detection_timeout: Duration::from_secs(20),
            persistence_timeout: Duration::from_secs(10),
            camera_idle_ttl: Duration::from_secs(900),
            camera_queue_depth: 32,
            max_concurrent_frames: 8,
            flow_max_dimension: 320,
            flow_iterations: 40,
            flow_smoothness: 1.0,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn minutes(key: &str, default: u64) -> Duration {
    Duration::from_secs(env_or(key, default).max(1) * 60)
}

fn seconds(key: &str, default: u64) -> Duration {
    Duration::from_secs(env_or(key, default).max(1))
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            detection_confidence_cutoff: env_or(
                "DETECTION_CONFIDENCE_CUTOFF",
                defaults.detection_confidence_cutoff,
            )
            .clamp(0.0, 1.0),
            alert_threshold: env_or("ALERT_THRESHOLD", defaults.alert_threshold),
            forecast_lookback: minutes("FORECAST_LOOKBACK_MINUTES", 180),
            forecast_horizon: minutes("FORECAST_HORIZON_MINUTES", 20),
            forecast_cadence: minutes("FORECAST_CADENCE_MINUTES", 1),
            forecast_min_records: env_or("FORECAST_MIN_RECORDS", defaults.forecast_min_records),
            forecast_interval_width: env_or(
                "FORECAST_INTERVAL_WIDTH",
                defaults.forecast_interval_width,
            ),
            storage_timeout: seconds("STORAGE_TIMEOUT_SECS", 15),
            detection_timeout: seconds("DETECTION_TIMEOUT_SECS", 20),
            persistence_timeout: seconds("PERSISTENCE_TIMEOUT_SECS", 10),
            camera_idle_ttl: seconds("CAMERA_IDLE_TTL_SECS", 900),
            camera_queue_depth: env_or("CAMERA_QUEUE_DEPTH", defaults.camera_queue_depth).max(1),
            max_concurrent_frames: env_or("MAX_CONCURRENT_FRAMES", defaults.max_concurrent_frames)
                .max(1),
            flow_max_dimension: env_or("FLOW_MAX_DIMENSION", defaults.flow_max_dimension).max(8),
            flow_iterations: env_or("FLOW_ITERATIONS", defaults.flow_iterations).max(1),
            flow_smoothness: env_or("FLOW_SMOOTHNESS", defaults.flow_smoothness),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "DETECTION_CONFIDENCE_CUTOFF",
        "ALERT_THRESHOLD",
        "FORECAST_LOOKBACK_MINUTES",
        "FORECAST_HORIZON_MINUTES",
        "FORECAST_CADENCE_MINUTES",
        "CAMERA_QUEUE_DEPTH",
    ];

    fn clear() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        clear();
        let config = PipelineConfig::from_env();
        assert_eq!(config.alert_threshold, 15);
        assert!((config.detection_confidence_cutoff - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.forecast_lookback, Duration::from_secs(180 * 60));
        assert_eq!(config.forecast_horizon, Duration::from_secs(20 * 60));
        assert_eq!(config.forecast_cadence, Duration::from_secs(60));
        assert_eq!(config.forecast_min_records, 10);
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear();
        std::env::set_var("ALERT_THRESHOLD", "40");
        std::env::set_var("FORECAST_HORIZON_MINUTES", "45");
        std::env::set_var("DETECTION_CONFIDENCE_CUTOFF", "0.55");
        let config = PipelineConfig::from_env();
        assert_eq!(config.alert_threshold, 40);
        assert_eq!(config.forecast_horizon, Duration::from_secs(45 * 60));
        assert!((config.detection_confidence_cutoff - 0.55).abs() < 1e-6);
        clear();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear();
        std::env::set_var("ALERT_THRESHOLD", "many");
        std::env::set_var("CAMERA_QUEUE_DEPTH", "0");
        std::env::set_var("FORECAST_CADENCE_MINUTES", "0");
        let config = PipelineConfig::from_env();
        assert_eq!(config.alert_threshold, 15);
        assert_eq!(config.camera_queue_depth, 1);
        assert_eq!(config.forecast_cadence, Duration::from_secs(60));
        clear();
    }
}
