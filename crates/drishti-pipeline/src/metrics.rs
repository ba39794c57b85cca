//! Pipeline metrics.

use metrics::{counter, gauge, histogram};

pub mod names {
    pub const FRAMES_PROCESSED_TOTAL: &str = "pipeline_frames_processed_total";
    pub const FRAMES_FAILED_TOTAL: &str = "pipeline_frames_failed_total";
    pub const ALERTS_RAISED_TOTAL: &str = "pipeline_alerts_raised_total";
    pub const STAGE_DURATION_SECONDS: &str = "pipeline_stage_duration_seconds";
    pub const TRACKED_CAMERAS: &str = "pipeline_tracked_cameras";
    pub const ACTIVE_CAMERA_WORKERS: &str = "pipeline_active_camera_workers";
    pub const FORECASTS_TOTAL: &str = "pipeline_forecasts_total";
}

pub fn record_frame_completed(alerted: bool) {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(1);
    if alerted {
        counter!(names::ALERTS_RAISED_TOTAL).increment(1);
    }
}

pub fn record_frame_failed(stage: &'static str, kind: &'static str) {
    counter!(
        names::FRAMES_FAILED_TOTAL,
        "stage" => stage,
        "kind" => kind
    )
    .increment(1);
}

pub fn record_stage_duration(stage: &'static str, seconds: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(seconds);
}

pub fn set_tracked_cameras(count: usize) {
    gauge!(names::TRACKED_CAMERAS).set(count as f64);
}

pub fn set_active_camera_workers(count: usize) {
    gauge!(names::ACTIVE_CAMERA_WORKERS).set(count as f64);
}

pub fn record_forecast(status: &'static str) {
    counter!(names::FORECASTS_TOTAL, "status" => status).increment(1);
}
