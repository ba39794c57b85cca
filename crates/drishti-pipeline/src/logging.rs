//! Structured per-frame logging.

use tracing::{error, info, warn, Span};

use drishti_models::Frame;

/// Logger carrying the identifiers of one frame.
#[derive(Debug, Clone)]
pub struct FrameLogger {
    frame_id: String,
    camera_id: String,
    zone_id: String,
}

impl FrameLogger {
    pub fn new(frame: &Frame) -> Self {
        Self {
            frame_id: frame.frame_id.to_string(),
            camera_id: frame.camera_id.to_string(),
            zone_id: frame.zone_id.to_string(),
        }
    }

    pub fn log_start(&self, bytes: usize) {
        info!(
            frame_id = %self.frame_id,
            camera_id = %self.camera_id,
            zone_id = %self.zone_id,
            bytes,
            "Frame received"
        );
    }

    pub fn log_stage(&self, stage: &str, message: &str) {
        info!(
            frame_id = %self.frame_id,
            camera_id = %self.camera_id,
            stage,
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            frame_id = %self.frame_id,
            camera_id = %self.camera_id,
            "{}", message
        );
    }

    /// Transient failures log at warn, everything else at error.
    pub fn log_failure(&self, stage: &str, kind: &str, transient: bool, message: &str) {
        if transient {
            warn!(
                frame_id = %self.frame_id,
                camera_id = %self.camera_id,
                zone_id = %self.zone_id,
                stage,
                kind,
                "Frame failed: {}", message
            );
        } else {
            error!(
                frame_id = %self.frame_id,
                camera_id = %self.camera_id,
                zone_id = %self.zone_id,
                stage,
                kind,
                "Frame failed: {}", message
            );
        }
    }

    pub fn log_completion(&self, person_count: u32, alerted: bool) {
        info!(
            frame_id = %self.frame_id,
            camera_id = %self.camera_id,
            zone_id = %self.zone_id,
            person_count,
            alerted,
            "Frame completed"
        );
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    /// Span covering the whole pipeline pass for this frame.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "frame",
            frame_id = %self.frame_id,
            camera_id = %self.camera_id,
            zone_id = %self.zone_id
        )
    }
}
