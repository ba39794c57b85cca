//! Per-frame pipeline.
//!
//! `Received → Stored → Detected → Estimated → Recorded → AlertEvaluated → Completed`
//!
//! A failing stage ends the frame with `Failed { stage, error }`. Nothing is
//! persisted until storage, detection and estimation have all succeeded.
//! The work is split in two so a caller can abandon a frame after
//! [`FramePipeline::prepare`] but before [`FramePipeline::commit`].

use std::sync::Arc;
use std::time::Instant;

use drishti_models::{AlertRecord, Frame, MetricRecord};
use serde::Serialize;
use tracing::Instrument;

use crate::adapters::{with_timeout, AlertSink, DetectionInput, Detector, FrameStore, MetricsStore};
use crate::alert;
use crate::config::PipelineConfig;
use crate::density::{self, DensityEstimate};
use crate::error::PipelineError;
use crate::flow::{FlowEstimator, FlowParams};
use crate::logging::FrameLogger;
use crate::metrics::{record_frame_completed, record_frame_failed, record_stage_duration};
use crate::recorder::MetricsRecorder;
use crate::registry::CameraStateRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStage {
    Received,
    Stored,
    Detected,
    Estimated,
    Recorded,
    AlertEvaluated,
    Completed,
}

impl FrameStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameStage::Received => "received",
            FrameStage::Stored => "stored",
            FrameStage::Detected => "detected",
            FrameStage::Estimated => "estimated",
            FrameStage::Recorded => "recorded",
            FrameStage::AlertEvaluated => "alert_evaluated",
            FrameStage::Completed => "completed",
        }
    }
}

/// Terminal result of one frame.
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Completed {
        metric: MetricRecord,
        alert: Option<AlertRecord>,
    },
    Failed {
        stage: FrameStage,
        error: PipelineError,
    },
}

impl FrameOutcome {
    pub fn failed(stage: FrameStage, error: PipelineError) -> Self {
        Self::Failed { stage, error }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, FrameOutcome::Completed { .. })
    }
}

/// A frame that has been stored, detected and estimated but not yet recorded.
#[derive(Debug)]
pub struct PreparedFrame {
    metric: MetricRecord,
    logger: FrameLogger,
}

impl PreparedFrame {
    pub fn metric(&self) -> &MetricRecord {
        &self.metric
    }
}

pub struct FramePipeline {
    store: Arc<dyn FrameStore>,
    detector: Arc<dyn Detector>,
    flow: FlowEstimator,
    recorder: MetricsRecorder,
    config: PipelineConfig,
}

impl FramePipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn FrameStore>,
        detector: Arc<dyn Detector>,
        metrics: Arc<dyn MetricsStore>,
        alerts: Arc<dyn AlertSink>,
        registry: Arc<CameraStateRegistry>,
    ) -> Self {
        let flow = FlowEstimator::new(
            registry,
            FlowParams {
                max_dimension: config.flow_max_dimension,
                iterations: config.flow_iterations,
                smoothness: config.flow_smoothness,
            },
        );
        let recorder = MetricsRecorder::new(metrics, alerts, config.persistence_timeout);

        Self {
            store,
            detector,
            flow,
            recorder,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CameraStateRegistry> {
        self.flow.registry()
    }

    /// Run a frame end to end.
    pub async fn process(&self, frame: Frame) -> FrameOutcome {
        match self.prepare(frame).await {
            Ok(prepared) => self.commit(prepared).await,
            Err(failed) => failed,
        }
    }

    /// Stored → Detected → Estimated. Has no durable effect besides the
    /// uploaded payload and the camera's flow baseline.
    pub async fn prepare(&self, mut frame: Frame) -> Result<PreparedFrame, FrameOutcome> {
        let logger = FrameLogger::new(&frame);
        let span = logger.create_span();
        let image = Arc::new(std::mem::take(&mut frame.image));
        logger.log_start(image.len());

        async {
            let started = Instant::now();
            let locator = with_timeout(
                self.config.storage_timeout,
                self.store.upload(&image, &frame.camera_id),
                PipelineError::StorageUploadFailure,
            )
            .await
            .map_err(|e| self.fail(&logger, FrameStage::Stored, e))?;
            record_stage_duration(FrameStage::Stored.as_str(), started.elapsed().as_secs_f64());

            let started = Instant::now();
            let input = DetectionInput {
                locator: &locator,
                image: &image,
            };
            let detections = with_timeout(
                self.config.detection_timeout,
                self.detector.detect(&input),
                PipelineError::DetectionAdapterFailure,
            )
            .await
            .map_err(|e| self.fail(&logger, FrameStage::Detected, e))?;
            record_stage_duration(FrameStage::Detected.as_str(), started.elapsed().as_secs_f64());

            let started = Instant::now();
            let (estimate, flow_speed) = self
                .estimate(&frame, Arc::clone(&image), &detections)
                .await
                .map_err(|e| self.fail(&logger, FrameStage::Estimated, e))?;
            record_stage_duration(FrameStage::Estimated.as_str(), started.elapsed().as_secs_f64());

            logger.log_stage(
                FrameStage::Estimated.as_str(),
                &format!(
                    "{} detections, {} persons, flow {:.3}",
                    detections.len(),
                    estimate.person_count,
                    flow_speed
                ),
            );

            Ok::<_, FrameOutcome>(PreparedFrame {
                metric: MetricsRecorder::build(&frame, locator, estimate, flow_speed),
                logger: logger.clone(),
            })
        }
        .instrument(span)
        .await
    }

    async fn estimate(
        &self,
        frame: &Frame,
        image: Arc<Vec<u8>>,
        detections: &[drishti_models::Detection],
    ) -> Result<(DensityEstimate, f64), PipelineError> {
        let flow = self.flow.measure(&frame.camera_id, image).await?;
        let estimate = density::estimate(
            detections,
            flow.width,
            flow.height,
            self.config.detection_confidence_cutoff,
        )?;
        Ok((estimate, flow.flow_speed))
    }

    /// Recorded → AlertEvaluated → Completed.
    ///
    /// If the alert append fails the metric stays recorded and the frame
    /// reports failure at `AlertEvaluated`.
    pub async fn commit(&self, prepared: PreparedFrame) -> FrameOutcome {
        let PreparedFrame { metric, logger } = prepared;
        let span = logger.create_span();

        async {
            let started = Instant::now();
            if let Err(e) = self.recorder.record(&metric).await {
                return self.fail(&logger, FrameStage::Recorded, e);
            }
            record_stage_duration(FrameStage::Recorded.as_str(), started.elapsed().as_secs_f64());

            let alert = match alert::evaluate(metric.person_count, self.config.alert_threshold) {
                Some(info) => match self.recorder.record_alert(&metric, info).await {
                    Ok(record) => {
                        logger.log_warning(&record.alert.message);
                        Some(record)
                    }
                    Err(e) => return self.fail(&logger, FrameStage::AlertEvaluated, e),
                },
                None => None,
            };

            record_frame_completed(alert.is_some());
            logger.log_completion(metric.person_count, alert.is_some());
            FrameOutcome::Completed { metric, alert }
        }
        .instrument(span)
        .await
    }

    fn fail(&self, logger: &FrameLogger, stage: FrameStage, error: PipelineError) -> FrameOutcome {
        record_frame_failed(stage.as_str(), error.kind());
        logger.log_failure(stage.as_str(), error.kind(), error.is_transient(), &error.to_string());
        FrameOutcome::failed(stage, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::test_images::square_png;
    use crate::memory::{MemoryAlertSink, MemoryFrameStore, MemoryMetricsStore, ScriptedDetector};
    use drishti_models::{CameraId, ZoneId};
    use std::time::Duration;

    struct Harness {
        pipeline: FramePipeline,
        store: Arc<MemoryFrameStore>,
        metrics: Arc<MemoryMetricsStore>,
        alerts: Arc<MemoryAlertSink>,
    }

    fn harness(detector: ScriptedDetector, config: PipelineConfig) -> Harness {
        let store = Arc::new(MemoryFrameStore::new());
        let metrics = Arc::new(MemoryMetricsStore::new());
        let alerts = Arc::new(MemoryAlertSink::new());
        let pipeline = FramePipeline::new(
            config,
            store.clone(),
            Arc::new(detector),
            metrics.clone(),
            alerts.clone(),
            Arc::new(CameraStateRegistry::new()),
        );
        Harness {
            pipeline,
            store,
            metrics,
            alerts,
        }
    }

    fn frame(image: Vec<u8>) -> Frame {
        Frame::new(CameraId::parse("cam1").unwrap(), ZoneId::parse("z1").unwrap(), image)
    }

    #[tokio::test]
    async fn test_completed_frame_without_alert() {
        let h = harness(ScriptedDetector::with_person_counts([4]), PipelineConfig::default());
        let outcome = h.pipeline.process(frame(square_png(40, 30, 0))).await;

        match outcome {
            FrameOutcome::Completed { metric, alert } => {
                assert_eq!(metric.person_count, 4);
                assert_eq!(metric.flow_speed, 0.0);
                assert!(metric.frame_locator.starts_with("memory://frames/cam1/"));
                assert!(alert.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(h.metrics.len().await, 1);
        assert!(h.alerts.alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_alert_at_threshold() {
        let h = harness(ScriptedDetector::with_person_counts([15]), PipelineConfig::default());
        let outcome = h.pipeline.process(frame(square_png(40, 30, 0))).await;

        let FrameOutcome::Completed { alert: Some(alert), metric } = outcome else {
            panic!("expected an alert");
        };
        assert!(alert.alert.message.contains("15"));
        assert_eq!(alert.metric, metric);
        assert_eq!(h.alerts.alerts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_persists_nothing() {
        let h = harness(ScriptedDetector::with_person_counts([20]), PipelineConfig::default());
        h.store.set_failing(true);

        let outcome = h.pipeline.process(frame(square_png(40, 30, 0))).await;
        assert!(matches!(
            outcome,
            FrameOutcome::Failed {
                stage: FrameStage::Stored,
                error: PipelineError::StorageUploadFailure(_)
            }
        ));
        assert!(h.metrics.is_empty().await);
        assert!(h.alerts.alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_detection_failure_and_timeout() {
        let detector = ScriptedDetector::new();
        detector
            .push(Err(PipelineError::detection("endpoint returned 503")))
            .await;
        let h = harness(detector, PipelineConfig::default());
        let outcome = h.pipeline.process(frame(square_png(40, 30, 0))).await;
        assert!(matches!(
            outcome,
            FrameOutcome::Failed {
                stage: FrameStage::Detected,
                ..
            }
        ));

        let config = PipelineConfig {
            detection_timeout: Duration::from_millis(20),
            ..PipelineConfig::default()
        };
        let slow = ScriptedDetector::new().with_delay(Duration::from_secs(5));
        let h = harness(slow, config);
        let outcome = h.pipeline.process(frame(square_png(40, 30, 0))).await;
        match outcome {
            FrameOutcome::Failed { stage, error } => {
                assert_eq!(stage, FrameStage::Detected);
                assert!(error.is_transient());
                assert!(error.to_string().contains("timed out"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(h.metrics.is_empty().await);
    }

    #[tokio::test]
    async fn test_undecodable_image_fails_estimation() {
        let h = harness(ScriptedDetector::with_person_counts([3]), PipelineConfig::default());
        let outcome = h.pipeline.process(frame(b"garbage".to_vec())).await;
        match outcome {
            FrameOutcome::Failed { stage, error } => {
                assert_eq!(stage, FrameStage::Estimated);
                assert!(error.is_data_quality());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(h.metrics.is_empty().await);
    }

    #[tokio::test]
    async fn test_persistence_failure_reports_recorded_stage() {
        let h = harness(ScriptedDetector::with_person_counts([30]), PipelineConfig::default());
        h.metrics.set_failing(true);
        let outcome = h.pipeline.process(frame(square_png(40, 30, 0))).await;
        assert!(matches!(
            outcome,
            FrameOutcome::Failed {
                stage: FrameStage::Recorded,
                error: PipelineError::PersistenceUnavailable(_)
            }
        ));
        assert!(h.alerts.alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_alert_sink_failure_keeps_metric() {
        let h = harness(ScriptedDetector::with_person_counts([30]), PipelineConfig::default());
        h.alerts.set_failing(true);
        let outcome = h.pipeline.process(frame(square_png(40, 30, 0))).await;
        assert!(matches!(
            outcome,
            FrameOutcome::Failed {
                stage: FrameStage::AlertEvaluated,
                ..
            }
        ));
        assert_eq!(h.metrics.len().await, 1);
    }

    #[tokio::test]
    async fn test_prepare_without_commit_persists_nothing() {
        let h = harness(ScriptedDetector::with_person_counts([30]), PipelineConfig::default());
        let prepared = h.pipeline.prepare(frame(square_png(40, 30, 0))).await.unwrap();
        assert_eq!(prepared.metric().person_count, 30);
        drop(prepared);
        assert!(h.metrics.is_empty().await);
        assert!(h.alerts.alerts().await.is_empty());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(FrameStage::AlertEvaluated.as_str(), "alert_evaluated");
        assert_eq!(
            serde_json::to_value(FrameStage::AlertEvaluated).unwrap(),
            serde_json::json!("alert_evaluated")
        );
    }
}
