//! Metric and alert persistence.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SubsecRound, Utc};
use drishti_models::{normalize_coordinate, AlertInfo, AlertRecord, Frame, MetricRecord};
use tracing::debug;

use crate::adapters::{with_timeout, AlertSink, MetricsStore};
use crate::density::DensityEstimate;
use crate::error::{PipelineError, PipelineResult};

/// Assembles records and appends them to the metric and alert stores.
#[derive(Clone)]
pub struct MetricsRecorder {
    metrics: Arc<dyn MetricsStore>,
    alerts: Arc<dyn AlertSink>,
    timeout: Duration,
}

impl MetricsRecorder {
    pub fn new(metrics: Arc<dyn MetricsStore>, alerts: Arc<dyn AlertSink>, timeout: Duration) -> Self {
        Self {
            metrics,
            alerts,
            timeout,
        }
    }

    /// Build the metric record for a frame.
    ///
    /// Timestamps are truncated to microseconds, the precision the document
    /// store keeps, so a stored record reads back identical.
    pub fn build(
        frame: &Frame,
        frame_locator: String,
        estimate: DensityEstimate,
        flow_speed: f64,
    ) -> MetricRecord {
        MetricRecord {
            camera_id: frame.camera_id.clone(),
            zone_id: frame.zone_id.clone(),
            person_count: estimate.person_count,
            density: estimate.density,
            flow_speed,
            frame_locator,
            timestamp: frame.received_at.trunc_subsecs(6),
            lat: normalize_coordinate(frame.lat),
            lon: normalize_coordinate(frame.lon),
        }
    }

    /// Append a metric record. Once this returns `Ok` the record is durable.
    pub async fn record(&self, metric: &MetricRecord) -> PipelineResult<()> {
        with_timeout(
            self.timeout,
            self.metrics.append(metric),
            PipelineError::PersistenceUnavailable,
        )
        .await?;
        debug!(camera_id = %metric.camera_id, person_count = metric.person_count, "Metric recorded");
        Ok(())
    }

    /// Append an alert embedding `metric`.
    pub async fn record_alert(&self, metric: &MetricRecord, alert: AlertInfo) -> PipelineResult<AlertRecord> {
        let record = AlertRecord {
            metric: metric.clone(),
            alert,
            generated_at: Utc::now().trunc_subsecs(6),
        };
        with_timeout(
            self.timeout,
            self.alerts.append(&record),
            PipelineError::PersistenceUnavailable,
        )
        .await?;
        Ok(record)
    }
}
