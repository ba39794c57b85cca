//! Collaborator interfaces and their production bindings.
//!
//! The pipeline only talks to storage, detection and persistence through
//! these traits. Errors from concrete clients are mapped into the pipeline
//! taxonomy here, and nothing at this layer retries.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use drishti_firestore::{AlertRepository, MetricsRepository};
use drishti_models::{AlertRecord, CameraId, Detection, MetricRecord, TimeRange, ZoneId};
use drishti_storage::BucketClient;
use drishti_vision::VisionClient;

use crate::error::{PipelineError, PipelineResult};
use crate::forecast::ResampledSeries;

/// Durable storage for raw frame payloads.
#[async_trait]
pub trait FrameStore: Send + Sync {
    /// Store `image` and return a locator unique to this call.
    async fn upload(&self, image: &[u8], camera: &CameraId) -> PipelineResult<String>;

    async fn health_check(&self) -> PipelineResult<()> {
        Ok(())
    }
}

/// What a detector may look at: the stored locator and the same bytes.
#[derive(Debug, Clone, Copy)]
pub struct DetectionInput<'a> {
    pub locator: &'a str,
    pub image: &'a [u8],
}

/// Object detector.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, input: &DetectionInput<'_>) -> PipelineResult<Vec<Detection>>;

    async fn health_check(&self) -> PipelineResult<()> {
        Ok(())
    }
}

/// Append-only metric history.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn append(&self, record: &MetricRecord) -> PipelineResult<()>;

    /// Records of `zone` within `range`, ascending by timestamp.
    async fn query(&self, zone: &ZoneId, range: &TimeRange) -> PipelineResult<Vec<MetricRecord>>;

    async fn health_check(&self) -> PipelineResult<()> {
        Ok(())
    }
}

/// Append-only alert log.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn append(&self, alert: &AlertRecord) -> PipelineResult<()>;

    async fn health_check(&self) -> PipelineResult<()> {
        Ok(())
    }
}

/// A time-series model that can be fitted to a resampled count series.
pub trait TrendModel: Send + Sync {
    fn fit(&self, series: &ResampledSeries) -> PipelineResult<Box<dyn FittedTrend>>;
}

/// A fitted model.
pub trait FittedTrend: Send {
    /// `(estimate, lower, upper)` for `steps_ahead` cadence steps past the
    /// last observed bucket.
    fn predict(&self, steps_ahead: usize) -> (f64, f64, f64);
}

/// Bound `fut` by `limit`; elapsing maps through `on_timeout`.
pub async fn with_timeout<T, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce(String) -> PipelineError,
) -> PipelineResult<T>
where
    F: Future<Output = PipelineResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!("timed out after {}ms", limit.as_millis()))),
    }
}

// ============================================================================
// Production bindings
// ============================================================================

#[async_trait]
impl FrameStore for BucketClient {
    async fn upload(&self, image: &[u8], camera: &CameraId) -> PipelineResult<String> {
        let stored = self.upload_frame(image.to_vec(), camera).await?;
        Ok(stored.locator)
    }

    async fn health_check(&self) -> PipelineResult<()> {
        Ok(self.check_connectivity().await?)
    }
}

#[async_trait]
impl Detector for VisionClient {
    async fn detect(&self, input: &DetectionInput<'_>) -> PipelineResult<Vec<Detection>> {
        Ok(VisionClient::detect(self, input.locator, input.image).await?)
    }

    async fn health_check(&self) -> PipelineResult<()> {
        Ok(self.check_connectivity().await?)
    }
}

#[async_trait]
impl MetricsStore for MetricsRepository {
    async fn append(&self, record: &MetricRecord) -> PipelineResult<()> {
        MetricsRepository::append(self, record).await?;
        Ok(())
    }

    async fn query(&self, zone: &ZoneId, range: &TimeRange) -> PipelineResult<Vec<MetricRecord>> {
        Ok(self.query_zone(zone, range).await?)
    }

    async fn health_check(&self) -> PipelineResult<()> {
        Ok(self.check_connectivity().await?)
    }
}

#[async_trait]
impl AlertSink for AlertRepository {
    async fn append(&self, alert: &AlertRecord) -> PipelineResult<()> {
        AlertRepository::append(self, alert).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_maps_elapsed() {
        let result: PipelineResult<()> = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            PipelineError::DetectionAdapterFailure,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), "detection_adapter_failure");
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok(3) }, PipelineError::persistence)
            .await
            .unwrap();
        assert_eq!(ok, 3);
    }
}
