//! In-memory collaborators for tests and local runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use drishti_models::{
    AlertRecord, BoundingBox, CameraId, Detection, MetricRecord, TimeRange, ZoneId,
};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::adapters::{AlertSink, DetectionInput, Detector, FrameStore, MetricsStore};
use crate::error::{PipelineError, PipelineResult};

/// Frame store that keeps payload sizes and hands out `memory://` locators.
#[derive(Debug, Default)]
pub struct MemoryFrameStore {
    uploads: Mutex<Vec<(CameraId, String, usize)>>,
    failing: AtomicBool,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// `(camera, locator, bytes)` per upload, in order.
    pub async fn uploads(&self) -> Vec<(CameraId, String, usize)> {
        self.uploads.lock().await.clone()
    }
}

#[async_trait]
impl FrameStore for MemoryFrameStore {
    async fn upload(&self, image: &[u8], camera: &CameraId) -> PipelineResult<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PipelineError::storage("memory frame store set to fail"));
        }
        let locator = format!("memory://frames/{}/{}", camera, Uuid::new_v4().simple());
        self.uploads
            .lock()
            .await
            .push((camera.clone(), locator.clone(), image.len()));
        Ok(locator)
    }

    async fn health_check(&self) -> PipelineResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PipelineError::storage("memory frame store set to fail"));
        }
        Ok(())
    }
}

/// Detector that replays scripted results, then falls back to no detections.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: Mutex<VecDeque<PipelineResult<Vec<Detection>>>>,
    delay: Option<Duration>,
    calls: AtomicU64,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay `counts` as that many confident person detections, one entry per call.
    pub fn with_person_counts(counts: impl IntoIterator<Item = u32>) -> Self {
        let script = counts
            .into_iter()
            .map(|n| Ok(Self::persons(n, 0.9)))
            .collect();
        Self {
            script: Mutex::new(script),
            ..Self::default()
        }
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn push(&self, result: PipelineResult<Vec<Detection>>) {
        self.script.lock().await.push_back(result);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// `n` person detections with the given confidence.
    pub fn persons(n: u32, confidence: f32) -> Vec<Detection> {
        (0..n)
            .map(|i| {
                let x = (i % 10) as f32 * 0.1;
                Detection::new("person", confidence, BoundingBox::new(x, 0.2, x + 0.05, 0.4))
            })
            .collect()
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(&self, _input: &DetectionInput<'_>) -> PipelineResult<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Metrics store backed by a vector, in append order.
#[derive(Debug, Default)]
pub struct MemoryMetricsStore {
    records: RwLock<Vec<MetricRecord>>,
    failing: AtomicBool,
}

impl MemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn records(&self) -> Vec<MetricRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MetricsStore for MemoryMetricsStore {
    async fn append(&self, record: &MetricRecord) -> PipelineResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PipelineError::persistence("memory metrics store set to fail"));
        }
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn query(&self, zone: &ZoneId, range: &TimeRange) -> PipelineResult<Vec<MetricRecord>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PipelineError::persistence("memory metrics store set to fail"));
        }
        let mut matched: Vec<MetricRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| &r.zone_id == zone && range.contains(r.timestamp))
            .cloned()
            .collect();
        // Stable: equal timestamps keep append order
        matched.sort_by_key(|r| r.timestamp);
        Ok(matched)
    }

    async fn health_check(&self) -> PipelineResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PipelineError::persistence("memory metrics store set to fail"));
        }
        Ok(())
    }
}

/// Alert sink backed by a vector.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: RwLock<Vec<AlertRecord>>,
    failing: AtomicBool,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.read().await.clone()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn append(&self, alert: &AlertRecord) -> PipelineResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PipelineError::persistence("memory alert sink set to fail"));
        }
        self.alerts.write().await.push(alert.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use tokio_test::{assert_err, assert_ok};

    fn record(zone: &str, minute: i64) -> MetricRecord {
        MetricRecord {
            camera_id: CameraId::parse("cam1").unwrap(),
            zone_id: ZoneId::parse(zone).unwrap(),
            person_count: minute as u32,
            density: 0.0,
            flow_speed: 0.0,
            frame_locator: format!("memory://frames/cam1/{minute}"),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + ChronoDuration::minutes(minute),
            lat: None,
            lon: None,
        }
    }

    #[tokio::test]
    async fn test_query_filters_zone_and_range_in_order() {
        let store = MemoryMetricsStore::new();
        for (zone, minute) in [("z1", 5), ("z2", 1), ("z1", 1), ("z1", 9)] {
            assert_ok!(store.append(&record(zone, minute)).await);
        }

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let range = TimeRange::between(start, start + ChronoDuration::minutes(9));
        let got = assert_ok!(store.query(&ZoneId::parse("z1").unwrap(), &range).await);

        let minutes: Vec<u32> = got.iter().map(|r| r.person_count).collect();
        assert_eq!(minutes, vec![1, 5]);
    }

    #[tokio::test]
    async fn test_scripted_detector_replays_then_empties() {
        let detector = ScriptedDetector::with_person_counts([2, 0]);
        let input = DetectionInput {
            locator: "memory://x",
            image: &[],
        };
        assert_eq!(detector.detect(&input).await.unwrap().len(), 2);
        assert!(detector.detect(&input).await.unwrap().is_empty());
        assert!(detector.detect(&input).await.unwrap().is_empty());
        assert_eq!(detector.calls(), 3);
    }

    #[tokio::test]
    async fn test_frame_store_locators_are_unique() {
        let store = MemoryFrameStore::new();
        let cam = CameraId::parse("cam1").unwrap();
        let a = store.upload(b"a", &cam).await.unwrap();
        let b = store.upload(b"a", &cam).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.uploads().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_store_reports_persistence_unavailable() {
        let store = MemoryMetricsStore::new();
        store.set_failing(true);
        let err = assert_err!(store.append(&record("z1", 1)).await);
        assert_eq!(err.kind(), "persistence_unavailable");
        assert_err!(store.health_check().await);
    }
}
