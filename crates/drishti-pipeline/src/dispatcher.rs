//! Per-camera frame dispatch.
//!
//! Each camera gets one worker task fed by a bounded queue, so frames from
//! the same camera run one at a time in arrival order while different
//! cameras proceed in parallel. A global semaphore caps the number of
//! frames in flight. Workers are created on first use and retire after
//! sitting idle for the configured TTL.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use drishti_models::{CameraId, Frame};
use tokio::sync::{mpsc, oneshot, watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::metrics::{record_frame_failed, set_active_camera_workers};
use crate::orchestrator::{FrameOutcome, FramePipeline, FrameStage};

struct Job {
    frame: Frame,
    reply: oneshot::Sender<FrameOutcome>,
    _pending: PendingSlot,
}

/// One unit of a worker's `pending` count, released when dropped. Travels
/// with the job, so a send cancelled while the queue is full gives its slot
/// back as well.
struct PendingSlot(Arc<AtomicUsize>);

impl Drop for PendingSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct WorkerHandle {
    generation: u64,
    tx: mpsc::Sender<Job>,
    /// Jobs handed a sender but not yet finished. Incremented only while the
    /// worker map lock is held.
    pending: Arc<AtomicUsize>,
}

struct Shared {
    pipeline: Arc<FramePipeline>,
    workers: Mutex<HashMap<CameraId, WorkerHandle>>,
    permits: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    next_generation: AtomicU64,
    queue_depth: usize,
    idle_ttl: Duration,
}

/// Routes frames to per-camera workers.
#[derive(Clone)]
pub struct CameraDispatcher {
    shared: Arc<Shared>,
}

impl CameraDispatcher {
    /// Must be called from within a Tokio runtime; spawns the camera state
    /// sweeper.
    pub fn new(pipeline: Arc<FramePipeline>) -> Self {
        let config = pipeline.config();
        let max_concurrent = config.max_concurrent_frames.max(1);
        let queue_depth = config.camera_queue_depth.max(1);
        let idle_ttl = config.camera_idle_ttl;

        let (shutdown, shutdown_rx) = watch::channel(false);
        pipeline.registry().spawn_sweeper(idle_ttl, shutdown_rx);

        info!(
            max_concurrent_frames = max_concurrent,
            queue_depth,
            idle_ttl_secs = idle_ttl.as_secs(),
            "Camera dispatcher started"
        );

        Self {
            shared: Arc::new(Shared {
                permits: Arc::new(Semaphore::new(max_concurrent)),
                queue_depth,
                idle_ttl,
                pipeline,
                workers: Mutex::new(HashMap::new()),
                shutdown,
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn pipeline(&self) -> &Arc<FramePipeline> {
        &self.shared.pipeline
    }

    /// Queue a frame behind earlier frames from the same camera and wait for
    /// its outcome.
    ///
    /// Dropping the returned future abandons the frame: if it has not been
    /// committed yet, nothing is persisted.
    pub async fn submit(&self, frame: Frame) -> FrameOutcome {
        if self.is_shut_down() {
            return closed();
        }

        let (tx, slot) = self.sender_for(&frame.camera_id).await;
        let (reply, outcome) = oneshot::channel();

        let job = Job {
            frame,
            reply,
            _pending: slot,
        };
        if tx.send(job).await.is_err() {
            return closed();
        }

        outcome.await.unwrap_or_else(|_| closed())
    }

    /// Number of live camera workers.
    pub async fn active_workers(&self) -> usize {
        self.shared.workers.lock().await.len()
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shared.shutdown.borrow()
    }

    /// Stop accepting frames. Frames already being processed run to their
    /// outcome; queued frames are answered with `DispatcherClosed`.
    pub fn shutdown(&self) {
        if self.shared.shutdown.send_replace(true) {
            return;
        }
        info!("Camera dispatcher shutting down");
    }

    /// Wait until no frame holds a processing permit, up to `limit`.
    pub async fn drain(&self, limit: Duration) -> bool {
        let total = self.shared.pipeline.config().max_concurrent_frames.max(1) as u32;
        match tokio::time::timeout(limit, self.shared.permits.acquire_many(total)).await {
            Ok(Ok(_all)) => true,
            Ok(Err(_)) => true,
            Err(_) => {
                warn!("In-flight frames still running after {}s", limit.as_secs());
                false
            }
        }
    }

    async fn sender_for(&self, camera: &CameraId) -> (mpsc::Sender<Job>, PendingSlot) {
        let mut workers = self.shared.workers.lock().await;

        if let Some(handle) = workers.get(camera) {
            if !handle.tx.is_closed() {
                handle.pending.fetch_add(1, Ordering::SeqCst);
                return (handle.tx.clone(), PendingSlot(Arc::clone(&handle.pending)));
            }
        }

        let (tx, rx) = mpsc::channel(self.shared.queue_depth);
        let pending = Arc::new(AtomicUsize::new(1));
        let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
        workers.insert(
            camera.clone(),
            WorkerHandle {
                generation,
                tx: tx.clone(),
                pending: Arc::clone(&pending),
            },
        );
        set_active_camera_workers(workers.len());
        drop(workers);

        self.spawn_worker(camera.clone(), generation, rx, Arc::clone(&pending));
        debug!(camera_id = %camera, generation, "Camera worker started");
        (tx, PendingSlot(pending))
    }

    fn spawn_worker(
        &self,
        camera: CameraId,
        generation: u64,
        rx: mpsc::Receiver<Job>,
        pending: Arc<AtomicUsize>,
    ) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(run_worker(shared, camera, generation, rx, pending))
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    camera: CameraId,
    generation: u64,
    mut rx: mpsc::Receiver<Job>,
    pending: Arc<AtomicUsize>,
) {
    let mut shutdown = shared.shutdown.subscribe();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let job = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
            _ = tokio::time::sleep(shared.idle_ttl) => {
                let mut workers = shared.workers.lock().await;
                if pending.load(Ordering::SeqCst) == 0 {
                    if workers.get(&camera).is_some_and(|h| h.generation == generation) {
                        workers.remove(&camera);
                    }
                    set_active_camera_workers(workers.len());
                    debug!(camera_id = %camera, generation, "Camera worker retired after idle period");
                    return;
                }
                continue;
            }
        };

        handle_job(&shared, job).await;
    }

    rx.close();
    while let Ok(job) = rx.try_recv() {
        let _ = job.reply.send(closed());
    }

    let mut workers = shared.workers.lock().await;
    if workers.get(&camera).is_some_and(|h| h.generation == generation) {
        workers.remove(&camera);
    }
    set_active_camera_workers(workers.len());
    debug!(camera_id = %camera, generation, "Camera worker stopped");
}

async fn handle_job(shared: &Shared, job: Job) {
    let Job {
        frame,
        reply,
        _pending,
    } = job;

    let _permit = match Arc::clone(&shared.permits).acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            let _ = reply.send(closed());
            return;
        }
    };

    if reply.is_closed() {
        abandoned(&frame.camera_id, FrameStage::Received);
        return;
    }

    let prepared = match shared.pipeline.prepare(frame).await {
        Ok(prepared) => prepared,
        Err(failed) => {
            let _ = reply.send(failed);
            return;
        }
    };

    if reply.is_closed() {
        abandoned(&prepared.metric().camera_id, FrameStage::Estimated);
        return;
    }

    let outcome = shared.pipeline.commit(prepared).await;
    let _ = reply.send(outcome);
}

fn abandoned(camera: &CameraId, stage: FrameStage) {
    let error = PipelineError::Cancelled;
    record_frame_failed(stage.as_str(), error.kind());
    info!(
        camera_id = %camera,
        stage = stage.as_str(),
        error_code = error.kind(),
        "{}",
        error
    );
}

fn closed() -> FrameOutcome {
    FrameOutcome::failed(FrameStage::Received, PipelineError::DispatcherClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::flow::test_images::square_png;
    use crate::memory::{MemoryAlertSink, MemoryFrameStore, MemoryMetricsStore, ScriptedDetector};
    use crate::registry::CameraStateRegistry;
    use drishti_models::ZoneId;

    fn dispatcher(detector: ScriptedDetector, config: PipelineConfig) -> (CameraDispatcher, Arc<MemoryMetricsStore>) {
        let metrics = Arc::new(MemoryMetricsStore::new());
        let pipeline = FramePipeline::new(
            config,
            Arc::new(MemoryFrameStore::new()),
            Arc::new(detector),
            metrics.clone(),
            Arc::new(MemoryAlertSink::new()),
            Arc::new(CameraStateRegistry::new()),
        );
        (CameraDispatcher::new(Arc::new(pipeline)), metrics)
    }

    fn frame(camera: &str, minute: i64) -> Frame {
        let t0 = chrono::DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        Frame::new(
            CameraId::parse(camera).unwrap(),
            ZoneId::parse("z1").unwrap(),
            square_png(32, 24, 0),
        )
        .with_received_at(t0 + chrono::Duration::minutes(minute))
    }

    #[tokio::test]
    async fn test_frames_from_one_camera_commit_in_order() {
        let (dispatcher, metrics) =
            dispatcher(ScriptedDetector::with_person_counts(0..8), PipelineConfig::default());

        let submissions = (0..8).map(|i| {
            let dispatcher = dispatcher.clone();
            async move { dispatcher.submit(frame("cam1", i)).await }
        });
        // Each spawned submission reaches the queue before the next is spawned.
        let mut outcomes = Vec::new();
        for submission in submissions {
            outcomes.push(tokio::spawn(submission));
            tokio::task::yield_now().await;
        }
        for outcome in outcomes {
            assert!(outcome.await.unwrap().is_completed());
        }

        let counts: Vec<u32> = metrics.records().await.iter().map(|r| r.person_count).collect();
        assert_eq!(counts, (0..8).collect::<Vec<_>>());
        assert_eq!(dispatcher.active_workers().await, 1);
    }

    #[tokio::test]
    async fn test_cameras_get_separate_workers() {
        let (dispatcher, metrics) =
            dispatcher(ScriptedDetector::with_person_counts([1, 2]), PipelineConfig::default());

        assert!(dispatcher.submit(frame("cam1", 0)).await.is_completed());
        assert!(dispatcher.submit(frame("cam2", 0)).await.is_completed());
        assert_eq!(dispatcher.active_workers().await, 2);
        assert_eq!(metrics.len().await, 2);
    }

    #[tokio::test]
    async fn test_idle_worker_retires_and_is_recreated() {
        let config = PipelineConfig {
            camera_idle_ttl: Duration::from_millis(50),
            ..PipelineConfig::default()
        };
        let (dispatcher, metrics) = dispatcher(ScriptedDetector::with_person_counts([1, 2]), config);

        assert!(dispatcher.submit(frame("cam1", 0)).await.is_completed());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(dispatcher.active_workers().await, 0);

        assert!(dispatcher.submit(frame("cam1", 1)).await.is_completed());
        assert_eq!(metrics.len().await, 2);
    }

    #[tokio::test]
    async fn test_abandoned_frame_is_not_persisted() {
        let detector = ScriptedDetector::with_person_counts([40]).with_delay(Duration::from_millis(200));
        let (dispatcher, metrics) = dispatcher(detector, PipelineConfig::default());

        let result = tokio::time::timeout(Duration::from_millis(50), dispatcher.submit(frame("cam1", 0))).await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(metrics.is_empty().await);
    }

    #[tokio::test]
    async fn test_worker_retires_after_submit_cancelled_on_full_queue() {
        let config = PipelineConfig {
            camera_queue_depth: 1,
            camera_idle_ttl: Duration::from_millis(100),
            ..PipelineConfig::default()
        };
        let detector = ScriptedDetector::with_person_counts([1, 2, 3]).with_delay(Duration::from_millis(200));
        let (dispatcher, metrics) = dispatcher(detector, config);

        let running = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.submit(frame("cam1", 0)).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let queued = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.submit(frame("cam1", 1)).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The queue holds the second frame, so the third waits in `send`.
        let third = tokio::time::timeout(Duration::from_millis(20), dispatcher.submit(frame("cam1", 2))).await;
        assert!(third.is_err());

        assert!(running.await.unwrap().is_completed());
        assert!(queued.await.unwrap().is_completed());

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(dispatcher.active_workers().await, 0);
        assert_eq!(metrics.len().await, 2);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let (dispatcher, metrics) = dispatcher(ScriptedDetector::new(), PipelineConfig::default());
        dispatcher.shutdown();

        let outcome = dispatcher.submit(frame("cam1", 0)).await;
        assert!(matches!(
            outcome,
            FrameOutcome::Failed {
                stage: FrameStage::Received,
                error: PipelineError::DispatcherClosed
            }
        ));
        assert!(metrics.is_empty().await);
        assert!(dispatcher.drain(Duration::from_secs(1)).await);
    }
}
