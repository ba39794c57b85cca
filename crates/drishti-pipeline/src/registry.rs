//! Per-camera flow state with idle eviction.
//!
//! The map lock is held only to look up or insert a camera; each camera's
//! baseline frame sits behind its own mutex, so cameras never contend with
//! each other during flow computation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use drishti_models::CameraId;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::flow::GrayFrame;
use crate::metrics::set_tracked_cameras;

/// Most recent decoded frame for one camera.
#[derive(Debug, Default)]
pub struct CameraFlowState {
    pub baseline: Option<GrayFrame>,
}

/// Registry entry: the camera's state plus its last activity time.
#[derive(Debug)]
pub struct CameraSlot {
    state: Arc<Mutex<CameraFlowState>>,
    /// Milliseconds since the registry epoch
    last_seen_ms: AtomicU64,
}

impl CameraSlot {
    pub fn state(&self) -> Arc<Mutex<CameraFlowState>> {
        Arc::clone(&self.state)
    }
}

#[derive(Debug)]
pub struct CameraStateRegistry {
    epoch: Instant,
    slots: RwLock<HashMap<CameraId, Arc<CameraSlot>>>,
}

impl Default for CameraStateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraStateRegistry {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// State for `camera`, created on first use. Marks the camera as active.
    pub async fn slot(&self, camera: &CameraId) -> Arc<CameraSlot> {
        let now = self.now_ms();

        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(camera) {
                slot.last_seen_ms.store(now, Ordering::Relaxed);
                return Arc::clone(slot);
            }
        }

        let mut slots = self.slots.write().await;
        // Double-check: another frame may have inserted while we waited
        let slot = slots
            .entry(camera.clone())
            .or_insert_with(|| {
                debug!(camera_id = %camera, "Tracking new camera");
                Arc::new(CameraSlot {
                    state: Arc::new(Mutex::new(CameraFlowState::default())),
                    last_seen_ms: AtomicU64::new(now),
                })
            })
            .clone();
        slot.last_seen_ms.store(now, Ordering::Relaxed);
        set_tracked_cameras(slots.len());
        slot
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    pub async fn contains(&self, camera: &CameraId) -> bool {
        self.slots.read().await.contains_key(camera)
    }

    /// Drop cameras idle for at least `ttl`. Cameras with a frame in flight
    /// are kept regardless. Returns the number evicted.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let now = self.now_ms();
        let ttl_ms = ttl.as_millis() as u64;

        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| {
            let idle = now.saturating_sub(slot.last_seen_ms.load(Ordering::Relaxed));
            let in_use = Arc::strong_count(slot) > 1 || Arc::strong_count(&slot.state) > 1;
            in_use || idle < ttl_ms
        });
        let evicted = before - slots.len();
        set_tracked_cameras(slots.len());

        if evicted > 0 {
            info!(evicted, remaining = slots.len(), "Evicted idle camera state");
        }
        evicted
    }

    /// Run `evict_idle` every `ttl / 4` until `shutdown` flips to true.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        ttl: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let period = (ttl / 4).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        registry.evict_idle(ttl).await;
                    }
                }
            }
            debug!("Camera state sweeper stopped");
        })
    }
}
