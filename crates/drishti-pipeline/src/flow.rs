//! Inter-frame motion ("flow speed") per camera.
//!
//! Frames are decoded to grayscale, optionally downscaled, and compared with
//! the camera's previous frame using Horn–Schunck dense optical flow. The
//! mean per-pixel displacement magnitude, in source pixels, is the flow
//! speed. The first frame of a camera, and any frame whose size differs from
//! the stored one, yields 0.0 and becomes the new baseline.

use std::sync::Arc;

use drishti_models::CameraId;
use image::imageops::FilterType;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::registry::CameraStateRegistry;

/// Decoded grayscale frame prepared for flow computation.
#[derive(Debug, Clone)]
pub struct GrayFrame {
    /// Decoded image size
    pub source_width: u32,
    pub source_height: u32,
    /// Size of `pixels` after downscaling
    width: usize,
    height: usize,
    /// Source pixels per working pixel
    scale: f64,
    pixels: Vec<f32>,
}

impl GrayFrame {
    /// Decode `bytes`, shrinking so the longest side is at most `max_dimension`.
    pub fn decode(bytes: &[u8], max_dimension: u32) -> PipelineResult<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| PipelineError::invalid_frame(format!("cannot decode image: {}", e)))?;

        let (source_width, source_height) = (img.width(), img.height());
        if source_width == 0 || source_height == 0 {
            return Err(PipelineError::InvalidFrameDimensions {
                width: source_width,
                height: source_height,
            });
        }

        let mut gray = img.to_luma8();
        let longest = source_width.max(source_height);
        let mut scale = 1.0;
        if longest > max_dimension {
            let factor = max_dimension as f64 / longest as f64;
            let w = ((source_width as f64 * factor).round() as u32).max(1);
            let h = ((source_height as f64 * factor).round() as u32).max(1);
            gray = image::imageops::resize(&gray, w, h, FilterType::Triangle);
            scale = source_width as f64 / w as f64;
        }

        Ok(Self {
            source_width,
            source_height,
            width: gray.width() as usize,
            height: gray.height() as usize,
            scale,
            pixels: gray.pixels().map(|p| p.0[0] as f32).collect(),
        })
    }

    pub fn same_source_size(&self, other: &GrayFrame) -> bool {
        self.source_width == other.source_width && self.source_height == other.source_height
    }
}

/// Horn–Schunck parameters.
#[derive(Debug, Clone, Copy)]
pub struct FlowParams {
    pub max_dimension: u32,
    pub iterations: usize,
    /// Smoothness weight (alpha)
    pub smoothness: f32,
}

/// Result of measuring one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowMeasurement {
    pub flow_speed: f64,
    pub width: u32,
    pub height: u32,
}

/// Mean flow magnitude between two equally sized frames, in working pixels.
pub fn mean_flow_magnitude(prev: &GrayFrame, curr: &GrayFrame, params: &FlowParams) -> f64 {
    let (w, h) = (curr.width, curr.height);
    let n = w * h;
    if n == 0 || prev.pixels.len() != n {
        return 0.0;
    }

    let at = |img: &[f32], x: isize, y: isize| -> f32 {
        let cx = x.clamp(0, w as isize - 1) as usize;
        let cy = y.clamp(0, h as isize - 1) as usize;
        img[cy * w + cx]
    };

    // Brightness derivatives averaged over the 2x2x2 cube
    let mut ix = vec![0f32; n];
    let mut iy = vec![0f32; n];
    let mut it = vec![0f32; n];
    let (p, c) = (&prev.pixels[..], &curr.pixels[..]);
    for y in 0..h as isize {
        for x in 0..w as isize {
            let i = y as usize * w + x as usize;
            ix[i] = 0.25
                * ((at(p, x + 1, y) - at(p, x, y))
                    + (at(p, x + 1, y + 1) - at(p, x, y + 1))
                    + (at(c, x + 1, y) - at(c, x, y))
                    + (at(c, x + 1, y + 1) - at(c, x, y + 1)));
            iy[i] = 0.25
                * ((at(p, x, y + 1) - at(p, x, y))
                    + (at(p, x + 1, y + 1) - at(p, x + 1, y))
                    + (at(c, x, y + 1) - at(c, x, y))
                    + (at(c, x + 1, y + 1) - at(c, x + 1, y)));
            it[i] = 0.25
                * ((at(c, x, y) - at(p, x, y))
                    + (at(c, x + 1, y) - at(p, x + 1, y))
                    + (at(c, x, y + 1) - at(p, x, y + 1))
                    + (at(c, x + 1, y + 1) - at(p, x + 1, y + 1)));
        }
    }

    // Identical frames have no temporal gradient and therefore no flow
    if it.iter().all(|v| *v == 0.0) {
        return 0.0;
    }

    let alpha2 = params.smoothness * params.smoothness;
    let mut u = vec![0f32; n];
    let mut v = vec![0f32; n];
    let mut next_u = vec![0f32; n];
    let mut next_v = vec![0f32; n];

    for _ in 0..params.iterations {
        for y in 0..h as isize {
            for x in 0..w as isize {
                let i = y as usize * w + x as usize;
                let u_bar = neighbourhood_mean(&u, w, h, x, y);
                let v_bar = neighbourhood_mean(&v, w, h, x, y);
                let denom = alpha2 + ix[i] * ix[i] + iy[i] * iy[i];
                let t = if denom > 0.0 {
                    (ix[i] * u_bar + iy[i] * v_bar + it[i]) / denom
                } else {
                    0.0
                };
                next_u[i] = u_bar - ix[i] * t;
                next_v[i] = v_bar - iy[i] * t;
            }
        }
        std::mem::swap(&mut u, &mut next_u);
        std::mem::swap(&mut v, &mut next_v);
    }

    let total: f64 = u
        .iter()
        .zip(&v)
        .map(|(du, dv)| ((du * du + dv * dv) as f64).sqrt())
        .sum();
    total / n as f64
}

/// Weighted 8-neighbour mean (1/6 edges, 1/12 corners) with clamped borders.
fn neighbourhood_mean(field: &[f32], w: usize, h: usize, x: isize, y: isize) -> f32 {
    let at = |dx: isize, dy: isize| -> f32 {
        let cx = (x + dx).clamp(0, w as isize - 1) as usize;
        let cy = (y + dy).clamp(0, h as isize - 1) as usize;
        field[cy * w + cx]
    };
    (at(-1, 0) + at(1, 0) + at(0, -1) + at(0, 1)) / 6.0
        + (at(-1, -1) + at(1, -1) + at(-1, 1) + at(1, 1)) / 12.0
}

/// A flow task that panicked or was cancelled says nothing about the frame.
fn join_failure(e: tokio::task::JoinError) -> PipelineError {
    PipelineError::internal(format!("flow task failed: {}", e))
}

/// Flow estimator bound to a camera state registry.
#[derive(Debug, Clone)]
pub struct FlowEstimator {
    registry: Arc<CameraStateRegistry>,
    params: FlowParams,
}

impl FlowEstimator {
    pub fn new(registry: Arc<CameraStateRegistry>, params: FlowParams) -> Self {
        Self { registry, params }
    }

    pub fn registry(&self) -> &Arc<CameraStateRegistry> {
        &self.registry
    }

    /// Measure motion for `camera` and replace its baseline with this frame.
    ///
    /// Decoding and flow run on the blocking pool while holding only this
    /// camera's lock.
    pub async fn measure(&self, camera: &CameraId, image: Arc<Vec<u8>>) -> PipelineResult<FlowMeasurement> {
        let slot = self.registry.slot(camera).await;
        let mut state = slot.state().lock_owned().await;
        let params = self.params;

        let measurement = tokio::task::spawn_blocking(move || {
            let current = GrayFrame::decode(&image, params.max_dimension)?;

            let flow_speed = match state.baseline.as_ref() {
                Some(prev) if prev.same_source_size(&current) => {
                    mean_flow_magnitude(prev, &current, &params) * current.scale
                }
                _ => 0.0,
            };

            let measurement = FlowMeasurement {
                flow_speed,
                width: current.source_width,
                height: current.source_height,
            };
            state.baseline = Some(current);
            Ok::<_, PipelineError>(measurement)
        })
        .await
        .map_err(join_failure)??;

        debug!(
            camera_id = %camera,
            flow_speed = measurement.flow_speed,
            width = measurement.width,
            height = measurement.height,
            "Measured flow"
        );
        Ok(measurement)
    }
}
