//! Person count and density from detections.

use drishti_models::Detection;

use crate::error::{PipelineError, PipelineResult};

/// Pixels per density unit: density is persons per 10,000 px².
const AREA_UNIT: f64 = 10_000.0;

/// Guards the division on pathological frames.
const AREA_EPSILON: f64 = 1e-6;

/// Count and density for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityEstimate {
    pub person_count: u32,
    pub density: f64,
}

/// Count person detections at or above `cutoff`.
pub fn count_persons(detections: &[Detection], cutoff: f32) -> u32 {
    detections
        .iter()
        .filter(|d| d.is_person() && d.confidence >= cutoff)
        .count() as u32
}

/// Estimate count and density for a `width` x `height` frame.
pub fn estimate(
    detections: &[Detection],
    width: u32,
    height: u32,
    cutoff: f32,
) -> PipelineResult<DensityEstimate> {
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidFrameDimensions { width, height });
    }

    let person_count = count_persons(detections, cutoff);
    let area = (width as f64 * height as f64) / AREA_UNIT + AREA_EPSILON;

    Ok(DensityEstimate {
        person_count,
        density: person_count as f64 / area,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use drishti_models::BoundingBox;

    fn det(label: &str, confidence: f32) -> Detection {
        Detection::new(label, confidence, BoundingBox::new(0.0, 0.0, 0.1, 0.1))
    }

    #[test]
    fn test_density_formula() {
        let detections = vec![det("person", 0.9); 5];
        let est = estimate(&detections, 100, 100, 0.3).unwrap();
        assert_eq!(est.person_count, 5);
        // 100x100 is exactly one area unit
        assert!((est.density - 5.0 / (1.0 + 1e-6)).abs() < 1e-9);
    }

    #[test]
    fn test_non_person_never_counts() {
        let mut detections = vec![det("person", 0.9), det("Person", 0.5)];
        let before = count_persons(&detections, 0.3);
        detections.push(det("car", 0.99));
        detections.push(det("dog", 0.8));
        assert_eq!(count_persons(&detections, 0.3), before);
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let mut detections = vec![det("person", 0.3)];
        assert_eq!(count_persons(&detections, 0.3), 1);
        detections.push(det("person", 0.299));
        assert_eq!(count_persons(&detections, 0.3), 1);
    }

    #[test]
    fn test_monotonic_in_count_and_area() {
        let three = vec![det("person", 0.9); 3];
        let four = vec![det("person", 0.9); 4];

        let small = estimate(&three, 640, 480, 0.3).unwrap();
        let more = estimate(&four, 640, 480, 0.3).unwrap();
        let larger = estimate(&three, 1280, 720, 0.3).unwrap();

        assert!(more.density >= small.density);
        assert!(larger.density <= small.density);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let err = estimate(&[], 0, 480, 0.3).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidFrameDimensions {
                width: 0,
                height: 480
            }
        ));
        assert!(estimate(&[], 640, 0, 0.3).is_err());
    }

    #[test]
    fn test_empty_frame_has_zero_density() {
        let est = estimate(&[], 640, 480, 0.3).unwrap();
        assert_eq!(est.person_count, 0);
        assert_eq!(est.density, 0.0);
    }
}
