//! Resampling of irregular metric records onto a uniform grid.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use drishti_models::MetricRecord;

use crate::error::{PipelineError, PipelineResult};

/// Upper bound on grid length; guards against absurd spans or cadences.
const MAX_BUCKETS: i64 = 100_000;

/// Person counts on a uniform grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledSeries {
    /// Start of the first bucket
    pub start: DateTime<Utc>,
    pub cadence: Duration,
    /// Mean count per bucket, gaps filled by interpolation
    pub values: Vec<f64>,
}

impl ResampledSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Start of bucket `index`; may lie past the end of the series.
    pub fn bucket_start(&self, index: usize) -> DateTime<Utc> {
        let step = chrono::Duration::milliseconds(self.cadence.as_millis() as i64);
        self.start + step * index as i32
    }

    pub fn last_bucket(&self) -> DateTime<Utc> {
        self.bucket_start(self.values.len().saturating_sub(1))
    }
}

/// Average counts per cadence bucket and linearly fill interior gaps.
///
/// Buckets are aligned to multiples of the cadence since the Unix epoch.
/// The series spans the first through the last occupied bucket, so no value
/// is ever extrapolated.
pub fn resample(records: &[MetricRecord], cadence: Duration) -> PipelineResult<ResampledSeries> {
    let cadence_ms = cadence.as_millis() as i64;
    if cadence_ms <= 0 {
        return Err(PipelineError::forecast_unavailable("cadence must be positive"));
    }

    let mut buckets: BTreeMap<i64, (f64, u32)> = BTreeMap::new();
    for record in records {
        let index = record.timestamp.timestamp_millis().div_euclid(cadence_ms);
        let entry = buckets.entry(index).or_insert((0.0, 0));
        entry.0 += record.person_count as f64;
        entry.1 += 1;
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Err(PipelineError::forecast_unavailable("no records to resample"));
    };

    let span = last - first + 1;
    if span > MAX_BUCKETS {
        return Err(PipelineError::forecast_unavailable(format!(
            "{} buckets exceeds the resampling limit",
            span
        )));
    }

    let mut values: Vec<Option<f64>> = vec![None; span as usize];
    for (index, (sum, count)) in &buckets {
        values[(index - first) as usize] = Some(sum / *count as f64);
    }

    let start = Utc
        .timestamp_millis_opt(first * cadence_ms)
        .single()
        .ok_or_else(|| PipelineError::forecast_unavailable("bucket start out of range"))?;

    Ok(ResampledSeries {
        start,
        cadence,
        values: interpolate(&values),
    })
}

/// Fill `None` runs between known neighbours by straight lines. The first
/// and last entries must be known.
fn interpolate(values: &[Option<f64>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut last_known: Option<(usize, f64)> = None;

    for (i, value) in values.iter().enumerate() {
        if let Some(v) = value {
            if let Some((j, prev)) = last_known {
                let gap = i - j;
                for k in 1..gap {
                    out.push(prev + (v - prev) * k as f64 / gap as f64);
                }
            }
            out.push(*v);
            last_known = Some((i, *v));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use drishti_models::{CameraId, ZoneId};

    fn at(h: u32, m: u32, s: u32, count: u32) -> MetricRecord {
        MetricRecord {
            camera_id: CameraId::parse("cam1").unwrap(),
            zone_id: ZoneId::parse("z1").unwrap(),
            person_count: count,
            density: 0.0,
            flow_speed: 0.0,
            frame_locator: String::new(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap(),
            lat: None,
            lon: None,
        }
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_bucket_mean() {
        let records = vec![at(10, 0, 5, 4), at(10, 0, 50, 6), at(10, 1, 10, 9)];
        let series = resample(&records, MINUTE).unwrap();
        assert_eq!(series.values, vec![5.0, 9.0]);
        assert_eq!(series.start, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_interior_gaps_interpolated() {
        let records = vec![at(10, 0, 0, 2), at(10, 4, 0, 10)];
        let series = resample(&records, MINUTE).unwrap();
        assert_eq!(series.values, vec![2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(
            series.last_bucket(),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 4, 0).unwrap()
        );
    }

    #[test]
    fn test_grid_is_epoch_aligned() {
        let records = vec![at(10, 7, 30, 1), at(10, 12, 0, 1)];
        let series = resample(&records, Duration::from_secs(300)).unwrap();
        assert_eq!(series.start, Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap());
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_empty_and_zero_cadence_rejected() {
        assert!(resample(&[], MINUTE).is_err());
        assert!(resample(&[at(10, 0, 0, 1)], Duration::ZERO).is_err());
    }

    #[test]
    fn test_interpolate_no_gaps() {
        assert_eq!(interpolate(&[Some(1.0), Some(3.0)]), vec![1.0, 3.0]);
        assert_eq!(interpolate(&[Some(1.0), None, Some(3.0)]), vec![1.0, 2.0, 3.0]);
    }
}
