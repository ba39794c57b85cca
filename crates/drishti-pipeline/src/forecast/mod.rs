//! Short-horizon zone forecasts.
//!
//! Pipeline: fetch the zone's recent records, require a minimum count,
//! resample to the cadence grid, fit the trend model, and project forward
//! one point per cadence step.

mod model;
mod resample;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use drishti_models::{ForecastPoint, TimeRange, ZoneId};
use tracing::{debug, info};

use crate::adapters::{with_timeout, MetricsStore, TrendModel};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::record_forecast;

pub use model::LinearTrend;
pub use resample::{resample, ResampledSeries};

/// Forecast defaults.
#[derive(Debug, Clone)]
pub struct ForecastSettings {
    pub lookback: Duration,
    pub horizon: Duration,
    pub cadence: Duration,
    pub min_records: usize,
    pub query_timeout: Duration,
}

impl From<&PipelineConfig> for ForecastSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            lookback: config.forecast_lookback,
            horizon: config.forecast_horizon,
            cadence: config.forecast_cadence,
            min_records: config.forecast_min_records,
            query_timeout: config.persistence_timeout,
        }
    }
}

pub struct ForecastingEngine {
    store: Arc<dyn MetricsStore>,
    model: Arc<dyn TrendModel>,
    settings: ForecastSettings,
}

impl ForecastingEngine {
    pub fn new(
        store: Arc<dyn MetricsStore>,
        model: Arc<dyn TrendModel>,
        settings: ForecastSettings,
    ) -> Self {
        Self {
            store,
            model,
            settings,
        }
    }

    /// Engine with the default linear trend model.
    pub fn from_config(store: Arc<dyn MetricsStore>, config: &PipelineConfig) -> Self {
        Self::new(
            store,
            Arc::new(LinearTrend::new(config.forecast_interval_width)),
            ForecastSettings::from(config),
        )
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    /// Forecast `zone` as of now. `horizon` defaults to the configured one.
    pub async fn forecast(
        &self,
        zone: &ZoneId,
        horizon: Option<Duration>,
    ) -> PipelineResult<Vec<ForecastPoint>> {
        self.forecast_at(zone, horizon, Utc::now()).await
    }

    /// Forecast `zone` as of `now`.
    pub async fn forecast_at(
        &self,
        zone: &ZoneId,
        horizon: Option<Duration>,
        now: DateTime<Utc>,
    ) -> PipelineResult<Vec<ForecastPoint>> {
        let result = self.run(zone, horizon, now).await;
        record_forecast(match &result {
            Ok(_) => "ok",
            Err(PipelineError::ForecastInsufficientData { .. }) => "insufficient_data",
            Err(_) => "unavailable",
        });
        result
    }

    async fn run(
        &self,
        zone: &ZoneId,
        horizon: Option<Duration>,
        now: DateTime<Utc>,
    ) -> PipelineResult<Vec<ForecastPoint>> {
        let horizon = horizon.unwrap_or(self.settings.horizon);
        let cadence = self.settings.cadence;
        if cadence.is_zero() {
            return Err(PipelineError::forecast_unavailable("cadence must be positive"));
        }
        let steps = (horizon.as_secs_f64() / cadence.as_secs_f64()).floor() as usize;
        if steps == 0 {
            return Err(PipelineError::forecast_unavailable(format!(
                "horizon of {}s is shorter than one {}s step",
                horizon.as_secs(),
                cadence.as_secs()
            )));
        }

        let lookback = chrono::Duration::from_std(self.settings.lookback)
            .map_err(|_| PipelineError::forecast_unavailable("lookback out of range"))?;
        let range = TimeRange::trailing(now, lookback);

        let records = with_timeout(
            self.settings.query_timeout,
            self.store.query(zone, &range),
            PipelineError::PersistenceUnavailable,
        )
        .await?;

        if records.len() < self.settings.min_records {
            debug!(zone_id = %zone, found = records.len(), "Not enough history to forecast");
            return Err(PipelineError::ForecastInsufficientData {
                found: records.len(),
                required: self.settings.min_records,
            });
        }

        let series = resample(&records, cadence)?;
        let fitted = self.model.fit(&series)?;

        let step = chrono::Duration::from_std(cadence)
            .map_err(|_| PipelineError::forecast_unavailable("cadence out of range"))?;
        let last = series.last_bucket();
        let points: Vec<ForecastPoint> = (1..=steps)
            .map(|k| {
                let (estimate, lower, upper) = fitted.predict(k);
                ForecastPoint {
                    timestamp: last + step * k as i32,
                    estimate,
                    lower,
                    upper,
                }
            })
            .collect();

        info!(
            zone_id = %zone,
            records = records.len(),
            buckets = series.len(),
            points = points.len(),
            "Forecast generated"
        );
        Ok(points)
    }
}
