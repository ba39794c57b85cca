//! Recent zone metrics and summaries.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use drishti_models::{MetricRecord, TimeRange, ZoneId};
use drishti_pipeline::adapters::with_timeout;
use drishti_pipeline::PipelineError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_summary;
use crate::services::ZoneStats;
use crate::state::AppState;

const DEFAULT_WINDOW_MINUTES: u32 = 60;

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ZoneMetricsResponse {
    pub zone_id: ZoneId,
    pub minutes: u32,
    pub count: usize,
    pub records: Vec<MetricRecord>,
}

#[derive(Debug, Serialize)]
pub struct ZoneSummaryResponse {
    pub zone: ZoneId,
    pub minutes: u32,
    pub stats: ZoneStats,
    pub summary: Option<String>,
}

fn window_minutes(state: &AppState, requested: Option<u32>) -> ApiResult<u32> {
    let max = state.config.max_metrics_window_minutes;
    match requested.unwrap_or(DEFAULT_WINDOW_MINUTES.min(max)) {
        m if m >= 1 && m <= max => Ok(m),
        m => Err(ApiError::bad_request(format!(
            "minutes must be between 1 and {}, got {}",
            max, m
        ))),
    }
}

async fn recent_records(state: &AppState, zone_id: &ZoneId, minutes: u32) -> ApiResult<Vec<MetricRecord>> {
    let range = TimeRange::trailing(Utc::now(), chrono::Duration::minutes(i64::from(minutes)));
    let records = with_timeout(
        state.pipeline_config().persistence_timeout,
        state.metrics_store.query(zone_id, &range),
        PipelineError::PersistenceUnavailable,
    )
    .await?;
    Ok(records)
}

/// `GET /api/zones/:zone_id/metrics`
pub async fn zone_metrics(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<ZoneMetricsResponse>> {
    let zone_id = ZoneId::parse(zone_id)?;
    let minutes = window_minutes(&state, query.minutes)?;
    let records = recent_records(&state, &zone_id, minutes).await?;

    Ok(Json(ZoneMetricsResponse {
        zone_id,
        minutes,
        count: records.len(),
        records,
    }))
}

/// `GET /api/zones/:zone_id/summary`
///
/// The summary is `null` when no model is configured, the window is empty,
/// or the model call fails; the stats are always returned.
pub async fn zone_summary(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Json<ZoneSummaryResponse>> {
    let zone_id = ZoneId::parse(zone_id)?;
    let minutes = window_minutes(&state, query.minutes)?;
    let records = recent_records(&state, &zone_id, minutes).await?;
    let stats = ZoneStats::from_records(&records, state.pipeline_config().alert_threshold);

    let summary = match &state.summarizer {
        Some(client) if stats.samples > 0 => match client.summarize(&zone_id, &stats).await {
            Ok(text) => {
                record_summary("generated");
                Some(text)
            }
            Err(e) => {
                warn!(zone_id = %zone_id, error = %e, "Zone summary generation failed");
                record_summary("failed");
                None
            }
        },
        _ => {
            record_summary("stats_only");
            None
        }
    };

    Ok(Json(ZoneSummaryResponse {
        zone: zone_id,
        minutes,
        stats,
        summary,
    }))
}
