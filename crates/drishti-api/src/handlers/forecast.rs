//! Zone forecasts.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drishti_models::{ForecastPoint, ZoneId};
use drishti_pipeline::PipelineError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Longest horizon a caller may ask for.
pub const MAX_HORIZON_MINUTES: u32 = 24 * 60;

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub horizon_minutes: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Ok,
    InsufficientData,
    Unavailable,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub zone_id: ZoneId,
    pub status: ForecastStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Vec<ForecastPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ForecastResponse {
    fn without_forecast(zone_id: ZoneId, status: ForecastStatus, message: String) -> Self {
        Self {
            zone_id,
            status,
            forecast: None,
            message: Some(message),
        }
    }
}

/// `GET /api/zones/:zone_id/forecast`
///
/// Too little history and degenerate series are answered with 200 and an
/// explicit status; an unreachable metrics store is a 503.
pub async fn zone_forecast(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Query(query): Query<ForecastQuery>,
) -> ApiResult<Response> {
    let zone_id = ZoneId::parse(zone_id)?;

    let horizon = match query.horizon_minutes {
        None => None,
        Some(m) if (1..=MAX_HORIZON_MINUTES).contains(&m) => {
            Some(Duration::from_secs(u64::from(m) * 60))
        }
        Some(m) => {
            return Err(ApiError::bad_request(format!(
                "horizon_minutes must be between 1 and {}, got {}",
                MAX_HORIZON_MINUTES, m
            )))
        }
    };

    let response = match state.forecaster.forecast(&zone_id, horizon).await {
        Ok(points) => (
            StatusCode::OK,
            Json(ForecastResponse {
                zone_id,
                status: ForecastStatus::Ok,
                forecast: Some(points),
                message: None,
            }),
        ),
        Err(e @ PipelineError::ForecastInsufficientData { .. }) => (
            StatusCode::OK,
            Json(ForecastResponse::without_forecast(
                zone_id,
                ForecastStatus::InsufficientData,
                e.to_string(),
            )),
        ),
        Err(e @ PipelineError::ForecastUnavailable(_)) => (
            StatusCode::OK,
            Json(ForecastResponse::without_forecast(
                zone_id,
                ForecastStatus::Unavailable,
                e.to_string(),
            )),
        ),
        Err(e) => {
            warn!(zone_id = %zone_id, error = %e, "Forecast failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ForecastResponse::without_forecast(
                    zone_id,
                    ForecastStatus::Unavailable,
                    e.to_string(),
                )),
            )
        }
    };

    Ok(response.into_response())
}
