//! Frame submission.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drishti_models::{AlertRecord, FrameMetadata, MetricRecord};
use drishti_pipeline::{FrameOutcome, FrameStage};
use serde::Serialize;
use tracing::debug;
use validator::Validate;

use crate::error::{pipeline_status, ApiError, ApiResult};
use crate::metrics::record_frame_upload;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FrameAccepted {
    pub ok: bool,
    pub metric: MetricRecord,
    pub alert: Option<AlertRecord>,
}

#[derive(Debug, Serialize)]
pub struct FrameRejected {
    pub ok: bool,
    pub stage: FrameStage,
    pub error: FrameError,
}

#[derive(Debug, Serialize)]
pub struct FrameError {
    pub code: &'static str,
    pub message: String,
}

/// Multipart fields of a frame upload.
#[derive(Debug, Default)]
struct FrameForm {
    camera_id: Option<String>,
    zone_id: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    file: Option<Vec<u8>>,
}

impl FrameForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = FrameForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(e.body_text()))?;
                    form.file = Some(bytes.to_vec());
                }
                "camera_id" | "zone_id" | "lat" | "lon" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(e.body_text()))?;
                    let text = text.trim();
                    match name.as_str() {
                        "camera_id" => form.camera_id = Some(text.to_string()),
                        "zone_id" => form.zone_id = Some(text.to_string()),
                        "lat" => form.lat = parse_coordinate("lat", text)?,
                        _ => form.lon = parse_coordinate("lon", text)?,
                    }
                }
                other => debug!(field = other, "Ignoring unknown multipart field"),
            }
        }

        Ok(form)
    }
}

fn parse_coordinate(name: &str, text: &str) -> ApiResult<Option<f64>> {
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<f64>()
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("{} must be a number", name)))
}

/// `POST /api/frames`
pub async fn submit_frame(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Response> {
    let form = FrameForm::read(multipart).await?;

    let image = form
        .file
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| ApiError::bad_request("file part is required"))?;
    let metadata = FrameMetadata {
        camera_id: form
            .camera_id
            .ok_or_else(|| ApiError::bad_request("camera_id is required"))?,
        zone_id: form
            .zone_id
            .ok_or_else(|| ApiError::bad_request("zone_id is required"))?,
        lat: form.lat,
        lon: form.lon,
    };
    metadata.validate()?;

    record_frame_upload(image.len());
    let frame = metadata.into_frame(image)?;

    let response = match state.dispatcher.submit(frame).await {
        FrameOutcome::Completed { metric, alert } => (
            StatusCode::OK,
            Json(FrameAccepted {
                ok: true,
                metric,
                alert,
            }),
        )
            .into_response(),
        FrameOutcome::Failed { stage, error } => (
            pipeline_status(&error),
            Json(FrameRejected {
                ok: false,
                stage,
                error: FrameError {
                    code: error.kind(),
                    message: error.to_string(),
                },
            }),
        )
            .into_response(),
    };

    Ok(response)
}
