//! Operator-facing zone summaries.
//!
//! Recent metric records are aggregated into [`ZoneStats`]; when a Gemini
//! key is configured the stats are handed to `generateContent` for a short
//! natural-language summary.

use std::time::Duration;

use drishti_models::{MetricRecord, ZoneId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Aggregates over a zone's recent metric records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStats {
    pub samples: usize,
    pub latest_count: Option<u32>,
    pub peak_count: Option<u32>,
    pub mean_density: Option<f64>,
    pub mean_flow_speed: Option<f64>,
    pub frames_above_threshold: usize,
    pub alert_threshold: u32,
    pub cameras: usize,
}

impl ZoneStats {
    /// `records` must be in ascending timestamp order.
    pub fn from_records(records: &[MetricRecord], alert_threshold: u32) -> Self {
        let samples = records.len();
        let mean = |f: fn(&MetricRecord) -> f64| {
            (samples > 0).then(|| records.iter().map(f).sum::<f64>() / samples as f64)
        };

        let mut cameras: Vec<&str> = records.iter().map(|r| r.camera_id.as_str()).collect();
        cameras.sort_unstable();
        cameras.dedup();

        Self {
            samples,
            latest_count: records.last().map(|r| r.person_count),
            peak_count: records.iter().map(|r| r.person_count).max(),
            mean_density: mean(|r| r.density),
            mean_flow_speed: mean(|r| r.flow_speed),
            frames_above_threshold: records
                .iter()
                .filter(|r| r.person_count >= alert_threshold)
                .count(),
            alert_threshold,
            cameras: cameras.len(),
        }
    }
}

/// Gemini connection settings.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl SummaryConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
        }
    }

    /// `None` when `GEMINI_API_KEY` is unset or empty.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            // Accept both "gemini-x" and "models/gemini-x"
            config.model = model.trim_start_matches("models/").to_string();
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.timeout = Duration::from_secs(
            std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),
        );
        Some(config)
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini `generateContent` client for zone summaries.
pub struct SummaryClient {
    config: SummaryConfig,
    client: Client,
}

impl SummaryClient {
    pub fn new(config: SummaryConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Ask the model for a short summary of `stats`.
    pub async fn summarize(&self, zone: &ZoneId, stats: &ZoneStats) -> ApiResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.config.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(zone, stats),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::unavailable(format!("Gemini request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!(model = %self.config.model, status = %status, "Gemini returned an error");
            return Err(ApiError::unavailable(format!(
                "Gemini returned {}: {}",
                status,
                truncate(&error_text, 200)
            )));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to parse Gemini response: {}", e)))?;

        let text = body
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::internal("No content in Gemini response"))?;

        info!(zone_id = %zone, model = %self.config.model, "Generated zone summary");
        Ok(text)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Prompt for a zone summary.
pub fn build_prompt(zone: &ZoneId, stats: &ZoneStats) -> String {
    let stats_json = serde_json::to_string_pretty(stats).unwrap_or_default();
    format!(
        "You are a crowd-safety assistant for event operators.\n\
         Write a short, clear status summary (at most three sentences) for zone \"{}\" \
         based on these metrics from the last hour. Mention whether crowding is rising \
         and whether any frames crossed the alert threshold.\n\n{}",
        zone, stats_json
    )
}
