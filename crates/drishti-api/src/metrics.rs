//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "drishti_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "drishti_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "drishti_http_requests_in_flight";

    // Ingestion metrics
    pub const FRAME_UPLOAD_BYTES: &str = "drishti_frame_upload_bytes";
    pub const SUMMARIES_TOTAL: &str = "drishti_zone_summaries_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "drishti_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record the size of an accepted frame payload.
pub fn record_frame_upload(bytes: usize) {
    histogram!(names::FRAME_UPLOAD_BYTES).record(bytes as f64);
}

/// Record a zone summary request by outcome (`generated`, `stats_only`, `failed`).
pub fn record_summary(outcome: &'static str) {
    counter!(names::SUMMARIES_TOTAL, "outcome" => outcome).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

fn zone_segment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/zones/[A-Za-z0-9_.-]+").expect("static pattern"))
}

/// Collapse identifiers in paths so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    zone_segment().replace_all(path, "/zones/:zone_id").into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/zones/north-plaza/forecast"),
            "/api/zones/:zone_id/forecast"
        );
        assert_eq!(sanitize_path("/api/frames"), "/api/frames");
    }
}
