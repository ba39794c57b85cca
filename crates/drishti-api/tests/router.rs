//! Router tests against in-memory collaborators.

use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use drishti_api::{create_router, ApiConfig, AppState, Collaborators, SummaryClient, SummaryConfig};
use drishti_models::{CameraId, MetricRecord, ZoneId};
use drishti_pipeline::memory::{MemoryAlertSink, MemoryFrameStore, MemoryMetricsStore, ScriptedDetector};
use drishti_pipeline::{MetricsStore, PipelineConfig};

const BOUNDARY: &str = "drishti-test-boundary";

struct TestApp {
    router: Router,
    metrics: Arc<MemoryMetricsStore>,
    alerts: Arc<MemoryAlertSink>,
}

fn app_with(detector: ScriptedDetector, config: ApiConfig, summarizer: Option<SummaryClient>) -> TestApp {
    let metrics = Arc::new(MemoryMetricsStore::new());
    let alerts = Arc::new(MemoryAlertSink::new());
    let collaborators = Collaborators {
        frame_store: Arc::new(MemoryFrameStore::new()),
        detector: Arc::new(detector),
        metrics_store: metrics.clone(),
        alert_sink: alerts.clone(),
    };
    let state = AppState::with_collaborators(config, PipelineConfig::default(), collaborators, summarizer);
    TestApp {
        router: create_router(state, None),
        metrics,
        alerts,
    }
}

fn app(detector: ScriptedDetector) -> TestApp {
    app_with(detector, ApiConfig::default(), None)
}

fn png() -> Vec<u8> {
    let img = GrayImage::from_fn(48, 32, |x, y| Luma([if x > 10 && x < 20 && y > 8 { 210 } else { 25 }]));
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn multipart(fields: &[(&str, &str)], file: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some(file) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"frame.png\"\r\nContent-Type: image/png\r\n\r\n",
                BOUNDARY
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn frame_request(fields: &[(&str, &str)], file: Option<&[u8]>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/frames")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(multipart(fields, file)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn history(zone: &str, minutes_ago: i64, count: u32) -> MetricRecord {
    MetricRecord {
        camera_id: CameraId::parse("cam1").unwrap(),
        zone_id: ZoneId::parse(zone).unwrap(),
        person_count: count,
        density: count as f64 / 5.0,
        flow_speed: 0.5,
        frame_locator: format!("memory://frames/cam1/{}", minutes_ago),
        timestamp: Utc::now() - chrono::Duration::minutes(minutes_ago),
        lat: None,
        lon: None,
    }
}

#[tokio::test]
async fn test_health_sets_common_headers() {
    let app = app(ScriptedDetector::new());
    let response = app.router.clone().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("x-request-id"));

    let request = Request::builder()
        .uri("/healthz")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_submit_frame_records_metric() {
    let app = app(ScriptedDetector::with_person_counts([7]));
    let image = png();
    let request = frame_request(
        &[("camera_id", "gate-1"), ("zone_id", "north"), ("lat", "19.07"), ("lon", "72.87")],
        Some(&image),
    );

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["metric"]["person_count"], 7);
    assert_eq!(body["metric"]["camera_id"], "gate-1");
    assert_eq!(body["metric"]["lat"], 19.07);
    assert!(body["alert"].is_null());
    assert_eq!(app.metrics.len().await, 1);
}

#[tokio::test]
async fn test_submit_frame_raises_alert() {
    let app = app(ScriptedDetector::with_person_counts([22]));
    let image = png();
    let request = frame_request(&[("camera_id", "gate-1"), ("zone_id", "north")], Some(&image));

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alert"]["alert"]["level"], "high");
    assert_eq!(
        body["alert"]["alert"]["message"],
        "High crowd density: 22 people detected"
    );
    assert_eq!(body["alert"]["person_count"], 22);
    assert!(body["metric"].get("lat").is_none());
    assert_eq!(app.alerts.alerts().await.len(), 1);
}

#[tokio::test]
async fn test_submit_frame_validates_form() {
    let app = app(ScriptedDetector::new());
    let image = png();

    let (status, body) = send(&app.router, frame_request(&[("camera_id", "c"), ("zone_id", "z")], None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("file"));

    let (status, _) = send(&app.router, frame_request(&[("zone_id", "z")], Some(&image))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        frame_request(&[("camera_id", "c"), ("zone_id", "z"), ("lat", "north")], Some(&image)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        frame_request(&[("camera_id", "c"), ("zone_id", "z"), ("lat", "95")], Some(&image)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = send(
        &app.router,
        frame_request(&[("camera_id", "gate 1"), ("zone_id", "z")], Some(&image)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.metrics.is_empty().await);
}

#[tokio::test]
async fn test_undecodable_frame_is_unprocessable() {
    let app = app(ScriptedDetector::with_person_counts([3]));
    let request = frame_request(&[("camera_id", "c"), ("zone_id", "z")], Some(b"not an image"));

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["ok"], false);
    assert_eq!(body["stage"], "estimated");
    assert_eq!(body["error"]["code"], "invalid_frame");
    assert!(app.metrics.is_empty().await);
}

#[tokio::test]
async fn test_persistence_outage_is_service_unavailable() {
    let app = app(ScriptedDetector::with_person_counts([3]));
    app.metrics.set_failing(true);
    let image = png();

    let (status, body) = send(&app.router, frame_request(&[("camera_id", "c"), ("zone_id", "z")], Some(&image))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["stage"], "recorded");
    assert_eq!(body["error"]["code"], "persistence_unavailable");
}

#[tokio::test]
async fn test_forecast_statuses() {
    let app = app(ScriptedDetector::new());

    let (status, body) = send(&app.router, get("/api/zones/north/forecast")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "insufficient_data");
    assert_eq!(body["zone_id"], "north");
    assert!(body.get("forecast").is_none());

    for i in 0..30 {
        app.metrics.append(&history("north", 30 - i, 10 + i as u32)).await.unwrap();
    }

    let (status, body) = send(&app.router, get("/api/zones/north/forecast?horizon_minutes=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let points = body["forecast"].as_array().unwrap();
    assert_eq!(points.len(), 5);
    for point in points {
        let estimate = point["estimate"].as_f64().unwrap();
        assert!(point["lower"].as_f64().unwrap() <= estimate);
        assert!(point["upper"].as_f64().unwrap() >= estimate);
    }

    let (status, _) = send(&app.router, get("/api/zones/north/forecast?horizon_minutes=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.metrics.set_failing(true);
    let (status, body) = send(&app.router, get("/api/zones/north/forecast")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn test_zone_metrics_window() {
    let app = app(ScriptedDetector::new());
    app.metrics.append(&history("north", 90, 4)).await.unwrap();
    app.metrics.append(&history("north", 20, 5)).await.unwrap();
    app.metrics.append(&history("north", 10, 6)).await.unwrap();
    app.metrics.append(&history("south", 10, 9)).await.unwrap();

    let (status, body) = send(&app.router, get("/api/zones/north/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["minutes"], 60);
    assert_eq!(body["count"], 2);
    assert_eq!(body["records"][0]["person_count"], 5);
    assert_eq!(body["records"][1]["person_count"], 6);

    let (_, body) = send(&app.router, get("/api/zones/north/metrics?minutes=120")).await;
    assert_eq!(body["count"], 3);

    let (status, _) = send(&app.router, get("/api/zones/north/metrics?minutes=100000")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, get("/api/zones/no%20spaces/metrics")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_zone_summary_without_model() {
    let app = app(ScriptedDetector::new());
    app.metrics.append(&history("north", 5, 16)).await.unwrap();
    app.metrics.append(&history("north", 1, 12)).await.unwrap();

    let (status, body) = send(&app.router, get("/api/zones/north/summary")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["zone"], "north");
    assert!(body["summary"].is_null());
    assert_eq!(body["stats"]["samples"], 2);
    assert_eq!(body["stats"]["latest_count"], 12);
    assert_eq!(body["stats"]["peak_count"], 16);
    assert_eq!(body["stats"]["frames_above_threshold"], 1);
}

#[tokio::test]
async fn test_zone_summary_with_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "North is crowded but stable."}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut summary_config = SummaryConfig::new("test-key");
    summary_config.base_url = server.uri();
    let summarizer = SummaryClient::new(summary_config).unwrap();

    let app = app_with(ScriptedDetector::new(), ApiConfig::default(), Some(summarizer));
    app.metrics.append(&history("north", 3, 18)).await.unwrap();

    let (status, body) = send(&app.router, get("/api/zones/north/summary")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "North is crowded but stable.");

    // Empty windows skip the model call entirely
    let (_, body) = send(&app.router, get("/api/zones/south/summary")).await;
    assert!(body["summary"].is_null());
    assert_eq!(body["stats"]["samples"], 0);
}

#[tokio::test]
async fn test_readiness_reflects_metrics_store() {
    let app = app(ScriptedDetector::new());

    let (status, body) = send(&app.router, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    app.metrics.set_failing(true);
    let (status, body) = send(&app.router, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["checks"]["metrics_store"]["status"], "error");
    assert_eq!(body["checks"]["frame_store"]["status"], "ok");
}

#[tokio::test]
async fn test_rate_limit_per_client_ip() {
    let config = ApiConfig {
        rate_limit_rps: 1,
        rate_limit_burst: 1,
        ..ApiConfig::default()
    };
    let app = app_with(ScriptedDetector::new(), config, None);

    let request = || {
        Request::builder()
            .uri("/api/zones/north/metrics")
            .header("x-forwarded-for", "203.0.113.5")
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app.router, request()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app.router, request()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "rate_limited");

    // Health routes are not rate limited
    let (status, _) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}
