//! HTTP client for the detection endpoint.

use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use drishti_models::Detection;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::Client;
use tracing::{debug, info_span, Instrument};

use crate::config::{InputMode, VisionConfig};
use crate::error::{VisionError, VisionResult};
use crate::response::{Instance, Parameters, PredictRequest, PredictResponse};

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

#[derive(Clone)]
enum Credentials {
    Static(String),
    ServiceAccount(Arc<dyn TokenProvider>),
    Anonymous,
}

/// Client for an object-detection `:predict` endpoint.
#[derive(Clone)]
pub struct VisionClient {
    http: Client,
    config: VisionConfig,
    credentials: Credentials,
}

impl VisionClient {
    /// Create a client. Without a static token, the service account from
    /// `GOOGLE_APPLICATION_CREDENTIALS` is used if present.
    pub fn new(config: VisionConfig) -> VisionResult<Self> {
        let credentials = match &config.access_token {
            Some(token) => Credentials::Static(token.clone()),
            None => match CustomServiceAccount::from_env() {
                Ok(Some(sa)) => Credentials::ServiceAccount(Arc::new(sa)),
                Ok(None) => Credentials::Anonymous,
                Err(e) => {
                    return Err(VisionError::Auth(format!(
                        "Failed to load service account: {}",
                        e
                    )))
                }
            },
        };

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("drishti-vision/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> VisionResult<Self> {
        Self::new(VisionConfig::from_env()?)
    }

    pub fn input_mode(&self) -> InputMode {
        self.config.input_mode
    }

    /// Detect objects in a frame. `locator` and `image` describe the same
    /// frame; the configured input mode picks which one is sent.
    pub async fn detect(&self, locator: &str, image: &[u8]) -> VisionResult<Vec<Detection>> {
        let instance = match self.config.input_mode {
            InputMode::Locator => Instance::Locator {
                gcs_image_uri: locator.to_string(),
            },
            InputMode::Inline => Instance::Inline {
                content: BASE64.encode(image),
            },
        };

        let span = info_span!("vision_predict", mode = ?self.config.input_mode, bytes = image.len());
        self.predict(instance).instrument(span).await
    }

    async fn predict(&self, instance: Instance) -> VisionResult<Vec<Detection>> {
        let request = PredictRequest {
            instances: vec![instance],
            parameters: self
                .config
                .max_predictions
                .map(|max_predictions| Parameters { max_predictions }),
        };

        let mut builder = self.http.post(&self.config.endpoint_url).json(&request);
        if let Some(token) = self.bearer_token().await? {
            builder = builder.bearer_auth(token);
        }

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| VisionError::invalid_response(e.to_string()))?;
        let detections = parsed.into_detections()?;

        debug!(
            detections = detections.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Detection completed"
        );
        Ok(detections)
    }

    async fn bearer_token(&self) -> VisionResult<Option<String>> {
        match &self.credentials {
            Credentials::Static(token) => Ok(Some(token.clone())),
            Credentials::ServiceAccount(provider) => provider
                .token(&[CLOUD_PLATFORM_SCOPE])
                .await
                .map(|t| Some(t.as_str().to_string()))
                .map_err(|e| VisionError::Auth(e.to_string())),
            Credentials::Anonymous => Ok(None),
        }
    }

    /// Reachability probe; any HTTP answer counts as reachable.
    pub async fn check_connectivity(&self) -> VisionResult<()> {
        self.http.head(&self.config.endpoint_url).send().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, mode: InputMode) -> VisionClient {
        let mut config = VisionConfig::new(format!("{}/v1/endpoints/42:predict", server.uri()));
        config.access_token = Some("test-token".into());
        config.input_mode = mode;
        VisionClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_detect_by_locator() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/endpoints/42:predict"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(json!({"instances": [{"gcsImageUri": "gs://frames/a.jpg"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{
                    "displayNames": ["person", "bicycle"],
                    "confidences": [0.88, 0.71],
                    "bboxes": [[0.1, 0.2, 0.1, 0.2], [0.3, 0.4, 0.3, 0.4]]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let detections = client_for(&server, InputMode::Locator)
            .detect("gs://frames/a.jpg", b"ignored")
            .await
            .unwrap();

        assert_eq!(detections.len(), 2);
        assert!(detections[0].is_person());
        assert!(!detections[1].is_person());
    }

    #[tokio::test]
    async fn test_detect_inline_sends_base64() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({"instances": [{"content": "AAEC"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"predictions": []})))
            .expect(1)
            .mount(&server)
            .await;

        let detections = client_for(&server, InputMode::Inline)
            .detect("gs://frames/a.jpg", &[0u8, 1, 2])
            .await
            .unwrap();
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client_for(&server, InputMode::Locator)
            .detect("gs://frames/a.jpg", b"")
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::Status { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server, InputMode::Locator)
            .detect("gs://frames/a.jpg", b"")
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::InvalidResponse(_)));
    }
}
