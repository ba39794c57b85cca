//! Bucket client implementation.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Configuration for the frame bucket.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region ("auto" for R2-style providers)
    pub region: String,
    /// URI scheme for frame locators; "gs" when the bucket is GCS interop
    pub locator_scheme: String,
}

impl BucketConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("FRAME_BUCKET_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("FRAME_BUCKET_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("FRAME_BUCKET_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("FRAME_BUCKET_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("FRAME_BUCKET_SECRET_ACCESS_KEY").map_err(|_| {
                StorageError::config_error("FRAME_BUCKET_SECRET_ACCESS_KEY not set")
            })?,
            bucket_name: std::env::var("FRAME_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("FRAME_BUCKET_NAME not set"))?,
            region: std::env::var("FRAME_BUCKET_REGION").unwrap_or_else(|_| "auto".to_string()),
            locator_scheme: std::env::var("FRAME_BUCKET_LOCATOR_SCHEME")
                .unwrap_or_else(|_| "s3".to_string()),
        })
    }
}

/// S3-compatible bucket client for raw frames.
#[derive(Clone)]
pub struct BucketClient {
    client: Client,
    bucket: String,
    scheme: String,
}

impl BucketClient {
    /// Create a new client from configuration.
    pub fn new(config: BucketConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "frame-bucket",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            scheme: config.locator_scheme,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(BucketConfig::from_env()?))
    }

    /// Bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Locator for a key in this bucket.
    pub fn locator(&self, key: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket, key)
    }

    /// Upload bytes.
    pub async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}", data.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(())
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("Bucket connectivity check failed: {}", e)))?;
        Ok(())
    }
}
