//! Frame upload operations.

use chrono::{DateTime, Utc};
use drishti_models::CameraId;
use tracing::info;
use uuid::Uuid;

use crate::client::BucketClient;
use crate::error::StorageResult;

/// Encoded image type, detected from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
    Unknown,
}

impl ImageType {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpg",
            ImageType::Png => "png",
            ImageType::Unknown => "bin",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
            ImageType::Unknown => "application/octet-stream",
        }
    }
}

/// Detect the image type of an encoded payload.
pub fn sniff_image_type(data: &[u8]) -> ImageType {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        ImageType::Jpeg
    } else if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        ImageType::Png
    } else {
        ImageType::Unknown
    }
}

/// Object key for a frame.
///
/// Format: `frames/{camera_id}/{unix_seconds}_{8 hex}.{ext}`. The random
/// suffix keeps concurrent uploads for one camera within the same second
/// from colliding.
pub fn frame_key(camera_id: &CameraId, at: DateTime<Utc>, image_type: ImageType) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "frames/{}/{}_{}.{}",
        camera_id.as_str(),
        at.timestamp(),
        &suffix[..8],
        image_type.extension()
    )
}

/// Result of storing a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFrame {
    pub key: String,
    pub locator: String,
}

impl BucketClient {
    /// Upload a raw frame and return its locator.
    pub async fn upload_frame(
        &self,
        data: Vec<u8>,
        camera_id: &CameraId,
    ) -> StorageResult<StoredFrame> {
        let image_type = sniff_image_type(&data);
        let key = frame_key(camera_id, Utc::now(), image_type);
        let size = data.len();

        self.upload_bytes(data, &key, image_type.content_type()).await?;

        let locator = self.locator(&key);
        info!(camera_id = %camera_id, size, "Stored frame at {}", locator);
        Ok(StoredFrame { key, locator })
    }
}
