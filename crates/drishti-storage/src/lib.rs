//! S3-compatible frame bucket client.
//!
//! This crate provides:
//! - Raw frame upload with collision-free keys
//! - Stable `scheme://bucket/key` locators for stored frames
//! - Connectivity check for readiness probes

pub mod client;
pub mod error;
pub mod frames;

pub use client::{BucketClient, BucketConfig};
pub use error::{StorageError, StorageResult};
pub use frames::{frame_key, sniff_image_type, ImageType, StoredFrame};
