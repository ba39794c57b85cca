//! Pipeline error taxonomy.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Invalid frame dimensions {width}x{height}")]
    InvalidFrameDimensions { width: u32, height: u32 },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Frame upload failed: {0}")]
    StorageUploadFailure(String),

    #[error("Detection failed: {0}")]
    DetectionAdapterFailure(String),

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Insufficient data for forecast: {found} records, need at least {required}")]
    ForecastInsufficientData { found: usize, required: usize },

    #[error("Forecast unavailable: {0}")]
    ForecastUnavailable(String),

    #[error("Frame abandoned before commit")]
    Cancelled,

    #[error("Camera dispatcher is shut down")]
    DispatcherClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUploadFailure(msg.into())
    }

    pub fn detection(msg: impl Into<String>) -> Self {
        Self::DetectionAdapterFailure(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::PersistenceUnavailable(msg.into())
    }

    pub fn forecast_unavailable(msg: impl Into<String>) -> Self {
        Self::ForecastUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidFrameDimensions { .. } => "invalid_frame_dimensions",
            PipelineError::InvalidFrame(_) => "invalid_frame",
            PipelineError::StorageUploadFailure(_) => "storage_upload_failure",
            PipelineError::DetectionAdapterFailure(_) => "detection_adapter_failure",
            PipelineError::PersistenceUnavailable(_) => "persistence_unavailable",
            PipelineError::ForecastInsufficientData { .. } => "forecast_insufficient_data",
            PipelineError::ForecastUnavailable(_) => "forecast_unavailable",
            PipelineError::Cancelled => "cancelled",
            PipelineError::DispatcherClosed => "dispatcher_closed",
            PipelineError::Internal(_) => "internal",
        }
    }

    /// Collaborator or capacity failures that may clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::StorageUploadFailure(_)
                | PipelineError::DetectionAdapterFailure(_)
                | PipelineError::PersistenceUnavailable(_)
                | PipelineError::DispatcherClosed
        )
    }

    /// Problems with the submitted frame itself; resubmitting will not help.
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidFrameDimensions { .. } | PipelineError::InvalidFrame(_)
        )
    }
}

impl From<drishti_storage::StorageError> for PipelineError {
    fn from(e: drishti_storage::StorageError) -> Self {
        Self::StorageUploadFailure(e.to_string())
    }
}

impl From<drishti_vision::VisionError> for PipelineError {
    fn from(e: drishti_vision::VisionError) -> Self {
        Self::DetectionAdapterFailure(e.to_string())
    }
}

impl From<drishti_firestore::FirestoreError> for PipelineError {
    fn from(e: drishti_firestore::FirestoreError) -> Self {
        Self::PersistenceUnavailable(e.to_string())
    }
}
