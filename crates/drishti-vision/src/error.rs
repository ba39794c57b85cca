//! Vision client errors.

use thiserror::Error;

pub type VisionResult<T> = Result<T, VisionError>;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Detection endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid detection response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl VisionError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Whether a later attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            VisionError::Network(_) => true,
            VisionError::Status { status, .. } => *status == 429 || *status >= 500,
            VisionError::Config(_) | VisionError::Auth(_) | VisionError::InvalidResponse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let busy = VisionError::Status {
            status: 503,
            body: String::new(),
        };
        let bad = VisionError::Status {
            status: 400,
            body: String::new(),
        };
        assert!(busy.is_transient());
        assert!(!bad.is_transient());
        assert!(!VisionError::invalid_response("x").is_transient());
    }
}
