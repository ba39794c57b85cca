//! Camera and zone identifiers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum identifier length accepted from callers.
pub const MAX_ID_LEN: usize = 128;

/// Errors raised when parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} exceeds 128 characters")]
    TooLong(&'static str),

    #[error("{0} contains invalid character {1:?}")]
    InvalidChar(&'static str, char),
}

/// Identifiers end up in object keys and document fields, so only a
/// conservative character set is allowed.
fn validate(kind: &'static str, s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty(kind));
    }
    if s.len() > MAX_ID_LEN {
        return Err(IdError::TooLong(kind));
    }
    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(IdError::InvalidChar(kind, c));
    }
    Ok(())
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse and validate an identifier.
            pub fn parse(s: impl Into<String>) -> Result<Self, IdError> {
                let s = s.into();
                validate($kind, &s)?;
                Ok(Self(s))
            }

            /// Get the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(s)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a fixed camera.
    CameraId,
    "camera_id"
);

string_id!(
    /// Identifier of a monitored zone (one or more cameras).
    ZoneId,
    "zone_id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_ids() {
        assert_eq!(CameraId::parse("cam-01").unwrap().as_str(), "cam-01");
        assert_eq!(ZoneId::parse("west_zone").unwrap().to_string(), "west_zone");
    }

    #[test]
    fn test_parse_rejects_empty_and_slashes() {
        assert_eq!(CameraId::parse(""), Err(IdError::Empty("camera_id")));
        assert_eq!(
            ZoneId::parse("a/b"),
            Err(IdError::InvalidChar("zone_id", '/'))
        );
    }

    #[test]
    fn test_parse_rejects_long_ids() {
        let long = "x".repeat(MAX_ID_LEN + 1);
        assert!(matches!(CameraId::parse(long), Err(IdError::TooLong(_))));
    }

    #[test]
    fn test_serde_transparent() {
        let id = CameraId::parse("cam1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"cam1\"");
    }
}
