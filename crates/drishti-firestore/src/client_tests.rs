//! Error mapping tests for the Firestore client.

use crate::error::FirestoreError;

#[test]
fn test_error_from_http_status_429() {
    let err = FirestoreError::from_http_status(429, "rate limited");
    assert!(matches!(err, FirestoreError::RateLimited(_)));
    assert!(err.is_retryable());
    assert!(err.retry_after_ms().is_some());
}

#[test]
fn test_error_from_http_status_5xx() {
    for status in [500u16, 502, 503] {
        let err = FirestoreError::from_http_status(status, "server");
        assert!(matches!(err, FirestoreError::ServerError(s, _) if s == status));
        assert!(err.is_retryable());
        assert_eq!(err.http_status(), Some(status));
    }
}

#[test]
fn test_error_from_http_status_client_errors() {
    let cases = [
        (400u16, "RequestFailed"),
        (401, "AuthError"),
        (403, "PermissionDenied"),
        (404, "NotFound"),
        (409, "AlreadyExists"),
    ];
    for (status, expected) in cases {
        let err = FirestoreError::from_http_status(status, "x");
        assert!(!err.is_retryable(), "{} should not retry", status);
        assert!(format!("{:?}", err).starts_with(expected));
    }
}

#[test]
fn test_http_status_round_trip() {
    assert_eq!(FirestoreError::RateLimited(1000).http_status(), Some(429));
    assert_eq!(FirestoreError::not_found("a/b").http_status(), Some(404));
    assert_eq!(FirestoreError::invalid_response("bad").http_status(), None);
}

#[test]
fn test_retry_after_only_for_rate_limit() {
    assert_eq!(FirestoreError::RateLimited(250).retry_after_ms(), Some(250));
    assert_eq!(
        FirestoreError::ServerError(500, "x".into()).retry_after_ms(),
        None
    );
}
