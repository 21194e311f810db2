// =========================
// tests/unit/error_tests.rs
// =========================
//! Unit tests for the error module
use axum::{http::StatusCode, response::IntoResponse};
use backend_lib::error::{AppError, ErrorReport};
use std::io::{Error as IoError, ErrorKind};

#[test]
fn test_app_error_display() {
    let err = AppError::Duplicate("username".to_string());
    assert_eq!(err.to_string(), "Already exists: username");

    let io_error = AppError::Io(IoError::new(ErrorKind::NotFound, "File not found"));
    assert!(io_error.to_string().contains("IO error"));

    assert_eq!(AppError::Unauthenticated.to_string(), "Authentication required");
}

#[test]
fn test_app_error_status_codes() {
    let cases = [
        (AppError::Invalid("x".to_string()), StatusCode::BAD_REQUEST, "VAL_001"),
        (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND, "NF_001"),
        (AppError::Duplicate("x".to_string()), StatusCode::CONFLICT, "DUP_001"),
        (AppError::Unauthenticated, StatusCode::UNAUTHORIZED, "AUTH_001"),
        (AppError::Forbidden("x".to_string()), StatusCode::FORBIDDEN, "AUTH_002"),
        (AppError::Internal("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR, "INT_001"),
    ];
    for (err, status, code) in cases {
        assert_eq!(err.status_code(), status, "{err}");
        assert_eq!(err.error_code(), code, "{err}");
    }
}

#[test]
fn test_only_server_faults_are_internal() {
    assert!(AppError::Internal("x".to_string()).is_internal());
    assert!(AppError::Io(IoError::other("disk")).is_internal());
    assert!(!AppError::Unauthenticated.is_internal());
    assert!(!AppError::Duplicate("x".to_string()).is_internal());
}

#[test]
fn test_sanitized_message_hides_details() {
    let err = AppError::Internal("db password is hunter2".to_string());
    assert!(!err.sanitized_message().contains("hunter2"));
}

#[test]
fn test_from_serde_error() {
    let json_error = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
    let app_error = AppError::from(json_error);
    assert_eq!(app_error.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(app_error.error_code(), "JSON_001");
}

#[tokio::test]
async fn test_into_response_body_and_report() {
    let response = AppError::Duplicate("username".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let report = response.extensions().get::<ErrorReport>().cloned().unwrap();
    assert_eq!(report.code, "DUP_001");
    assert_eq!(report.status, StatusCode::CONFLICT);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "DUP_001");
    assert!(body["error"]["message"].is_string());
}
