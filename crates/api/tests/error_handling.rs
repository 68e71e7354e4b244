//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values and check the
//! status code and the `{ success: false, message, code, errors? }` body.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use pagekit_api::error::AppError;
use pagekit_core::error::CoreError;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Template",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["message"], "Template with id 42 not found");
    assert!(json.get("errors").is_none());
}

#[tokio::test]
async fn core_validation_returns_422() {
    let err = AppError::Core(CoreError::Validation("The name field is required.".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["message"], "The name field is required.");
}

#[tokio::test]
async fn validation_lists_every_error() {
    let err = AppError::Validation {
        message: "The given data was invalid.".into(),
        errors: vec!["first".into(), "second".into()],
    };

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["errors"], serde_json::json!(["first", "second"]));
}

#[tokio::test]
async fn unsafe_path_returns_422() {
    let err = AppError::Core(CoreError::UnsafePath("../etc/passwd".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "UNSAFE_PATH");
    assert_eq!(json["message"], "Unsafe file path detected: ../etc/passwd");
}

#[tokio::test]
async fn invalid_archive_returns_422() {
    let err = AppError::Core(CoreError::InvalidArchive("not a zip".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "INVALID_ARCHIVE");
}

#[tokio::test]
async fn bad_request_returns_400() {
    let err = AppError::BadRequest("invalid field value".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["message"], "invalid field value");
}

#[tokio::test]
async fn internal_errors_are_sanitized() {
    for err in [
        AppError::InternalError("disk on fire at /srv/secret".into()),
        AppError::Core(CoreError::Internal("secret detail".into())),
        AppError::Core(CoreError::Io(std::io::Error::other("secret path"))),
    ] {
        let (status, json) = error_to_response(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["message"], "An internal error occurred");
    }
}

#[tokio::test]
async fn row_not_found_maps_to_404() {
    let (status, json) = error_to_response(AppError::Database(sqlx::Error::RowNotFound)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}
