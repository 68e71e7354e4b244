pub mod admin;
pub mod template;
pub mod template_file;
pub mod upload;

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Form;
use pagekit_core::error::CoreError;
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Message used for multi-field validation failures.
pub const VALIDATION_MESSAGE: &str = "The given data was invalid.";

/// Deserialize a request body sent either as `application/x-www-form-urlencoded`
/// or as JSON. The JSON path does not require a `Content-Type` header, and an
/// empty body yields `T::default()`.
pub async fn parse_body<T>(state: &AppState, request: Request) -> AppResult<T>
where
    T: DeserializeOwned + Default,
{
    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        let Form(input) = Form::<T>::from_request(request, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok(input);
    }

    let bytes = Bytes::from_request(request, state)
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
}

/// Gather the messages of every failed check into one validation error.
pub fn collect_validation<I>(checks: I) -> AppResult<()>
where
    I: IntoIterator<Item = Result<(), CoreError>>,
{
    let errors: Vec<String> = checks
        .into_iter()
        .filter_map(|check| match check {
            Err(CoreError::Validation(msg)) => Some(msg),
            Err(other) => Some(other.to_string()),
            Ok(()) => None,
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: VALIDATION_MESSAGE.to_string(),
            errors,
        })
    }
}
