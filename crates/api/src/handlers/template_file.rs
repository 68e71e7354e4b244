//! Serving files out of extracted templates.

use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use pagekit_core::error::CoreError;
use pagekit_core::mime::content_type_for;
use pagekit_core::types::DbId;
use pagekit_db::repositories::TemplateRepo;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /api/template/{id}
///
/// Serves the template's entry file.
pub async fn serve_entry(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Response> {
    serve(&state, id, None).await
}

/// GET /api/template/{id}/{*file}
pub async fn serve_file(
    State(state): State<AppState>,
    Path((id, file)): Path<(DbId, String)>,
) -> AppResult<Response> {
    serve(&state, id, Some(file)).await
}

async fn serve(state: &AppState, id: DbId, file: Option<String>) -> AppResult<Response> {
    let template = TemplateRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Template",
            id,
        }))?;

    let path = file
        .filter(|f| !f.trim_matches('/').is_empty())
        .unwrap_or_else(|| template.entry_file().to_string());

    let extracted = state
        .storage
        .ensure_extracted(&template)
        .await
        .map_err(|e| match e {
            AppError::Database(_) => e,
            other => AppError::InternalError(format!("Failed to extract template {id}: {other}")),
        })?;
    if !extracted {
        return Err(AppError::InternalError(format!(
            "Template {id} has no extractable archive"
        )));
    }

    let content = state
        .storage
        .read_extracted_file(&template, &path)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Template file",
            id,
        }))?;

    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static(content_type_for(&path))),
        (CACHE_CONTROL, HeaderValue::from_static("no-cache, private")),
        (CONTENT_LENGTH, HeaderValue::from(content.len())),
    ];
    Ok((headers, content).into_response())
}
