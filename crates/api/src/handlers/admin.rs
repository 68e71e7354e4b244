//! Maintenance endpoints for template storage.

use std::path::PathBuf;

use axum::extract::{Path, Request, State};
use axum::Json;
use pagekit_core::error::CoreError;
use pagekit_core::template::file_extension;
use pagekit_core::types::DbId;
use pagekit_db::repositories::TemplateRepo;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::parse_body;
use crate::response::Success;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CleanupRequest {
    /// Retention in days; defaults to the configured value.
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResult {
    pub days: i64,
    pub cleaned: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct MigrateRequest {
    pub zip_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MigrateResult {
    pub template_id: DbId,
    pub migrated: bool,
}

/// POST /api/admin/templates/cleanup
pub async fn cleanup_extractions(
    State(state): State<AppState>,
    request: Request,
) -> AppResult<Json<Success<CleanupResult>>> {
    let input: CleanupRequest = parse_body(&state, request).await?;
    let days = input.days.unwrap_or(state.config.extraction_retention_days);
    if days < 0 {
        return Err(AppError::validation("The days field must be at least 0."));
    }

    let cleaned = state.storage.cleanup_old_extractions(days).await?;
    Ok(Json(Success::new(CleanupResult { days, cleaned })))
}

/// POST /api/admin/templates/{id}/migrate
///
/// Stores the archive found at `zip_path` as the template's blob. A template
/// that already has a blob is left untouched.
pub async fn migrate_template(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    request: Request,
) -> AppResult<Json<Success<MigrateResult>>> {
    let template = TemplateRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Template",
            id,
        }))?;

    let input: MigrateRequest = parse_body(&state, request).await?;
    let zip_path = input
        .zip_path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::validation("The zip_path field is required."))?;
    if file_extension(&zip_path) != "zip" {
        return Err(AppError::validation("The zip_path must point to a .zip file."));
    }

    let migrated = state
        .storage
        .migrate_to_hybrid(&template, &PathBuf::from(zip_path))
        .await?;
    if !migrated {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Template archive",
            id,
        }));
    }

    Ok(Json(Success::new(MigrateResult {
        template_id: id,
        migrated,
    })))
}
