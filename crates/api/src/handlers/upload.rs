//! Image uploads from the page-builder editor.

use axum::extract::{Multipart, State};
use axum::Json;
use pagekit_core::error::CoreError;
use pagekit_core::template::{file_extension, MAX_UPLOAD_IMAGE_BYTES, UPLOAD_IMAGE_EXTENSIONS};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::handlers::collect_validation;
use crate::response::Success;
use crate::state::AppState;

/// Public URL prefix of files under the uploads directory.
pub const UPLOADS_URL_PREFIX: &str = "/storage/uploads";

#[derive(Debug, Serialize)]
pub struct UploadedImage {
    pub url: String,
    pub path: String,
}

/// POST /api/upload-image
///
/// Multipart form with a required `file` field. The image is stored under a
/// random name in the uploads directory.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<Success<UploadedImage>>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some((file_name, data.to_vec()));
    }

    let (file_name, data) = upload
        .filter(|(_, data)| !data.is_empty())
        .ok_or_else(|| AppError::validation("The file field is required."))?;

    let ext = file_extension(&file_name);
    collect_validation([
        if UPLOAD_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "The file must be a file of type: {}.",
                UPLOAD_IMAGE_EXTENSIONS.join(", ")
            )))
        },
        if data.len() <= MAX_UPLOAD_IMAGE_BYTES {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "The file may not be greater than {} kilobytes.",
                MAX_UPLOAD_IMAGE_BYTES / 1024
            )))
        },
    ])?;

    let stored_name = format!("{}.{ext}", uuid::Uuid::new_v4());
    let uploads_dir = &state.config.uploads_dir;
    tokio::fs::create_dir_all(uploads_dir)
        .await
        .map_err(CoreError::Io)?;
    tokio::fs::write(uploads_dir.join(&stored_name), &data)
        .await
        .map_err(CoreError::Io)?;

    tracing::info!(file = %stored_name, size = data.len(), "Editor image uploaded");

    let url = format!("{UPLOADS_URL_PREFIX}/{stored_name}");
    Ok(Json(Success::new(UploadedImage {
        path: url.trim_start_matches('/').to_string(),
        url,
    })))
}
