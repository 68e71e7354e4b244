//! Handlers for the template resource.
//!
//! Creation and listing live under `/api/templates`, editing under
//! `/api/templatesupd/{id}`. `/templates/{id}` redirects to the extracted
//! entry file.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Request, State};
use axum::http::header::LOCATION;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pagekit_core::archive;
use pagekit_core::converter;
use pagekit_core::error::CoreError;
use pagekit_core::template::{
    self, file_extension, validate_description, validate_name, ARCHIVE_CONTENT_TYPES,
    DEFAULT_ENTRY_FILE, EMPTY_TEMPLATE_HTML, MAX_ARCHIVE_BYTES, MAX_PREVIEW_IMAGE_BYTES,
    PREVIEW_IMAGE_EXTENSIONS,
};
use pagekit_core::types::DbId;
use pagekit_db::models::template::{Template, UpdateTemplate};
use pagekit_db::repositories::TemplateRepo;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::{collect_validation, parse_body};
use crate::response::Success;
use crate::services::template_storage::NewTemplate;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /api/templates/create-empty`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateEmptyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Body of `PUT /api/templatesupd/{id}`. `html_content` wins over `content`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub html_content: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TemplateCreated {
    pub message: String,
    pub template: Template,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct TemplateUpdated {
    pub message: String,
    pub template: Template,
}

#[derive(Debug, Serialize)]
pub struct TemplateListItem {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub preview_image: Option<String>,
    pub url: String,
    pub is_extracted: bool,
    pub has_zip_content: bool,
    pub created_at: String,
    pub user: String,
}

#[derive(Debug, Serialize)]
pub struct TemplateList {
    pub templates: Vec<TemplateListItem>,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

/// Page that redirects to a template's extracted entry file.
fn show_url(id: DbId) -> String {
    format!("/templates/{id}")
}

async fn find_template(state: &AppState, id: DbId) -> AppResult<Template> {
    TemplateRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Template",
            id,
        }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/templates
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Success<TemplateList>>> {
    let rows = TemplateRepo::list_with_owner(&state.pool).await?;
    let templates = rows
        .into_iter()
        .map(|row| {
            let entry_file = if row.entry_file.is_empty() {
                DEFAULT_ENTRY_FILE
            } else {
                row.entry_file.as_str()
            };
            TemplateListItem {
                url: template::file_url(row.id, entry_file),
                created_at: row.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                user: row.owner_name.unwrap_or_else(|| "Unknown".to_string()),
                id: row.id,
                name: row.name,
                description: row.description,
                preview_image: row.preview_image,
                is_extracted: row.is_extracted,
                has_zip_content: row.has_zip_content,
            }
        })
        .collect();

    Ok(Json(Success::new(TemplateList { templates })))
}

/// POST /api/templates
///
/// Multipart form: `template` (ZIP archive), `name`, optional `description`
/// and optional `preview_image`. The archive is stored in the database and
/// extracted on first access.
pub async fn store(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Success<TemplateCreated>>)> {
    let mut archive_file: Option<UploadedFile> = None;
    let mut preview_file: Option<UploadedFile> = None;
    let mut name = String::new();
    let mut description: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "template" | "preview_image" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let upload = UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                };
                if field_name == "template" {
                    archive_file = Some(upload);
                } else if !upload.bytes.is_empty() {
                    preview_file = Some(upload);
                }
            }
            "name" => {
                name = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
            }
            "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                description = Some(text).filter(|d| !d.trim().is_empty());
            }
            _ => {} // ignore unknown fields
        }
    }

    collect_validation([
        validate_archive_upload(archive_file.as_ref()),
        validate_name(&name),
        validate_description(description.as_deref()),
        validate_preview_upload(preview_file.as_ref()),
    ])?;
    let Some(archive_file) = archive_file else {
        return Err(AppError::validation("The template field is required."));
    };

    let summary = archive::inspect_archive(&archive_file.bytes)?;
    let entry_file = summary.entry_file.ok_or_else(|| {
        AppError::validation("No HTML file found at the root of the template archive.")
    })?;

    let template = state
        .storage
        .store_zip_template(
            &archive_file.bytes,
            NewTemplate {
                user_id: state.config.default_owner_id,
                name,
                description,
                entry_file: Some(entry_file),
                original_filename: archive_file.file_name,
                preview_image: summary.preview_image,
            },
        )
        .await?;

    let template = match preview_file {
        Some(preview) => attach_preview(&state, template, preview).await?,
        None => template,
    };

    let url = show_url(template.id);
    Ok((
        StatusCode::CREATED,
        Json(Success::new(TemplateCreated {
            message: "Template uploaded successfully".to_string(),
            template,
            url,
        })),
    ))
}

/// Store an uploaded preview image. Failures are logged and the template is
/// returned unchanged.
async fn attach_preview(
    state: &AppState,
    template: Template,
    preview: UploadedFile,
) -> AppResult<Template> {
    let extension = preview
        .file_name
        .as_deref()
        .map(file_extension)
        .unwrap_or_default();

    match state
        .storage
        .store_preview_image(&template, &extension, preview.bytes.to_vec())
        .await
    {
        Ok(path) => {
            tracing::info!(template_id = template.id, path, "Preview image stored");
            Ok(TemplateRepo::find_by_id(&state.pool, template.id)
                .await?
                .unwrap_or(template))
        }
        Err(e) => {
            tracing::error!(template_id = template.id, error = %e, "Failed to store preview image");
            Ok(template)
        }
    }
}

fn validate_archive_upload(file: Option<&UploadedFile>) -> Result<(), CoreError> {
    let Some(file) = file else {
        return Err(CoreError::Validation("The template field is required.".into()));
    };
    let by_type = file
        .content_type
        .as_deref()
        .is_some_and(|ct| ARCHIVE_CONTENT_TYPES.contains(&ct));
    let by_name = file
        .file_name
        .as_deref()
        .is_some_and(|n| file_extension(n) == "zip");
    if !by_type && !by_name {
        return Err(CoreError::Validation(
            "The template must be a file of type: zip.".into(),
        ));
    }
    if file.bytes.len() > MAX_ARCHIVE_BYTES {
        return Err(CoreError::Validation(format!(
            "The template may not be greater than {} kilobytes.",
            MAX_ARCHIVE_BYTES / 1024
        )));
    }
    Ok(())
}

fn validate_preview_upload(file: Option<&UploadedFile>) -> Result<(), CoreError> {
    let Some(file) = file else {
        return Ok(());
    };
    let extension = file.file_name.as_deref().map(file_extension).unwrap_or_default();
    if !PREVIEW_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(CoreError::Validation(format!(
            "The preview image must be a file of type: {}.",
            PREVIEW_IMAGE_EXTENSIONS.join(", ")
        )));
    }
    if file.bytes.len() > MAX_PREVIEW_IMAGE_BYTES {
        return Err(CoreError::Validation(format!(
            "The preview image may not be greater than {} kilobytes.",
            MAX_PREVIEW_IMAGE_BYTES / 1024
        )));
    }
    Ok(())
}

/// POST /api/templates/create-empty
///
/// Creates a template from the built-in starter page. The stored blob is a
/// one-file archive, so it extracts like any uploaded template.
pub async fn create_empty(
    State(state): State<AppState>,
    request: Request,
) -> AppResult<(StatusCode, Json<Success<TemplateCreated>>)> {
    let input: CreateEmptyRequest = parse_body(&state, request).await?;
    let name = input.name.unwrap_or_default();
    let description = input.description.filter(|d| !d.trim().is_empty());

    collect_validation([
        validate_name(&name),
        validate_description(description.as_deref()),
    ])?;

    let archive_bytes =
        archive::single_file_archive(DEFAULT_ENTRY_FILE, EMPTY_TEMPLATE_HTML.as_bytes())?;
    let template = state
        .storage
        .store_zip_template(
            &archive_bytes,
            NewTemplate {
                user_id: state.config.default_owner_id,
                name,
                description,
                entry_file: Some(DEFAULT_ENTRY_FILE.to_string()),
                original_filename: None,
                preview_image: None,
            },
        )
        .await?;

    let url = show_url(template.id);
    Ok((
        StatusCode::CREATED,
        Json(Success::new(TemplateCreated {
            message: "Template created successfully".to_string(),
            template,
            url,
        })),
    ))
}

/// PUT /api/templatesupd/{id}
///
/// Also mounted as POST. Accepts JSON or a urlencoded form. When the body
/// carries `html_content` (or `content`) the entry file is rewritten, keeping
/// a `.backup` of the previous version.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    request: Request,
) -> AppResult<Json<Success<TemplateUpdated>>> {
    let template = find_template(&state, id).await?;
    let input: UpdateTemplateRequest = parse_body(&state, request).await?;

    let html = input.html_content.or(input.content);
    let html_errors = html
        .as_deref()
        .map(converter::validate_template)
        .unwrap_or_default();
    collect_validation(
        [
            input.name.as_deref().map_or(Ok(()), validate_name),
            validate_description(input.description.as_deref()),
        ]
        .into_iter()
        .chain(html_errors.into_iter().map(|e| Err(CoreError::Validation(e)))),
    )?;

    let saved_html = html.is_some();
    match html {
        Some(html) => {
            tracing::info!(template_id = id, html_len = html.len(), "Saving template HTML");
            state.storage.save_entry_html(&template, html).await?;
        }
        None => tracing::warn!(template_id = id, "Update request carried no HTML content"),
    }

    let patch = UpdateTemplate {
        name: input.name,
        description: input.description,
        preview_image: None,
    };
    let template = TemplateRepo::update_metadata(&state.pool, id, &patch)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Template",
            id,
        }))?;

    let message = if saved_html {
        "Template saved successfully"
    } else {
        "Template updated successfully"
    };
    Ok(Json(Success::new(TemplateUpdated {
        message: message.to_string(),
        template,
    })))
}

/// DELETE /api/templates/{id}
///
/// Also mounted at `/templates/{id}`. Removes the extraction directory, then
/// soft-deletes the row.
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<Success<Message>>> {
    let template = find_template(&state, id).await?;

    if !state.storage.remove_extracted_files(&template).await {
        tracing::warn!(template_id = id, "Deleting template with leftover extracted files");
    }
    TemplateRepo::soft_delete(&state.pool, id).await?;

    Ok(Json(Success::new(Message {
        message: "Template deleted successfully".to_string(),
    })))
}

/// GET /templates/{id}
///
/// Extracts the template if needed and redirects (302) to its entry file.
pub async fn show(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<Response> {
    let template = find_template(&state, id).await?;

    if !state.storage.ensure_extracted(&template).await? {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Template file",
            id,
        }));
    }

    let url = state.storage.file_url(id, template.entry_file());
    Ok((StatusCode::FOUND, [(LOCATION, url)]).into_response())
}
