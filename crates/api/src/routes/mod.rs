pub mod admin;
pub mod health;
pub mod template;

use std::path::Path;

use axum::Router;
use tower_http::services::ServeDir;

use crate::handlers::upload::UPLOADS_URL_PREFIX;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /templates                         list (GET), upload (POST multipart)
/// /templates/create-empty            create from the starter page (POST)
/// /templates/{id}                    delete (DELETE)
/// /templatesupd/{id}                 update metadata / entry HTML (PUT, POST)
///
/// /template/{id}                     entry file of an extracted template
/// /template/{id}/{*file}             any file of an extracted template
///
/// /upload-image                      editor image upload (POST multipart)
///
/// /admin/templates/cleanup           remove stale extractions (POST)
/// /admin/templates/{id}/migrate      backfill blob from a ZIP on disk (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(template::api_router())
        .nest("/admin/templates", admin::router())
}

/// Static files uploaded through `/api/upload-image`.
pub fn uploads_router(uploads_dir: &Path) -> Router<AppState> {
    Router::new().nest_service(UPLOADS_URL_PREFIX, ServeDir::new(uploads_dir))
}
