//! Route definitions for templates.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{template, template_file, upload};
use crate::state::AppState;

/// Routes mounted at `/api`.
///
/// ```text
/// GET    /templates                   -> list
/// POST   /templates                   -> store
/// POST   /templates/create-empty      -> create_empty
/// DELETE /templates/{id}              -> destroy
/// PUT    /templatesupd/{id}           -> update
/// POST   /templatesupd/{id}           -> update
/// GET    /template/{id}               -> serve_entry
/// GET    /template/{id}/{*file}       -> serve_file
/// POST   /upload-image                -> upload_image
/// ```
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/templates", get(template::list).post(template::store))
        .route("/templates/create-empty", post(template::create_empty))
        .route("/templates/{id}", delete(template::destroy))
        .route(
            "/templatesupd/{id}",
            post(template::update).put(template::update),
        )
        .route("/template/{id}", get(template_file::serve_entry))
        .route("/template/{id}/{*file}", get(template_file::serve_file))
        .route("/upload-image", post(upload::upload_image))
}

/// Routes mounted at the root.
///
/// ```text
/// GET    /templates/{id}              -> show (302 to the entry file)
/// DELETE /templates/{id}              -> destroy
/// ```
pub fn web_router() -> Router<AppState> {
    Router::new().route(
        "/templates/{id}",
        get(template::show).delete(template::destroy),
    )
}
