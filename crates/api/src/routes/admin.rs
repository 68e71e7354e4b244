use axum::routing::post;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/api/admin/templates`.
///
/// ```text
/// POST   /cleanup                     -> cleanup_extractions
/// POST   /{id}/migrate                -> migrate_template
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cleanup", post(admin::cleanup_extractions))
        .route("/{id}/migrate", post(admin::migrate_template))
}
