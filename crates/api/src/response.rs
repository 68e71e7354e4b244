//! Shared response envelope for API handlers.
//!
//! Successful responses carry `"success": true` next to the payload's own
//! fields. Use [`Success`] instead of ad-hoc `json!({ "success": true, ... })`
//! to get compile-time type safety and consistent serialization.

use serde::Serialize;

/// `{ "success": true, ...T }` response envelope.
///
/// `T` must serialize as a map (a struct with named fields).
///
/// # Example
///
/// ```ignore
/// Ok(Json(Success::new(TemplateCreated { template, url, message })))
/// ```
#[derive(Debug, Serialize)]
pub struct Success<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> Success<T> {
    pub fn new(body: T) -> Self {
        Self {
            success: true,
            body,
        }
    }
}
