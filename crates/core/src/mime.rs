//! Content types for files served out of an extracted template.

use crate::template::file_extension;

/// Fallback for unknown extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Map a file path to the `Content-Type` it is served with.
pub fn content_type_for(path: &str) -> &'static str {
    match file_extension(path).as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        _ => DEFAULT_CONTENT_TYPE,
    }
}
