//! Template constants, field validation, and URL helpers.

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Entry file assumed when a template row does not name one.
pub const DEFAULT_ENTRY_FILE: &str = "index.html";

/// Preferred entry file names, highest priority first.
pub const ENTRY_FILE_PRIORITY: &[&str] = &["index.html", "main.html", "template.html"];

/// Maximum accepted size of an uploaded template archive (50 MiB).
pub const MAX_ARCHIVE_BYTES: usize = 50 * 1024 * 1024;

/// Maximum accepted size of a template preview image (2 MiB).
pub const MAX_PREVIEW_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// Maximum accepted size of an editor image upload (5 MiB).
pub const MAX_UPLOAD_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Maximum length of a template name.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum length of a template description.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Extensions accepted for a template preview image.
pub const PREVIEW_IMAGE_EXTENSIONS: &[&str] = &["jpeg", "png", "jpg", "gif"];

/// Extensions accepted by the editor image upload endpoint.
pub const UPLOAD_IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp", "svg"];

/// Content types accepted for the template archive field.
pub const ARCHIVE_CONTENT_TYPES: &[&str] = &["application/zip", "application/x-zip-compressed"];

/// URL prefix under which extracted template files are served.
pub const FILE_ROUTE_PREFIX: &str = "/api/template";

/// Starter page stored for templates created without an archive.
pub const EMPTY_TEMPLATE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>New Template</title>
    <style>
        body {
            font-family: Arial, sans-serif;
            margin: 0;
            padding: 20px;
            background-color: #f5f5f5;
        }
        .container {
            max-width: 1200px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 10px rgba(0,0,0,0.1);
        }
        h1 {
            color: #333;
            text-align: center;
            margin-bottom: 30px;
        }
        .welcome-text {
            text-align: center;
            color: #666;
            font-size: 18px;
            margin-bottom: 40px;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1 class="builder-content">Welcome to your new template</h1>
        <p class="welcome-text builder-content">
            Start building your page by dragging content in from the builder toolbox.
        </p>
    </div>
</body>
</html>
"#;

// ---------------------------------------------------------------------------
// Field validation
// ---------------------------------------------------------------------------

/// Validate a template name: required, non-blank, at most [`MAX_NAME_LEN`] chars.
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("The name field is required.".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "The name may not be greater than {MAX_NAME_LEN} characters."
        )));
    }
    Ok(())
}

/// Validate an optional description against [`MAX_DESCRIPTION_LEN`].
pub fn validate_description(description: Option<&str>) -> Result<(), CoreError> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(CoreError::Validation(format!(
            "The description may not be greater than {MAX_DESCRIPTION_LEN} characters."
        ))),
        _ => Ok(()),
    }
}

/// Lowercase extension of a file name without the dot, or `""`.
pub fn file_extension(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Paths and URLs
// ---------------------------------------------------------------------------

/// Normalize a client- or archive-supplied relative path: backslashes become
/// forward slashes and leading slashes are dropped.
pub fn normalize_relative(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Directory part of an entry file path, relative to the extraction root.
///
/// `"index.html"` yields `""`, `"site/index.html"` yields `"site"`.
pub fn entry_dir(entry_file: &str) -> String {
    let normalized = normalize_relative(entry_file);
    match normalized.rsplit_once('/') {
        Some((dir, _)) => {
            let dir = dir.trim_matches('/');
            if dir == "." || dir == ".." {
                String::new()
            } else {
                dir.trim_start_matches("./").to_string()
            }
        }
        None => String::new(),
    }
}

/// Public URL of a file inside an extracted template.
pub fn file_url(template_id: DbId, path: &str) -> String {
    format!(
        "{FILE_ROUTE_PREFIX}/{template_id}/{}",
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn name_is_required() {
        assert_matches!(validate_name("   "), Err(CoreError::Validation(_)));
        assert!(validate_name("Landing page").is_ok());
    }

    #[test]
    fn name_length_is_capped() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert_matches!(validate_name(&long), Err(CoreError::Validation(_)));
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn description_length_is_capped() {
        assert!(validate_description(None).is_ok());
        let long = "d".repeat(MAX_DESCRIPTION_LEN + 1);
        assert_matches!(
            validate_description(Some(&long)),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("Site.ZIP"), "zip");
        assert_eq!(file_extension("assets/app.min.js"), "js");
        assert_eq!(file_extension("README"), "");
        assert_eq!(file_extension(".hidden"), "");
    }

    #[test]
    fn entry_dir_of_root_file_is_empty() {
        assert_eq!(entry_dir("index.html"), "");
        assert_eq!(entry_dir("./index.html"), "");
    }

    #[test]
    fn entry_dir_of_nested_file() {
        assert_eq!(entry_dir("site/index.html"), "site");
        assert_eq!(entry_dir("site\\pages\\home.html"), "site/pages");
    }

    #[test]
    fn file_url_strips_leading_slash() {
        assert_eq!(file_url(7, "/css/app.css"), "/api/template/7/css/app.css");
        assert_eq!(file_url(7, "index.html"), "/api/template/7/index.html");
    }
}
