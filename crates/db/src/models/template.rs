//! Template entity model and DTOs.

use pagekit_core::template::DEFAULT_ENTRY_FILE;
use pagekit_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `templates` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Template {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub entry_file: String,
    /// Base64 of the original archive. Never serialized into responses.
    #[serde(skip_serializing)]
    pub zip_content: Option<String>,
    pub zip_size: Option<i64>,
    pub is_extracted: bool,
    pub extracted_at: Option<Timestamp>,
    pub original_filename: Option<String>,
    pub preview_image: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Template {
    pub fn has_zip_content(&self) -> bool {
        self.zip_content.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Entry file, falling back to the default when the column is blank.
    pub fn entry_file(&self) -> &str {
        if self.entry_file.trim().is_empty() {
            DEFAULT_ENTRY_FILE
        } else {
            &self.entry_file
        }
    }
}

/// List row joined with the owner's name. Omits the archive blob.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TemplateSummary {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub entry_file: String,
    pub preview_image: Option<String>,
    pub is_extracted: bool,
    pub has_zip_content: bool,
    pub created_at: Timestamp,
    pub owner_name: Option<String>,
}

/// DTO for inserting a template.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplate {
    pub user_id: DbId,
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `index.html` if omitted.
    pub entry_file: Option<String>,
    pub zip_content: Option<String>,
    pub zip_size: Option<i64>,
    pub original_filename: Option<String>,
    pub preview_image: Option<String>,
}

/// DTO for patching template metadata. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTemplate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub preview_image: Option<String>,
}
