//! Repository for the `templates` table.

use pagekit_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::template::{CreateTemplate, Template, TemplateSummary, UpdateTemplate};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, name, description, entry_file, zip_content, zip_size, \
     is_extracted, extracted_at, original_filename, preview_image, created_at, updated_at";

/// Provides CRUD operations for templates plus extraction bookkeeping.
pub struct TemplateRepo;

impl TemplateRepo {
    /// Insert a new template, returning the created row.
    ///
    /// If `entry_file` is `None`, defaults to `index.html`.
    pub async fn create(pool: &PgPool, input: &CreateTemplate) -> Result<Template, sqlx::Error> {
        let query = format!(
            "INSERT INTO templates
                (user_id, name, description, entry_file, zip_content, zip_size,
                 original_filename, preview_image)
             VALUES ($1, $2, $3, COALESCE($4, 'index.html'), $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Template>(&query)
            .bind(input.user_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.entry_file)
            .bind(&input.zip_content)
            .bind(input.zip_size)
            .bind(&input.original_filename)
            .bind(&input.preview_image)
            .fetch_one(pool)
            .await
    }

    /// Find a template by ID. Excludes soft-deleted rows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Template>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM templates WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, Template>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List templates with their owner's name, newest first.
    pub async fn list_with_owner(pool: &PgPool) -> Result<Vec<TemplateSummary>, sqlx::Error> {
        sqlx::query_as::<_, TemplateSummary>(
            "SELECT t.id, t.name, t.description, t.entry_file, t.preview_image, t.is_extracted,
                    (t.zip_content IS NOT NULL AND t.zip_content <> '') AS has_zip_content,
                    t.created_at, u.name AS owner_name
             FROM templates t
             LEFT JOIN users u ON u.id = t.user_id
             WHERE t.deleted_at IS NULL
             ORDER BY t.created_at DESC, t.id DESC",
        )
        .fetch_all(pool)
        .await
    }

    /// Update template metadata. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no live row with the given `id` exists.
    pub async fn update_metadata(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTemplate,
    ) -> Result<Option<Template>, sqlx::Error> {
        let query = format!(
            "UPDATE templates SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                preview_image = COALESCE($4, preview_image)
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Template>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.preview_image)
            .fetch_optional(pool)
            .await
    }

    /// Bump `updated_at` after the entry file changed on disk.
    pub async fn touch(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE templates SET updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flag a template as extracted as of now.
    pub async fn mark_extracted(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE templates SET is_extracted = TRUE, extracted_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear the extraction flags after the directory was removed.
    pub async fn mark_not_extracted(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE templates SET is_extracted = FALSE, extracted_at = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store an archive blob on an existing row.
    pub async fn set_zip_content(
        pool: &PgPool,
        id: DbId,
        zip_content: &str,
        zip_size: i64,
        original_filename: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE templates SET
                zip_content = $2,
                zip_size = $3,
                original_filename = COALESCE($4, original_filename)
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(zip_content)
        .bind(zip_size)
        .bind(original_filename)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a template by ID. Returns `true` if a row was marked deleted.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE templates SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Extracted, live templates whose extraction is strictly older than `cutoff`.
    pub async fn list_stale_extractions(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<Template>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM templates
             WHERE is_extracted = TRUE
               AND extracted_at < $1
               AND deleted_at IS NULL
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, Template>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Backdate or move `extracted_at`. Only built for tests.
    #[cfg(any(test, feature = "test-support"))]
    pub async fn set_extracted_at(
        pool: &PgPool,
        id: DbId,
        extracted_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE templates SET extracted_at = $2 WHERE id = $1")
            .bind(id)
            .bind(extracted_at)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
