//! Hybrid template storage: the archive lives in the database as base64 and
//! is extracted to the public templates directory on first access.
//!
//! Extraction, cleanup and entry-file writes for one template are serialized
//! through a per-template async lock. Filesystem work runs on the blocking
//! pool via [`TemplateStore`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{TimeDelta, Utc};
use pagekit_core::archive;
use pagekit_core::error::CoreError;
use pagekit_core::storage::TemplateStore;
use pagekit_core::template;
use pagekit_core::types::{DbId, Timestamp};
use pagekit_db::models::template::{CreateTemplate, Template, UpdateTemplate};
use pagekit_db::repositories::TemplateRepo;
use pagekit_db::DbPool;

use crate::error::{AppError, AppResult};

/// Metadata recorded alongside a newly stored archive.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub user_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub entry_file: Option<String>,
    pub original_filename: Option<String>,
    pub preview_image: Option<String>,
}

type LockMap = HashMap<DbId, Arc<tokio::sync::Mutex<()>>>;

pub struct TemplateStorage {
    pool: DbPool,
    store: TemplateStore,
    locks: Mutex<LockMap>,
}

impl TemplateStorage {
    pub fn new(pool: DbPool, templates_dir: &Path) -> Self {
        Self {
            pool,
            store: TemplateStore::new(templates_dir),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Public URL of a file inside an extracted template.
    pub fn file_url(&self, id: DbId, path: &str) -> String {
        template::file_url(id, path)
    }

    fn lock_for(&self, id: DbId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(id).or_default())
    }

    // -----------------------------------------------------------------------
    // Blob storage
    // -----------------------------------------------------------------------

    /// Persist an uploaded archive as a new, not yet extracted template.
    pub async fn store_zip_template(
        &self,
        archive_bytes: &[u8],
        meta: NewTemplate,
    ) -> AppResult<Template> {
        let input = CreateTemplate {
            user_id: meta.user_id,
            name: meta.name,
            description: meta.description,
            entry_file: meta.entry_file,
            zip_content: Some(BASE64.encode(archive_bytes)),
            zip_size: Some(archive_bytes.len() as i64),
            original_filename: meta.original_filename,
            preview_image: meta.preview_image,
        };
        let template = TemplateRepo::create(&self.pool, &input).await?;
        tracing::info!(
            template_id = template.id,
            zip_size = archive_bytes.len(),
            "Template archive stored"
        );
        Ok(template)
    }

    /// Backfill the blob of a template that predates database storage from an
    /// archive on disk.
    ///
    /// Returns `true` when the template already had a blob or one was stored,
    /// `false` when the archive file does not exist.
    pub async fn migrate_to_hybrid(&self, template: &Template, zip_path: &Path) -> AppResult<bool> {
        if template.has_zip_content() {
            return Ok(true);
        }

        let bytes = match tokio::fs::read(zip_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    template_id = template.id,
                    path = %zip_path.display(),
                    "Archive for migration not found"
                );
                return Ok(false);
            }
            Err(e) => return Err(CoreError::Io(e).into()),
        };
        archive::inspect_archive(&bytes)?;

        let original_filename = zip_path.file_name().and_then(|n| n.to_str());
        TemplateRepo::set_zip_content(
            &self.pool,
            template.id,
            &BASE64.encode(&bytes),
            bytes.len() as i64,
            original_filename,
        )
        .await?;
        tracing::info!(template_id = template.id, "Template migrated to database storage");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Extraction
    // -----------------------------------------------------------------------

    /// Make sure the template's files are extracted and converted on disk.
    ///
    /// Returns `false` when there is nothing to extract (no blob, or the
    /// archive lacks the entry file). Extraction failures are returned as
    /// errors and leave the template flagged as not extracted, so the next
    /// access retries.
    pub async fn ensure_extracted(&self, template: &Template) -> AppResult<bool> {
        let id = template.id;
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let current = TemplateRepo::find_by_id(&self.pool, id).await?;
        let current = current.as_ref().unwrap_or(template);
        let entry_file = current.entry_file().to_string();

        if current.is_extracted && self.store.is_extraction_valid(id, &entry_file) {
            return Ok(true);
        }

        let Some(encoded) = current.zip_content.as_deref().filter(|c| !c.is_empty()) else {
            tracing::warn!(template_id = id, "No archive stored for template");
            return Ok(false);
        };

        if current.is_extracted {
            tracing::info!(template_id = id, "Extraction missing on disk, extracting again");
            TemplateRepo::mark_not_extracted(&self.pool, id).await?;
        }

        let bytes = BASE64.decode(encoded).map_err(|e| {
            CoreError::InvalidArchive(format!("stored archive is not valid base64: {e}"))
        })?;

        let store = self.store.clone();
        let entry = entry_file.clone();
        let report = tokio::task::spawn_blocking(move || store.extract(id, &bytes, &entry))
            .await?
            .inspect_err(|e| {
                tracing::error!(template_id = id, error = %e, "Template extraction failed");
            })?;

        if !report.converted {
            tracing::warn!(template_id = id, entry_file, "Archive does not contain the entry file");
            return Ok(false);
        }

        TemplateRepo::mark_extracted(&self.pool, id).await?;
        tracing::info!(template_id = id, files = report.files, "Template extracted");
        Ok(true)
    }

    /// Read a file from the template's extraction, extracting first if needed.
    pub async fn get_file_content(
        &self,
        template: &Template,
        relative: &str,
    ) -> AppResult<Option<Vec<u8>>> {
        if !self.ensure_extracted(template).await? {
            return Ok(None);
        }
        self.read_extracted_file(template, relative).await
    }

    /// Read a file from an extraction that is already on disk. Returns `None`
    /// when the path does not resolve to a file inside the extraction.
    pub async fn read_extracted_file(
        &self,
        template: &Template,
        relative: &str,
    ) -> AppResult<Option<Vec<u8>>> {
        let store = self.store.clone();
        let id = template.id;
        let entry_file = template.entry_file().to_string();
        let relative = relative.to_string();
        let content =
            tokio::task::spawn_blocking(move || store.read_file(id, &entry_file, &relative))
                .await??;

        if content.is_none() {
            tracing::debug!(template_id = id, "Requested template file not found");
        }
        Ok(content)
    }

    /// Delete a template's extraction and clear its flags. Failures are
    /// logged and reported as `false`.
    pub async fn remove_extracted_files(&self, template: &Template) -> bool {
        match self.remove_extraction(template.id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    template_id = template.id,
                    error = %e,
                    "Failed to remove extracted files"
                );
                false
            }
        }
    }

    async fn remove_extraction(&self, id: DbId) -> AppResult<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.remove_extraction_locked(id).await
    }

    async fn remove_extraction_locked(&self, id: DbId) -> AppResult<()> {
        let store = self.store.clone();
        let removed = tokio::task::spawn_blocking(move || store.remove_extraction(id)).await??;
        TemplateRepo::mark_not_extracted(&self.pool, id).await?;
        if removed {
            tracing::debug!(template_id = id, "Extracted files removed");
        }
        Ok(())
    }

    /// Remove extractions older than `days` days.
    ///
    /// Returns the number of templates cleaned up. A failure on one template
    /// is logged and does not stop the others.
    pub async fn cleanup_old_extractions(&self, days: i64) -> AppResult<u64> {
        let cutoff = TimeDelta::try_days(days)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .ok_or_else(|| AppError::validation("The days field is out of range."))?;
        let stale = TemplateRepo::list_stale_extractions(&self.pool, cutoff).await?;

        let mut cleaned = 0;
        for template in &stale {
            match self.remove_extraction_if_stale(template.id, cutoff).await {
                Ok(true) => cleaned += 1,
                Ok(false) => {
                    tracing::debug!(template_id = template.id, "Extraction refreshed, skipped");
                }
                Err(e) => {
                    tracing::error!(
                        template_id = template.id,
                        error = %e,
                        "Extraction cleanup failed"
                    );
                }
            }
        }

        tracing::info!(days, candidates = stale.len(), cleaned, "Extraction cleanup finished");
        Ok(cleaned)
    }

    /// Remove the extraction of `id` if it is still older than `cutoff`.
    ///
    /// The row is re-read under the template lock, so an extraction refreshed
    /// after the stale list was taken is kept. Returns whether it was removed.
    pub async fn remove_extraction_if_stale(
        &self,
        id: DbId,
        cutoff: Timestamp,
    ) -> AppResult<bool> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let still_stale = TemplateRepo::find_by_id(&self.pool, id)
            .await?
            .is_some_and(|t| t.is_extracted && t.extracted_at.is_some_and(|at| at < cutoff));
        if !still_stale {
            return Ok(false);
        }
        self.remove_extraction_locked(id).await?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    /// Replace the entry file's HTML (keeping a backup) and touch the row.
    pub async fn save_entry_html(&self, template: &Template, html: String) -> AppResult<()> {
        self.require_extracted(template).await?;

        let id = template.id;
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let store = self.store.clone();
        let entry_file = template.entry_file().to_string();
        tokio::task::spawn_blocking(move || store.write_entry_file(id, &entry_file, &html))
            .await??;
        TemplateRepo::touch(&self.pool, id).await?;

        tracing::info!(template_id = id, "Template entry file updated");
        Ok(())
    }

    /// Store an uploaded preview image inside the extraction and record it
    /// on the template. Returns the path relative to the extraction root.
    pub async fn store_preview_image(
        &self,
        template: &Template,
        extension: &str,
        bytes: Vec<u8>,
    ) -> AppResult<String> {
        self.require_extracted(template).await?;

        let id = template.id;
        let file_name = format!("preview_{}.{extension}", Utc::now().timestamp());
        let store = self.store.clone();
        let name = file_name.clone();
        tokio::task::spawn_blocking(move || store.store_preview_image(id, &name, &bytes)).await??;

        let relative = format!("{}/{file_name}", pagekit_core::storage::PREVIEW_IMAGES_DIR);
        let input = UpdateTemplate {
            preview_image: Some(relative.clone()),
            ..Default::default()
        };
        TemplateRepo::update_metadata(&self.pool, id, &input).await?;
        Ok(relative)
    }

    async fn require_extracted(&self, template: &Template) -> AppResult<()> {
        if self.ensure_extracted(template).await? {
            Ok(())
        } else {
            Err(AppError::InternalError(format!(
                "Template {} could not be extracted",
                template.id
            )))
        }
    }
}
