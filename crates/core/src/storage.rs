//! On-disk layout of extracted templates.
//!
//! Every template extracts to `<root>/<id>/`. Extraction happens in a
//! sibling staging directory and is published with a rename once the entry
//! file has been converted, so a reader never observes a half-written tree.
//!
//! This type performs blocking filesystem I/O; async callers should run it
//! on the blocking pool.

use std::path::{Path, PathBuf};

use crate::archive;
use crate::converter;
use crate::error::CoreError;
use crate::template::{entry_dir, normalize_relative};
use crate::types::DbId;

/// Suffix of the copy kept when an entry file is overwritten.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Sub-directory of an extraction that receives uploaded preview images.
pub const PREVIEW_IMAGES_DIR: &str = "images";

const STAGING_PREFIX: &str = ".staging-";

/// Outcome of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Number of files written.
    pub files: usize,
    /// Whether the entry file was found and converted.
    pub converted: bool,
}

/// Filesystem store rooted at the public templates directory.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the extracted files of a template.
    pub fn extraction_dir(&self, id: DbId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Absolute path of a template's entry file.
    pub fn entry_file_path(&self, id: DbId, entry_file: &str) -> PathBuf {
        self.extraction_dir(id).join(normalize_relative(entry_file))
    }

    /// An extraction is valid while both its directory and entry file exist.
    pub fn is_extraction_valid(&self, id: DbId, entry_file: &str) -> bool {
        self.extraction_dir(id).is_dir() && self.entry_file_path(id, entry_file).is_file()
    }

    /// Extract `archive_bytes` for template `id`, convert its entry file to
    /// builder markup, and publish the result at [`Self::extraction_dir`].
    ///
    /// Any previous extraction is replaced. On failure nothing is published
    /// and the staging directory is removed.
    pub fn extract(
        &self,
        id: DbId,
        archive_bytes: &[u8],
        entry_file: &str,
    ) -> Result<ExtractionReport, CoreError> {
        std::fs::create_dir_all(&self.root)?;
        let staging = self
            .root
            .join(format!("{STAGING_PREFIX}{id}-{}", uuid::Uuid::new_v4()));

        let result = extract_and_convert(&staging, id, archive_bytes, entry_file)
            .and_then(|report| {
                self.publish(&staging, id)?;
                Ok(report)
            });

        if result.is_err() && staging.exists() {
            if let Err(e) = std::fs::remove_dir_all(&staging) {
                tracing::warn!(template_id = id, error = %e, "Failed to remove staging directory");
            }
        }
        result
    }

    fn publish(&self, staging: &Path, id: DbId) -> Result<(), CoreError> {
        let target = self.extraction_dir(id);
        if target.exists() {
            std::fs::remove_dir_all(&target)?;
        }
        std::fs::rename(staging, &target)?;
        Ok(())
    }

    /// Find a file inside a template's extraction.
    ///
    /// Candidates, in order:
    /// 1. `relative` from the extraction root;
    /// 2. `relative` below the entry file's directory, for archives that keep
    ///    everything inside a top-level folder;
    /// 3. `relative` with a duplicated entry directory prefix removed.
    ///
    /// A candidate is accepted only if it is a regular file whose canonical
    /// path lies inside the canonical extraction root.
    pub fn resolve_file(&self, id: DbId, entry_file: &str, relative: &str) -> Option<PathBuf> {
        let base = self.extraction_dir(id).canonicalize().ok()?;
        let relative = normalize_relative(relative);
        let dir = entry_dir(entry_file);

        let mut candidates = vec![relative.clone()];
        if !dir.is_empty() {
            candidates.push(format!("{dir}/{relative}"));
            if let Some(stripped) = relative.strip_prefix(&format!("{dir}/")) {
                candidates.push(stripped.to_string());
            }
        }
        candidates.dedup();

        candidates.into_iter().find_map(|candidate| {
            let resolved = base.join(&candidate).canonicalize().ok()?;
            (resolved.starts_with(&base) && resolved.is_file()).then_some(resolved)
        })
    }

    /// Read a file resolved through [`Self::resolve_file`].
    pub fn read_file(
        &self,
        id: DbId,
        entry_file: &str,
        relative: &str,
    ) -> Result<Option<Vec<u8>>, CoreError> {
        match self.resolve_file(id, entry_file, relative) {
            Some(path) => Ok(Some(std::fs::read(path)?)),
            None => Ok(None),
        }
    }

    /// Delete a template's extraction. A missing directory is not an error.
    ///
    /// Returns `true` if a directory was removed.
    pub fn remove_extraction(&self, id: DbId) -> Result<bool, CoreError> {
        let dir = self.extraction_dir(id);
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir)?;
        Ok(true)
    }

    /// Overwrite the entry file, keeping the previous content next to it with
    /// a [`BACKUP_SUFFIX`].
    pub fn write_entry_file(&self, id: DbId, entry_file: &str, html: &str) -> Result<(), CoreError> {
        let path = self.entry_file_path(id, entry_file);
        if path.is_file() {
            let mut backup = path.clone().into_os_string();
            backup.push(BACKUP_SUFFIX);
            std::fs::copy(&path, PathBuf::from(backup))?;
        } else if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, html)?;
        Ok(())
    }

    /// Store an uploaded preview image inside the extraction.
    pub fn store_preview_image(
        &self,
        id: DbId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, CoreError> {
        if archive::is_unsafe_entry(file_name) || file_name.contains(['/', '\\']) {
            return Err(CoreError::UnsafePath(file_name.to_string()));
        }
        let dir = self.extraction_dir(id).join(PREVIEW_IMAGES_DIR);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

fn extract_and_convert(
    staging: &Path,
    id: DbId,
    archive_bytes: &[u8],
    entry_file: &str,
) -> Result<ExtractionReport, CoreError> {
    let files = archive::extract_archive(archive_bytes, staging)?;

    let entry_path = staging.join(normalize_relative(entry_file));
    if !entry_path.is_file() {
        tracing::warn!(template_id = id, entry_file, "Entry file not found after extraction");
        return Ok(ExtractionReport {
            files,
            converted: false,
        });
    }

    let raw = std::fs::read(&entry_path)?;
    let html = String::from_utf8_lossy(&raw);
    let converted = converter::convert_html(&html, Some(id), &entry_dir(entry_file))?;
    std::fs::write(&entry_path, converted)?;

    Ok(ExtractionReport {
        files,
        converted: true,
    })
}
