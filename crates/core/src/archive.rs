//! ZIP archive validation, entry-file discovery, and extraction.
//!
//! Archives are handled entirely in memory: uploads and database blobs are
//! both plain byte slices, so no temporary files are involved.
//!
//! Entry names are validated twice: once when an upload is accepted and
//! again right before extraction, because the stored blob outlives the code
//! that accepted it.

use std::io::{Cursor, Write};
use std::path::Path;

use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::CoreError;
use crate::template::{file_extension, ENTRY_FILE_PRIORITY};

// ── Constants ────────────────────────────────────────────────────────

/// Extensions that are never extracted into a publicly served directory.
pub const DANGEROUS_EXTENSIONS: &[&str] = &["php", "exe", "bat", "sh", "cmd"];

/// Root-level file stems recognised as a bundled preview image.
pub const PREVIEW_IMAGE_STEMS: &[&str] = &["preview", "thumbnail", "thumb", "screenshot"];

/// Extensions recognised for a bundled preview image.
pub const PREVIEW_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

// ── Types ────────────────────────────────────────────────────────────

/// Result of inspecting an uploaded archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    /// Number of entries (files and directories) in the archive.
    pub entry_count: usize,
    /// Resolved entry HTML file, relative to the archive root.
    pub entry_file: Option<String>,
    /// Root-level preview image bundled with the template, if any.
    pub preview_image: Option<String>,
}

// ── Validation ───────────────────────────────────────────────────────

/// Returns `true` if an entry name could escape the extraction directory or
/// names a file type that must never be published.
pub fn is_unsafe_entry(name: &str) -> bool {
    if name.contains("..") || name.starts_with('/') || name.starts_with('\\') {
        return true;
    }
    if name.ends_with('/') {
        return false;
    }
    DANGEROUS_EXTENSIONS.contains(&file_extension(name).as_str())
}

/// Fail on the first unsafe entry name.
pub fn validate_entry_names<S: AsRef<str>>(names: &[S]) -> Result<(), CoreError> {
    for name in names {
        let name: &str = name.as_ref();
        if is_unsafe_entry(name) {
            return Err(CoreError::UnsafePath(name.to_string()));
        }
    }
    Ok(())
}

/// Open an archive and return its entry names in archive order.
pub fn read_entry_names(bytes: &[u8]) -> Result<Vec<String>, CoreError> {
    let archive = open(bytes)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Open an archive, validate every entry name, and locate the entry file and
/// bundled preview image.
pub fn inspect_archive(bytes: &[u8]) -> Result<ArchiveSummary, CoreError> {
    let names = read_entry_names(bytes)?;
    validate_entry_names(&names)?;
    Ok(ArchiveSummary {
        entry_count: names.len(),
        entry_file: find_entry_file(&names),
        preview_image: find_preview_image(&names),
    })
}

// ── Entry discovery ──────────────────────────────────────────────────

/// Locate the template's main HTML file.
///
/// Root-level HTML files win; `index.html`, `main.html`, and `template.html`
/// are preferred in that order, otherwise the first one in archive order is
/// used. Without any root-level HTML, the same search runs over the direct
/// children of the first top-level folder and the result is returned as
/// `folder/file.html`. Returns `None` when no HTML exists at depth ≤ 1.
pub fn find_entry_file<S: AsRef<str>>(names: &[S]) -> Option<String> {
    let names: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();

    let root_html: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| !n.contains('/') && is_html(n))
        .collect();
    if let Some(found) = pick_by_priority(&root_html) {
        return Some(found.to_string());
    }

    let folder = first_top_level_folder(&names)?;
    let prefix = format!("{folder}/");
    let folder_html: Vec<&str> = names
        .iter()
        .filter_map(|n| n.strip_prefix(prefix.as_str()))
        .filter(|rest| !rest.is_empty() && !rest.contains('/') && is_html(rest))
        .collect();

    pick_by_priority(&folder_html).map(|file| format!("{prefix}{file}"))
}

/// Locate a root-level preview image such as `preview.png` or `thumb.jpg`.
pub fn find_preview_image<S: AsRef<str>>(names: &[S]) -> Option<String> {
    names
        .iter()
        .map(|n| n.as_ref())
        .filter(|n: &&str| !n.contains('/'))
        .find(|n: &&str| {
            let ext = file_extension(n);
            let stem = n.rsplit_once('.').map_or(*n, |(stem, _)| stem);
            PREVIEW_IMAGE_STEMS.contains(&stem) && PREVIEW_IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .map(str::to_string)
}

fn is_html(name: &str) -> bool {
    file_extension(name) == "html"
}

fn pick_by_priority<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    ENTRY_FILE_PRIORITY
        .iter()
        .find_map(|wanted| candidates.iter().copied().find(|c| c == wanted))
        .or_else(|| candidates.first().copied())
}

/// First top-level folder in archive order, whether it appears as an explicit
/// directory entry or only as the first segment of a nested file. Hidden and
/// OS metadata folders (`.git/`, `__MACOSX/`) are skipped.
fn first_top_level_folder<'a>(names: &[&'a str]) -> Option<&'a str> {
    names
        .iter()
        .copied()
        .filter_map(|n| n.split_once('/').map(|(first, _)| first))
        .find(|folder| !folder.is_empty() && !folder.starts_with('.') && *folder != "__MACOSX")
}

// ── Extraction ───────────────────────────────────────────────────────

/// Extract every entry of `bytes` below `dest`, creating directories as
/// needed. Entry names are re-validated first; nothing is written if any of
/// them is unsafe.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<usize, CoreError> {
    let mut archive = open(bytes)?;
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    validate_entry_names(&names)?;

    std::fs::create_dir_all(dest)?;
    let mut written = 0;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| CoreError::UnsafePath(entry.name().to_string()))?;
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    tracing::debug!(files = written, dest = %dest.display(), "Archive extracted");
    Ok(written)
}

/// Build a deflated archive holding a single file.
pub fn single_file_archive(name: &str, contents: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(name, options)?;
    writer.write_all(contents)?;
    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

fn open(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, CoreError> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CoreError::InvalidArchive(format!("Unable to open ZIP file: {e}")))
}
