//! Local export helpers
//!
//! Everything the engine reads from or writes to the local export:
//!
//! - **Discovery**: album directories under the root and media files inside
//!   them (sidecar `.json` files and markers are not media).
//! - **Hashing**: streaming MD5 of a file's content.
//! - **Markers**: the migrated and error marker files that gate re-runs.
//! - **Atomic writes**: write-to-temp + rename so a crash never leaves a
//!   torn file behind.

use std::error::Error as StdError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use gp2nc_core::domain::{ContentHash, DirectoryState, LocalMediaItem};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument, warn};

use crate::MigrateError;

/// Written when every file of a directory was processed
pub const MIGRATED_MARKER: &str = "gp2nc-migrated";

/// Written when a directory aborted; removed by hand once resolved
pub const ERROR_MARKER: &str = "gp2nc-error.log";

/// Suffix of the per-directory metadata sidecar
const DIRECTORY_METADATA_SUFFIX: &str = "metadata.json";

const HASH_CHUNK: usize = 64 * 1024;

// ============================================================================
// Atomic writes
// ============================================================================

/// Writes `data` to `target` through `<target>.tmp` and a rename
#[instrument(skip(data), fields(path = %target.display(), bytes = data.len()))]
pub async fn write_atomic(target: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = {
        let mut p = target.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };

    debug!(?tmp_path, "writing to temporary file");
    tokio::fs::write(&tmp_path, data).await?;
    tokio::fs::rename(&tmp_path, target).await?;
    Ok(())
}

// ============================================================================
// Hashing
// ============================================================================

/// MD5 of the file's full content
pub async fn hash_file(path: &Path) -> Result<ContentHash, MigrateError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_CHUNK];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(ContentHash::from_digest(context.compute().0))
}

// ============================================================================
// Discovery
// ============================================================================

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn is_media_name(name: &str) -> bool {
    !is_hidden(name)
        && !name.ends_with(".json")
        && name != MIGRATED_MARKER
        && name != ERROR_MARKER
        && !name.ends_with(".tmp")
}

/// `metadata.json` and its variants, but not a photo's
/// `<photo>.<ext>.supplemental-metadata.json` sidecar
fn is_directory_metadata(name: &str) -> bool {
    name.strip_suffix(DIRECTORY_METADATA_SUFFIX)
        .is_some_and(|prefix| !prefix.contains('.'))
}

/// Album directories directly under `root`, sorted by name
///
/// Hidden directories (such as the progress store) are skipped.
pub async fn list_directories(root: &Path) -> Result<Vec<PathBuf>, MigrateError> {
    let mut dirs = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if is_hidden(&name.to_string_lossy()) {
            continue;
        }
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Media files in `dir`, sorted by name
pub async fn list_media(dir: &Path) -> Result<Vec<LocalMediaItem>, MigrateError> {
    let mut items = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !is_media_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let metadata = entry.metadata().await?;
        if metadata.is_file() {
            items.push(LocalMediaItem::new(entry.path(), metadata.len()));
        }
    }
    items.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(items)
}

/// Title declared by the directory's own `metadata.json`, if any
///
/// A metadata file that exists but cannot be parsed is an error.
pub async fn directory_title(dir: &Path) -> Result<Option<String>, MigrateError> {
    let mut candidates = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_directory_metadata(&name) {
            candidates.push(entry.path());
        }
    }
    candidates.sort();

    let Some(path) = candidates.into_iter().next() else {
        debug!(dir = %dir.display(), "No metadata found");
        return Ok(None);
    };

    let content = tokio::fs::read_to_string(&path).await?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| MigrateError::Metadata(format!("{}: {e}", path.display())))?;
    Ok(value
        .get("title")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string))
}

// ============================================================================
// Markers
// ============================================================================

/// Reads the directory state from its marker files
pub async fn read_directory_state(dir: &Path) -> Result<DirectoryState, MigrateError> {
    if tokio::fs::try_exists(dir.join(MIGRATED_MARKER)).await? {
        return Ok(DirectoryState::Migrated);
    }
    match tokio::fs::read_to_string(dir.join(ERROR_MARKER)).await {
        Ok(content) => Ok(DirectoryState::ErrorLocked(
            content.lines().next().unwrap_or_default().to_string(),
        )),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(DirectoryState::Unvisited),
        Err(e) => Err(e.into()),
    }
}

/// Writes the error marker: message, file being processed, error chain
pub async fn write_error_marker(
    dir: &Path,
    error: &MigrateError,
    file: Option<&Path>,
) -> std::io::Result<()> {
    let mut lines = vec![format!("Failed: {error}")];
    lines.push(match file {
        Some(file) => format!("while processing {}", file.display()),
        None => "while preparing the directory".to_string(),
    });
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    lines.push(format!("at {}", Utc::now().to_rfc3339()));

    let path = dir.join(ERROR_MARKER);
    write_atomic(&path, lines.join("\n").as_bytes()).await?;
    warn!(marker = %path.display(), "Error marker written");
    Ok(())
}

pub async fn write_migrated_marker(dir: &Path) -> std::io::Result<()> {
    write_atomic(&dir.join(MIGRATED_MARKER), Utc::now().to_rfc3339().as_bytes()).await
}
