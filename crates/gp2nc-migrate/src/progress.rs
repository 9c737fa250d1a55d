//! Progress store
//!
//! One record per content hash under `<root>/.progress/`:
//!
//! - `<hash>.json` - current or tuple encoding
//! - `<hash>.txt` - oldest encoding (remote path only)
//!
//! An even older layout kept one `<filename>.txt` per photo in a
//! `.progress` directory next to the photo; [`ProgressStore::adopt_legacy`]
//! moves those into the root store.
//!
//! Records are replaced atomically (write to `.tmp`, then rename) and the
//! read-modify-write of [`ProgressStore::update`] is serialized per hash.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use gp2nc_core::domain::{ContentHash, ProgressRecord};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::filesystem::write_atomic;
use crate::MigrateError;

/// Name of the progress directory, both at the root and in legacy album directories
pub const PROGRESS_DIR: &str = ".progress";

pub struct ProgressStore {
    dir: PathBuf,
    locks: DashMap<ContentHash, Arc<Mutex<()>>>,
}

impl ProgressStore {
    /// Store for the migration root `root`
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join(PROGRESS_DIR),
            locks: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn json_path(&self, hash: &ContentHash) -> PathBuf {
        self.dir.join(format!("{hash}.json"))
    }

    fn text_path(&self, hash: &ContentHash) -> PathBuf {
        self.dir.join(format!("{hash}.txt"))
    }

    fn progress_error(hash: &ContentHash, reason: impl ToString) -> MigrateError {
        MigrateError::Progress {
            hash: hash.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The record for `hash`, if any
    pub async fn check(&self, hash: &ContentHash) -> Result<Option<ProgressRecord>, MigrateError> {
        if let Some(content) = read_optional(&self.json_path(hash)).await? {
            return ProgressRecord::from_json(&content)
                .map(Some)
                .map_err(|e| Self::progress_error(hash, e));
        }
        if let Some(content) = read_optional(&self.text_path(hash)).await? {
            return ProgressRecord::from_legacy_text(&content)
                .map(Some)
                .map_err(|e| Self::progress_error(hash, e));
        }
        Ok(None)
    }

    /// Records `remote_path` for `hash`, adding `album` to the synced set
    ///
    /// Existing albums are kept. The record is always rewritten in the
    /// current encoding and a plain-text record is removed.
    pub async fn update(
        &self,
        hash: &ContentHash,
        remote_path: &str,
        album: Option<&str>,
    ) -> Result<ProgressRecord, MigrateError> {
        let lock = self
            .locks
            .entry(hash.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut record = match self.check(hash).await? {
            Some(existing) => ProgressRecord {
                remote_path: remote_path.to_string(),
                albums: existing.albums,
            },
            None => ProgressRecord::new(remote_path),
        };
        if let Some(album) = album {
            record.add_album(album);
        }

        let json = record.to_json().map_err(|e| Self::progress_error(hash, e))?;
        write_atomic(&self.json_path(hash), json.as_bytes())
            .await
            .map_err(|e| Self::progress_error(hash, e))?;

        match tokio::fs::remove_file(self.text_path(hash)).await {
            Ok(()) => debug!(%hash, "Removed plain-text progress record"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Self::progress_error(hash, e)),
        }

        debug!(%hash, remote_path, albums = record.albums.len(), "Progress recorded");
        Ok(record)
    }

    /// Moves a per-directory `<dir>/.progress/<filename>.txt` record into the store
    ///
    /// Returns `true` when a legacy record was adopted. The per-directory
    /// `.progress` directory is removed once it holds no more records.
    pub async fn adopt_legacy(
        &self,
        photo: &Path,
        hash: &ContentHash,
    ) -> Result<bool, MigrateError> {
        let (Some(dir), Some(filename)) = (photo.parent(), photo.file_name()) else {
            return Ok(false);
        };
        let legacy_dir = dir.join(PROGRESS_DIR);
        if legacy_dir == self.dir {
            return Ok(false);
        }

        let mut legacy_name = filename.to_os_string();
        legacy_name.push(".txt");
        let legacy_file = legacy_dir.join(legacy_name);

        let adopted = match read_optional(&legacy_file).await? {
            Some(content) => {
                let legacy = ProgressRecord::from_legacy_text(&content)
                    .map_err(|e| Self::progress_error(hash, e))?;
                self.update(hash, &legacy.remote_path, None).await?;
                tokio::fs::remove_file(&legacy_file).await?;
                info!(photo = %photo.display(), "Old progress file moved to the global progress directory");
                true
            }
            None => false,
        };

        if tokio::fs::metadata(&legacy_dir).await.is_ok() && !has_text_records(&legacy_dir).await? {
            match tokio::fs::remove_dir(&legacy_dir).await {
                Ok(()) => info!(dir = %legacy_dir.display(), "Removed old progress directory"),
                Err(e) => warn!(dir = %legacy_dir.display(), error = %e, "Could not remove old progress directory"),
            }
        }

        Ok(adopted)
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, MigrateError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn has_text_records(dir: &Path) -> Result<bool, MigrateError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.path().extension().is_some_and(|ext| ext == "txt") {
            return Ok(true);
        }
    }
    Ok(false)
}
