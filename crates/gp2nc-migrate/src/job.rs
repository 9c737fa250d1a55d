//! Directory job
//!
//! Migrates one local album directory. Files are processed strictly in
//! order; for each one the job either links an existing remote copy (the
//! content hash is in the remote index), resumes from a progress record, or
//! uploads the file into its `YYYY/MM` collection.
//!
//! Per-file failures (rejected upload, failed verification, failed album
//! copy) are logged and the job moves on. Any other failure aborts the
//! directory and leaves an error marker behind so later runs skip it until
//! somebody looks at it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gp2nc_core::domain::{
    file_name_of, ContentHash, DirectoryOutcome, DirectoryState, DirectorySummary, FileOutcome,
    LocalMediaItem, RemoteFileDescriptor, RemoteIndex,
};
use gp2nc_core::ports::UploadMetadata;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::albums::{AlbumCatalog, AlbumMembership};
use crate::dir_cache::RemoteDirectoryCache;
use crate::filesystem::{
    hash_file, list_media, read_directory_state, write_error_marker, write_migrated_marker,
};
use crate::naming::{classify_duplicate, find_available, prefixed_name, DuplicateClass};
use crate::progress::ProgressStore;
use crate::retry::Remote;
use crate::taken_time::TakenTimeResolver;
use crate::MigrateError;

/// Candidate names probed before a rename is given up
const RENAME_PROBE_LIMIT: u32 = 100;

const CONFLICT: u16 = 409;
const PRECONDITION_FAILED: u16 = 412;

/// Where a renamed remote duplicate ended up: `(path, name)`
type Renamed = Option<(String, String)>;

/// Remote duplicates renamed during this run, keyed by their indexed path
///
/// The index is built once and never updated, so jobs consult this before
/// touching an indexed file. Each entry is locked while its rename is
/// decided, which keeps two directories holding the same photo from
/// racing on one MOVE.
#[derive(Debug, Default)]
pub struct RenameLedger {
    entries: DashMap<String, Arc<Mutex<Renamed>>>,
}

impl RenameLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, indexed_path: &str) -> Arc<Mutex<Renamed>> {
        self.entries
            .entry(indexed_path.to_string())
            .or_default()
            .clone()
    }
}

/// Everything a directory job shares with its siblings
///
/// Built once before the pool starts. The index and the album catalog are
/// read-only; the caches, the rename ledger and the progress store
/// synchronize internally.
pub struct JobContext {
    pub remote: Remote,
    pub index: Arc<RemoteIndex>,
    pub renames: Arc<RenameLedger>,
    pub albums: Arc<AlbumCatalog>,
    pub dir_cache: Arc<RemoteDirectoryCache>,
    pub resolver: Arc<TakenTimeResolver>,
    pub progress: Arc<ProgressStore>,
    /// Remote collection receiving the `YYYY/MM` tree
    pub upload_base: String,
}

pub struct DirectoryJob {
    ctx: Arc<JobContext>,
}

impl DirectoryJob {
    pub fn new(ctx: Arc<JobContext>) -> Self {
        Self { ctx }
    }

    /// Migrates `dir`
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn run(&self, dir: &Path) -> DirectoryOutcome {
        match read_directory_state(dir).await {
            Ok(DirectoryState::Migrated) => {
                debug!("Directory already migrated");
                return DirectoryOutcome::AlreadyMigrated;
            }
            Ok(DirectoryState::ErrorLocked(reason)) => {
                warn!(%reason, "Skipping to prevent recurring crashes, resolve errors first and delete the error marker");
                return DirectoryOutcome::SkippedDueToError;
            }
            Ok(DirectoryState::Unvisited) => {}
            Err(e) => {
                error!(error = %e, "Could not read directory markers");
                return DirectoryOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        }

        let mut current = None;
        match self.process(dir, &mut current).await {
            Ok(summary) => {
                if summary.is_complete() {
                    if let Err(e) = write_migrated_marker(dir).await {
                        error!(error = %e, "Could not write migrated marker");
                        return DirectoryOutcome::Failed {
                            reason: e.to_string(),
                        };
                    }
                    info!(processed = summary.processed(), "Directory migrated");
                } else {
                    warn!(
                        failed = summary.failed,
                        "Some files were skipped, the directory is revisited on the next run"
                    );
                }
                DirectoryOutcome::Done(summary)
            }
            Err(e) => {
                error!(error = %e, file = ?current, "Directory aborted");
                if let Err(marker_error) = write_error_marker(dir, &e, current.as_deref()).await {
                    error!(error = %marker_error, "Could not write error marker");
                }
                DirectoryOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn process(
        &self,
        dir: &Path,
        current: &mut Option<PathBuf>,
    ) -> Result<DirectorySummary, MigrateError> {
        let items = list_media(dir).await?;
        info!(files = items.len(), "Found directory");

        let mut membership = match self.ctx.albums.album_for(dir).await? {
            Some(album) => Some(AlbumMembership::fetch(&self.ctx.remote, album).await?),
            None => None,
        };

        let total = items.len();
        let mut summary = DirectorySummary::default();
        for (position, mut item) in items.into_iter().enumerate() {
            *current = Some(item.path().to_path_buf());
            let filename = item.filename();
            debug!(file = %filename, "Photo {} of {}", position + 1, total);

            let outcome = match self.process_file(&mut item, membership.as_mut()).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_per_file() => {
                    warn!(file = %filename, error = %e, "Skipping file");
                    FileOutcome::Failed(e.to_string())
                }
                Err(e) => return Err(e),
            };
            summary.record(&filename, &outcome);
        }
        *current = None;
        Ok(summary)
    }

    async fn process_file(
        &self,
        item: &mut LocalMediaItem,
        mut membership: Option<&mut AlbumMembership>,
    ) -> Result<FileOutcome, MigrateError> {
        let hash = hash_file(item.path()).await?;
        let hash = item.record_hash(hash).clone();
        self.ctx.progress.adopt_legacy(item.path(), &hash).await?;

        if let Some(duplicates) = self.ctx.index.duplicates(&hash) {
            for duplicate in duplicates.values() {
                self.link_duplicate(item, duplicate, membership.as_deref_mut())
                    .await?;
            }
            return Ok(FileOutcome::Deduplicated);
        }

        if let Some(record) = self.ctx.progress.check(&hash).await? {
            debug!(file = %item.filename(), remote = %record.remote_path, "Found progress record");
            if let Some(membership) = membership {
                if !record.has_album(&membership.album().name) {
                    self.resume_album(&hash, &record.remote_path, membership)
                        .await?;
                }
            }
            return Ok(FileOutcome::Resumed);
        }

        self.upload_new(item, &hash, membership).await
    }

    // ------------------------------------------------------------------------
    // Dedup path
    // ------------------------------------------------------------------------

    async fn link_duplicate(
        &self,
        item: &LocalMediaItem,
        duplicate: &RemoteFileDescriptor,
        membership: Option<&mut AlbumMembership>,
    ) -> Result<(), MigrateError> {
        let local = item.filename();
        debug!(file = %local, remote = %duplicate.remote_path, "Same file already exists remotely");

        let slot = self.ctx.renames.slot(&duplicate.remote_path);
        let mut renamed = slot.lock().await;
        let (linked_path, linked_name) = match renamed.clone() {
            Some((path, name)) => {
                debug!(file = %local, remote = %path, "Remote duplicate was renamed earlier in this run");
                (path, name)
            }
            None => match classify_duplicate(&local, &duplicate.display_name) {
                DuplicateClass::AlreadyUploaded => {
                    debug!(file = %local, "Identical filename, already uploaded");
                    (duplicate.remote_path.clone(), duplicate.display_name.clone())
                }
                DuplicateClass::AcceptableDuplicate => {
                    debug!(file = %local, remote_name = %duplicate.display_name, "Remote name is acceptable, keeping it");
                    (duplicate.remote_path.clone(), duplicate.display_name.clone())
                }
                DuplicateClass::Rename => match self.rename_remote(duplicate, &local).await? {
                    Some((path, name)) => {
                        *renamed = Some((path.clone(), name.clone()));
                        (path, name)
                    }
                    None => (duplicate.remote_path.clone(), duplicate.display_name.clone()),
                },
            },
        };
        drop(renamed);

        if let Some(membership) = membership {
            membership
                .link(&self.ctx.remote, &linked_path, &duplicate.file_id, &linked_name)
                .await?;
        }
        Ok(())
    }

    /// Renames a remote duplicate after the local file
    ///
    /// Returns the new path and name, or `None` when the rename was not
    /// possible; the remote file is left untouched in that case.
    async fn rename_remote(
        &self,
        duplicate: &RemoteFileDescriptor,
        local: &str,
    ) -> Result<Option<(String, String)>, MigrateError> {
        let remote = &self.ctx.remote;
        let parent = duplicate.parent_path();

        let available = find_available(local, RENAME_PROBE_LIMIT, |candidate| {
            let path = format!("{parent}/{candidate}");
            async move { Ok::<_, MigrateError>(remote.probe(&path).await?.probe_result().exists) }
        })
        .await?;
        let Some(name) = available else {
            warn!(file = %local, remote = %duplicate.remote_path, "No free name found, rename skipped");
            return Ok(None);
        };

        let target = format!("{parent}/{name}");
        let mut response = remote
            .move_to(&duplicate.remote_path, &target, false)
            .await?;
        if response.status == CONFLICT {
            debug!(parent, "Destination parent missing, creating it");
            remote.create_collection(parent).await?;
            response = remote
                .move_to(&duplicate.remote_path, &target, false)
                .await?;
        }

        match response.status {
            PRECONDITION_FAILED => {
                warn!(file = %local, target = %target, "Rename destination already exists");
                Ok(None)
            }
            CONFLICT => {
                warn!(file = %local, target = %target, "Rename destination is not inside a collection");
                Ok(None)
            }
            status if response.is_success() => {
                info!(
                    file = %local,
                    from = %duplicate.display_name,
                    to = %name,
                    status,
                    "Remote has a very different filename, but contents are identical. Renamed remote file"
                );
                Ok(Some((target, name)))
            }
            status => {
                warn!(file = %local, target = %target, status, "Rename failed");
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Resume path
    // ------------------------------------------------------------------------

    async fn resume_album(
        &self,
        hash: &ContentHash,
        remote_path: &str,
        membership: &mut AlbumMembership,
    ) -> Result<(), MigrateError> {
        let probe = self.ctx.remote.probe(remote_path).await?;
        if probe.status != 200 {
            return Err(MigrateError::Verification {
                path: remote_path.to_string(),
                reason: format!("recorded upload answers HTTP {}", probe.status),
            });
        }
        let file_id = probe.file_id().unwrap_or_default().to_string();
        let remote_name = file_name_of(remote_path);

        membership
            .link(&self.ctx.remote, remote_path, &file_id, remote_name)
            .await?;
        self.ctx
            .progress
            .update(hash, remote_path, Some(&membership.album().name))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // New-content path
    // ------------------------------------------------------------------------

    async fn upload_new(
        &self,
        item: &mut LocalMediaItem,
        hash: &ContentHash,
        membership: Option<&mut AlbumMembership>,
    ) -> Result<FileOutcome, MigrateError> {
        let taken = self.ctx.resolver.resolve(item.path()).await?;
        let taken = item.record_taken_time(taken);
        let local = item.filename();
        debug!(file = %local, taken = %taken.format("%Y-%m-%d %H:%M:%S"), "Photo or video taken");

        let directory = self
            .ctx
            .dir_cache
            .ensure(&self.ctx.upload_base, &taken.format("%Y/%m").to_string())
            .await?;

        let mut remote_name = local.clone();
        let mut target = format!("{directory}/{remote_name}");
        let existing = self.ctx.remote.probe(&target).await?;

        let (outcome, file_id) = match existing.content_length() {
            Some(size) if existing.status == 200 && size > 0 && size == item.size() => {
                debug!(file = %local, "Same file size remotely, skipping upload");
                let file_id = existing.file_id().unwrap_or_default().to_string();
                (FileOutcome::AlreadyPresent, file_id)
            }
            Some(size) if existing.status == 200 && size > 0 => {
                remote_name = prefixed_name(&local);
                target = format!("{directory}/{remote_name}");
                info!(file = %local, remote_size = size, renamed = %remote_name, "Different file with the same name exists remotely");
                let file_id = self.upload(item, &target, taken).await?;
                (FileOutcome::Uploaded, file_id)
            }
            _ => {
                let file_id = self.upload(item, &target, taken).await?;
                (FileOutcome::Uploaded, file_id)
            }
        };

        self.ctx.progress.update(hash, &target, None).await?;

        if let Some(membership) = membership {
            debug!(file = %local, album = %membership.album().name, "Copying to album");
            membership
                .link(&self.ctx.remote, &target, &file_id, &remote_name)
                .await?;
            self.ctx
                .progress
                .update(hash, &target, Some(&membership.album().name))
                .await?;
        }
        Ok(outcome)
    }

    /// Uploads and verifies `item`, returning the remote file id
    async fn upload(
        &self,
        item: &LocalMediaItem,
        target: &str,
        taken: DateTime<Utc>,
    ) -> Result<String, MigrateError> {
        let modified = tokio::fs::metadata(item.path()).await?.modified()?;
        let metadata = UploadMetadata {
            mtime: DateTime::<Utc>::from(modified).timestamp(),
            created_at: taken.timestamp(),
            total_length: item.size(),
        };

        let response = self.ctx.remote.put(target, item.path(), &metadata).await?;
        if !response.is_success() {
            return Err(MigrateError::Upload {
                path: target.to_string(),
                reason: format!("HTTP {}", response.status),
            });
        }

        let check = self.ctx.remote.probe(target).await?;
        if check.status != 200 {
            return Err(MigrateError::Verification {
                path: target.to_string(),
                reason: format!("HEAD returned HTTP {}", check.status),
            });
        }
        match check.content_length() {
            Some(size) if size == item.size() => {}
            Some(size) => {
                return Err(MigrateError::Verification {
                    path: target.to_string(),
                    reason: format!("remote size {size} differs from local size {}", item.size()),
                })
            }
            None => {
                return Err(MigrateError::Verification {
                    path: target.to_string(),
                    reason: "missing content-length".to_string(),
                })
            }
        }

        info!(file = %item.filename(), remote = %target, "Successfully uploaded");
        Ok(check
            .file_id()
            .or_else(|| response.file_id())
            .unwrap_or_default()
            .to_string())
    }
}
