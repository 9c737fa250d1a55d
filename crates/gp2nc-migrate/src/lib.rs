//! gp2nc Migrate - Google Photos export to Nextcloud migration engine
//!
//! Provides:
//! - Content-hash dedup against a remote index built once per run
//! - Taken-time resolution (sidecar JSON, embedded tags, mtime)
//! - Resumable progress tracking keyed by content hash
//! - Per-directory crash containment with marker files
//! - Album mirroring and a bounded worker pool
//!
//! ## Modules
//!
//! - [`retry`] - Fixed-delay retry policy and the retrying remote facade
//! - [`dir_cache`] - Memoized remote `YYYY/MM` directory creation
//! - [`taken_time`] - Taken-time fallback chain
//! - [`filesystem`] - Local export walking, hashing and marker files
//! - [`progress`] - Progress store under `<root>/.progress`
//! - [`remote_index`] - Remote content-hash index
//! - [`naming`] - Filename increment heuristics
//! - [`albums`] - Declared user albums and album membership
//! - [`job`] - Per-directory job
//! - [`pool`] - Bounded-concurrency execution of directory jobs
//! - [`migrator`] - End-to-end orchestration
//! - [`exiftool`] - Embedded tag reader backed by `exiftool`

pub mod albums;
pub mod dir_cache;
pub mod exiftool;
pub mod filesystem;
pub mod job;
pub mod migrator;
pub mod naming;
pub mod pool;
pub mod progress;
pub mod remote_index;
pub mod retry;
pub mod taken_time;

#[cfg(test)]
pub(crate) mod testing;

use gp2nc_core::domain::DomainError;
use gp2nc_core::ports::RemoteError;
use thiserror::Error;

/// Errors that can occur while migrating
#[derive(Debug, Error)]
pub enum MigrateError {
    /// A remote `YYYY/MM` directory could not be created
    #[error("Failed creating remote directory {path}: {reason}")]
    DirectoryCreation { path: String, reason: String },

    /// A progress record could not be read or written
    #[error("Progress store error for {hash}: {reason}")]
    Progress { hash: String, reason: String },

    /// The server rejected an upload
    #[error("Upload of {path} failed: {reason}")]
    Upload { path: String, reason: String },

    /// The uploaded object does not match the local file
    #[error("Could not validate remote file {path}: {reason}")]
    Verification { path: String, reason: String },

    /// Linking a file into an album failed
    #[error("Copy of {path} into album {album} failed with HTTP {status}")]
    AlbumLink {
        path: String,
        album: String,
        status: u16,
    },

    /// Local metadata could not be read
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// An I/O error occurred during local file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A remote call failed (transport exhausted or unexpected status)
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A domain-level error propagated from gp2nc-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl MigrateError {
    /// Whether the failure only concerns the file being processed
    ///
    /// Per-file failures are logged and the directory continues with its
    /// next file; every other failure aborts the directory.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            MigrateError::Upload { .. }
                | MigrateError::Verification { .. }
                | MigrateError::AlbumLink { .. }
        )
    }
}
