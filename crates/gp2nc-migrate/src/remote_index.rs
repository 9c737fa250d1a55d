//! Remote content-hash index
//!
//! Built once before any directory is processed. A listing failure aborts
//! the run: a file missing from the index would be uploaded again.

use std::collections::VecDeque;

use async_trait::async_trait;
use gp2nc_core::config::FingerprintMode;
use gp2nc_core::domain::{ContentHash, RemoteFileDescriptor, RemoteIndex};
use gp2nc_core::ports::{RemoteEntry, RemoteError};
use tracing::{debug, info, instrument, warn};

use crate::retry::Remote;
use crate::MigrateError;

// ============================================================================
// Fingerprint policies
// ============================================================================

/// How the content hash of a remote file is obtained
#[async_trait]
pub trait FingerprintPolicy: Send + Sync {
    /// MD5 of the remote file, or `None` when this policy cannot tell
    async fn fingerprint(
        &self,
        remote: &Remote,
        entry: &RemoteEntry,
    ) -> Result<Option<ContentHash>, MigrateError>;
}

fn server_checksum(entry: &RemoteEntry) -> Option<ContentHash> {
    let checksum = entry.md5_checksum()?;
    match ContentHash::new(checksum) {
        Ok(hash) => Some(hash),
        Err(e) => {
            warn!(path = %entry.path, error = %e, "Ignoring malformed server checksum");
            None
        }
    }
}

/// Uses the server-provided MD5 checksum only
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumOnly;

#[async_trait]
impl FingerprintPolicy for ChecksumOnly {
    async fn fingerprint(
        &self,
        _remote: &Remote,
        entry: &RemoteEntry,
    ) -> Result<Option<ContentHash>, MigrateError> {
        Ok(server_checksum(entry))
    }
}

/// Uses the server checksum, downloading and hashing files without one
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumOrDownload;

#[async_trait]
impl FingerprintPolicy for ChecksumOrDownload {
    async fn fingerprint(
        &self,
        remote: &Remote,
        entry: &RemoteEntry,
    ) -> Result<Option<ContentHash>, MigrateError> {
        if let Some(hash) = server_checksum(entry) {
            return Ok(Some(hash));
        }

        debug!(path = %entry.path, "No server checksum, downloading");
        let response = remote.get(&entry.path).await?;
        if response.status != 200 {
            return Err(RemoteError::UnexpectedStatus {
                operation: "GET",
                path: entry.path.clone(),
                status: response.status,
            }
            .into());
        }
        let body = response.body.unwrap_or_default();
        Ok(Some(ContentHash::from_digest(md5::compute(&body).0)))
    }
}

/// Policy for the configured fingerprint mode
pub fn policy_for(mode: FingerprintMode) -> Box<dyn FingerprintPolicy> {
    match mode {
        FingerprintMode::ChecksumOnly => Box::new(ChecksumOnly),
        FingerprintMode::ChecksumOrDownload => Box::new(ChecksumOrDownload),
    }
}

// ============================================================================
// RemoteIndexBuilder
// ============================================================================

pub struct RemoteIndexBuilder {
    remote: Remote,
    policy: Box<dyn FingerprintPolicy>,
}

impl RemoteIndexBuilder {
    pub fn new(remote: Remote, policy: Box<dyn FingerprintPolicy>) -> Self {
        Self { remote, policy }
    }

    /// Indexes every file up to `depth` levels below `root`
    #[instrument(skip(self))]
    pub async fn build(&self, root: &str, depth: u8) -> Result<RemoteIndex, MigrateError> {
        let mut index = RemoteIndex::new();
        let mut pending = VecDeque::from([(root.to_string(), 1u8)]);
        let mut skipped = 0usize;

        while let Some((collection, level)) = pending.pop_front() {
            let entries = self.remote.list(&collection, 1).await?;
            debug!(collection = %collection, entries = entries.len(), "Listed remote collection");

            for entry in entries {
                if entry.is_collection {
                    if level < depth {
                        pending.push_back((entry.path.clone(), level + 1));
                    }
                    continue;
                }

                let size = entry.size.unwrap_or(0);
                if size == 0 {
                    debug!(path = %entry.path, "Skipping empty remote file");
                    skipped += 1;
                    continue;
                }

                let Some(hash) = self.policy.fingerprint(&self.remote, &entry).await? else {
                    warn!(path = %entry.path, "No fingerprint available, file not indexed");
                    skipped += 1;
                    continue;
                };

                index.insert(
                    hash,
                    RemoteFileDescriptor {
                        remote_path: entry.path.clone(),
                        file_id: entry.file_id.clone().unwrap_or_default(),
                        size,
                        display_name: entry.display_name.clone(),
                    },
                );
            }
        }

        info!(
            hashes = index.len(),
            files = index.file_count(),
            skipped,
            "Remote index built"
        );
        Ok(index)
    }
}
