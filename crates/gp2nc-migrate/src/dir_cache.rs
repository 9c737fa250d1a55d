//! Memoized remote directory creation
//!
//! Directory jobs running in parallel ask for the same `YYYY/MM` collections
//! over and over. [`RemoteDirectoryCache`] remembers, per full remote path,
//! whether the path is available. Each path has its own async mutex so two
//! jobs never create the same collection at the same time, while unrelated
//! paths proceed independently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::retry::Remote;
use crate::MigrateError;

/// MKCOL answer when the collection already exists
const METHOD_NOT_ALLOWED: u16 = 405;

/// Per-path memo: `None` until the first attempt finishes
type Slot = Arc<Mutex<Option<bool>>>;

pub struct RemoteDirectoryCache {
    remote: Remote,
    entries: DashMap<String, Slot>,
}

impl RemoteDirectoryCache {
    pub fn new(remote: Remote) -> Self {
        Self {
            remote,
            entries: DashMap::new(),
        }
    }

    /// Makes sure `base/relative` exists remotely and returns the full path
    ///
    /// `base` must already exist. Segments of `relative` are created root to
    /// leaf. A failure is remembered: later calls for the same path fail
    /// without touching the remote.
    pub async fn ensure(&self, base: &str, relative: &str) -> Result<String, MigrateError> {
        let base = base.trim_end_matches('/');
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        let full = if segments.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{}", segments.join("/"))
        };

        // Clone the slot out so no map guard is held across an await.
        let slot = self
            .entries
            .entry(full.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();
        let mut state = slot.lock().await;

        match *state {
            Some(true) => return Ok(full),
            Some(false) => {
                return Err(MigrateError::DirectoryCreation {
                    path: full,
                    reason: "creation failed earlier in this run".to_string(),
                })
            }
            None => {}
        }

        let result = self.create(base, &segments, &full).await;
        *state = Some(result.is_ok());
        result.map(|()| full)
    }

    async fn create(&self, base: &str, segments: &[&str], full: &str) -> Result<(), MigrateError> {
        if !self.remote.probe(full).await?.is_not_found() {
            debug!(path = full, "Remote directory already exists");
            return Ok(());
        }

        let mut creating = base.to_string();
        for segment in segments {
            creating.push('/');
            creating.push_str(segment);

            if !self.remote.probe(&creating).await?.is_not_found() {
                continue;
            }

            let response = self.remote.create_collection(&creating).await?;
            if response.is_success() || response.status == METHOD_NOT_ALLOWED {
                info!(path = %creating, status = response.status, "Remote directory created");
                continue;
            }

            warn!(path = %creating, status = response.status, "Remote directory creation failed");
            return Err(MigrateError::DirectoryCreation {
                path: full.to_string(),
                reason: format!("MKCOL {creating} returned HTTP {}", response.status),
            });
        }
        Ok(())
    }
}
