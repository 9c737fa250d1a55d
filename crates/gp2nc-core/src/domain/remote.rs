//! Remote file descriptors and the content-addressed remote index

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::media::ContentHash;

/// Last segment of a decoded remote path, ignoring a trailing `/`
pub fn file_name_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Remote path of the collection holding `path`
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// A file that already exists in the remote store
///
/// Produced once by the index builder; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileDescriptor {
    /// Full decoded remote path
    pub remote_path: String,
    /// Server-side file identifier (`oc:fileid`)
    pub file_id: String,
    /// Size in bytes, never zero for indexed files
    pub size: u64,
    /// Decoded file name
    pub display_name: String,
}

impl RemoteFileDescriptor {
    /// Remote path of the collection holding this file
    pub fn parent_path(&self) -> &str {
        parent_of(&self.remote_path)
    }
}

/// Content hash to remote duplicates
///
/// Several remote files may share a hash (true duplicates); they are kept
/// ordered by remote path. Zero-length files are never indexed.
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    entries: HashMap<ContentHash, BTreeMap<String, RemoteFileDescriptor>>,
}

impl RemoteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor under `hash`.
    ///
    /// Returns `false` (and indexes nothing) for zero-length files.
    pub fn insert(&mut self, hash: ContentHash, descriptor: RemoteFileDescriptor) -> bool {
        if descriptor.size == 0 {
            return false;
        }
        self.entries
            .entry(hash)
            .or_default()
            .insert(descriptor.remote_path.clone(), descriptor);
        true
    }

    /// Remote duplicates for `hash`, ordered by remote path
    pub fn duplicates(&self, hash: &ContentHash) -> Option<&BTreeMap<String, RemoteFileDescriptor>> {
        self.entries.get(hash)
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Number of distinct hashes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of indexed remote files
    pub fn file_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }
}
