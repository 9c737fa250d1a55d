//! Progress records: proof that a content hash was uploaded
//!
//! One record exists per content hash. Three on-disk encodings are read:
//!
//! - current: `{"remotePath": "...", "albums": ["..."]}`
//! - tuple: `["<remote path>", ["album", ...]]`; older writers sometimes
//!   emitted the album list as an index-keyed object instead of an array
//! - plain text: the remote path alone, with no album information
//!
//! Only the current encoding is ever written.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Remote location of an uploaded hash and the albums it is linked into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub remote_path: String,
    #[serde(default)]
    pub albums: BTreeSet<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecord {
    Current(ProgressRecord),
    Tuple(String, AlbumList),
    PathOnly((String,)),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AlbumList {
    List(Vec<String>),
    Keyed(BTreeMap<String, String>),
}

impl ProgressRecord {
    pub fn new(remote_path: impl Into<String>) -> Self {
        Self {
            remote_path: remote_path.into(),
            albums: BTreeSet::new(),
        }
    }

    /// Decodes a `.json` record in the current or tuple encoding
    ///
    /// # Errors
    /// Returns error if the content matches no known encoding
    pub fn from_json(content: &str) -> Result<Self, DomainError> {
        let stored: StoredRecord = serde_json::from_str(content)
            .map_err(|e| DomainError::InvalidProgressRecord(e.to_string()))?;
        let record = match stored {
            StoredRecord::Current(record) => record,
            StoredRecord::Tuple(remote_path, albums) => Self {
                remote_path,
                albums: match albums {
                    AlbumList::List(list) => list.into_iter().collect(),
                    AlbumList::Keyed(map) => map.into_values().collect(),
                },
            },
            StoredRecord::PathOnly((remote_path,)) => Self::new(remote_path),
        };
        if record.remote_path.is_empty() {
            return Err(DomainError::InvalidProgressRecord(
                "empty remote path".to_string(),
            ));
        }
        Ok(record)
    }

    /// Decodes a legacy plain-text record (remote path only)
    ///
    /// # Errors
    /// Returns error if the file holds no path
    pub fn from_legacy_text(content: &str) -> Result<Self, DomainError> {
        let path = content.trim();
        if path.is_empty() {
            return Err(DomainError::InvalidProgressRecord(
                "empty legacy record".to_string(),
            ));
        }
        Ok(Self::new(path))
    }

    /// Encodes the record in the current format
    ///
    /// # Errors
    /// Returns error for a record without a remote path, which could not be
    /// read back
    pub fn to_json(&self) -> Result<String, DomainError> {
        if self.remote_path.is_empty() {
            return Err(DomainError::InvalidProgressRecord(
                "empty remote path".to_string(),
            ));
        }
        serde_json::to_string(self).map_err(|e| DomainError::InvalidProgressRecord(e.to_string()))
    }

    pub fn has_album(&self, album: &str) -> bool {
        self.albums.contains(album)
    }

    /// Adds `album` to the synced set; returns `true` when it was new
    pub fn add_album(&mut self, album: impl Into<String>) -> bool {
        self.albums.insert(album.into())
    }
}
