//! Local media items and their content hashes

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// MD5 digest of a file's full content, as 32 lowercase hex digits
///
/// This is the deduplication key: local files and remote files with the same
/// `ContentHash` are treated as the same photo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Length of an MD5 digest in hex digits
    const HEX_LEN: usize = 32;

    /// Create a new ContentHash, normalising to lowercase
    ///
    /// # Errors
    /// Returns error if the value is not 32 hex digits
    pub fn new(hash: String) -> Result<Self, DomainError> {
        if hash.len() != Self::HEX_LEN || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(hash));
        }
        Ok(Self(hash.to_ascii_lowercase()))
    }

    /// Build a hash from raw digest bytes
    #[must_use]
    pub fn from_digest(digest: [u8; 16]) -> Self {
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex)
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

/// A media file discovered in a local album directory
///
/// Owned by the directory job that discovered it. The content hash and the
/// taken-time are recorded at most once per run; later attempts to record a
/// different value are ignored.
#[derive(Debug, Clone)]
pub struct LocalMediaItem {
    path: PathBuf,
    size: u64,
    hash: Option<ContentHash>,
    taken_time: Option<DateTime<Utc>>,
}

impl LocalMediaItem {
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            hash: None,
            taken_time: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name as it will appear remotely
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn hash(&self) -> Option<&ContentHash> {
        self.hash.as_ref()
    }

    /// Records the content hash; a hash already recorded is kept.
    pub fn record_hash(&mut self, hash: ContentHash) -> &ContentHash {
        self.hash.get_or_insert(hash)
    }

    pub fn taken_time(&self) -> Option<DateTime<Utc>> {
        self.taken_time
    }

    pub fn record_taken_time(&mut self, taken: DateTime<Utc>) -> DateTime<Utc> {
        *self.taken_time.get_or_insert(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_accepts_md5_hex() {
        let hash = ContentHash::new("D41D8CD98F00B204E9800998ECF8427E".to_string()).unwrap();
        assert_eq!(hash.as_str(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_content_hash_rejects_wrong_length() {
        assert!(ContentHash::new("abc".to_string()).is_err());
    }

    #[test]
    fn test_content_hash_rejects_non_hex() {
        assert!(ContentHash::new("z".repeat(32)).is_err());
    }

    #[test]
    fn test_from_digest() {
        let hash = ContentHash::from_digest([0xab; 16]);
        assert_eq!(hash.as_str(), "ab".repeat(16));
    }

    #[test]
    fn test_serde_roundtrip() {
        let hash: ContentHash = "0123456789abcdef0123456789abcdef".parse().unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, "\"0123456789abcdef0123456789abcdef\"");
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_media_item_hash_is_recorded_once() {
        let mut item = LocalMediaItem::new(PathBuf::from("/takeout/Trip/IMG_1.jpg"), 10);
        let first = ContentHash::from_digest([1; 16]);
        let second = ContentHash::from_digest([2; 16]);

        item.record_hash(first.clone());
        item.record_hash(second);

        assert_eq!(item.hash(), Some(&first));
        assert_eq!(item.filename(), "IMG_1.jpg");
        assert_eq!(item.size(), 10);
    }

    #[test]
    fn test_media_item_taken_time_is_memoized() {
        let mut item = LocalMediaItem::new(PathBuf::from("a.jpg"), 1);
        let t1 = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        let t2 = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        assert_eq!(item.record_taken_time(t1), t1);
        assert_eq!(item.record_taken_time(t2), t1);
    }
}
