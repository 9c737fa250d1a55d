//! Remote store port (driven/secondary port)
//!
//! This module defines the interface for talking to the remote WebDAV-style
//! store. All paths handed to and returned by the port are absolute,
//! *decoded* URL paths (for example
//! `/remote.php/dav/files/alice/Photos/2020/01/my photo.jpg`); the adapter
//! percent-encodes them and joins them to the server origin.
//!
//! ## Design Notes
//!
//! - Every operation returns a uniform [`RemoteResponse`] (status, headers,
//!   optional body) except `list`, which already parses the multi-status body.
//! - Non-success HTTP statuses are *not* errors at this level; callers decide
//!   what a 404 or a 412 means. Only transport failures and unparseable
//!   responses surface as [`RemoteError`].

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Responses
// ============================================================================

/// Uniform response from a remote operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, names lowercased
    pub headers: HashMap<String, Vec<String>>,
    /// Response body, when the operation returns one
    pub body: Option<Vec<u8>>,
}

impl RemoteResponse {
    /// Creates a response with no headers and no body
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Adds a header value (builder style)
    pub fn header_value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    /// Sets the body (builder style)
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Status is within 200-399
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// First value of a header, looked up case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Parsed `Content-Length` header
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|value| value.trim().parse().ok())
    }

    /// Server-side file identifier (`OC-FileId`)
    pub fn file_id(&self) -> Option<&str> {
        self.header("oc-fileid")
    }

    /// Interprets this response as the answer to an existence probe
    pub fn probe_result(&self) -> ProbeResult {
        ProbeResult {
            exists: !self.is_not_found(),
            size: self.content_length(),
            file_id: self.file_id().map(str::to_string),
        }
    }
}

/// Outcome of a lightweight existence probe
///
/// Anything but a 404 counts as existing; callers that need the entry to be
/// readable check the status as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub exists: bool,
    pub size: Option<u64>,
    pub file_id: Option<String>,
}

/// One entry of a collection listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Absolute decoded URL path of the entry, without a trailing slash
    pub path: String,
    /// Display name (decoded file or collection name)
    pub display_name: String,
    /// Content length in bytes (None for collections)
    pub size: Option<u64>,
    pub content_type: Option<String>,
    /// Raw checksum list, e.g. `SHA1:... MD5:...`
    pub checksums: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub file_id: Option<String>,
    pub is_collection: bool,
}

impl RemoteEntry {
    /// The MD5 digest from the checksum list, lowercased
    pub fn md5_checksum(&self) -> Option<String> {
        self.checksums.as_deref().and_then(|list| {
            list.split_whitespace().find_map(|token| {
                let (kind, value) = token.split_once(':')?;
                kind.eq_ignore_ascii_case("md5")
                    .then(|| value.to_ascii_lowercase())
            })
        })
    }
}

/// Metadata sent along with an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadMetadata {
    /// Modification time, seconds since the epoch (`X-OC-MTime`)
    pub mtime: i64,
    /// Creation time, seconds since the epoch (`X-OC-CTime`)
    pub created_at: i64,
    /// Total length in bytes (`OC-Total-Length`)
    pub total_length: u64,
}

// ============================================================================
// Errors
// ============================================================================

/// Failures that prevent a remote operation from producing a response
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network-level failure (connection refused, reset, timeout, DNS)
    #[error("transport error: {0}")]
    Transport(String),

    /// The operation needed a specific status and got another
    #[error("{operation} {path} returned HTTP {status}")]
    UnexpectedStatus {
        operation: &'static str,
        path: String,
        status: u16,
    },

    /// The server answered but the body could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A local file involved in the request could not be read
    #[error("local I/O error: {0}")]
    LocalIo(#[from] std::io::Error),
}

impl RemoteError {
    /// Whether retrying the operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for the remote store
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Lightweight existence probe (HEAD)
    async fn probe(&self, path: &str) -> Result<RemoteResponse, RemoteError>;

    /// Downloads an entry (GET); the body holds the content
    async fn get(&self, path: &str) -> Result<RemoteResponse, RemoteError>;

    /// Lists a collection to the given depth (PROPFIND)
    ///
    /// The entry for `path` itself is excluded from the result.
    async fn list(&self, path: &str, depth: u8) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Creates a single collection (MKCOL)
    async fn create_collection(&self, path: &str) -> Result<RemoteResponse, RemoteError>;

    /// Streams a local file to `path` (PUT)
    async fn put(
        &self,
        path: &str,
        source: &Path,
        metadata: &UploadMetadata,
    ) -> Result<RemoteResponse, RemoteError>;

    /// Server-side copy (COPY)
    async fn copy(&self, source: &str, destination: &str) -> Result<RemoteResponse, RemoteError>;

    /// Server-side move (MOVE)
    async fn move_to(
        &self,
        source: &str,
        destination: &str,
        overwrite: bool,
    ) -> Result<RemoteResponse, RemoteError>;
}
