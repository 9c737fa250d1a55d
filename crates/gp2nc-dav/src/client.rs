//! Nextcloud WebDAV client
//!
//! Wraps `reqwest::Client` with basic authentication and URL construction
//! for the Nextcloud DAV endpoints, and implements the [`IRemoteStore`] port.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gp2nc_core::ports::IRemoteStore;
//! use gp2nc_dav::DavClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DavClient::new("https://cloud.example.org", "alice", "app-password")?;
//! let listing = client.list(&client.files_base(), 1).await?;
//! println!("{} entries", listing.len());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Body, Client, Method, RequestBuilder};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use url::Url;

use gp2nc_core::domain::file_name_of;
use gp2nc_core::ports::{IRemoteStore, RemoteEntry, RemoteError, RemoteResponse, UploadMetadata};

use crate::multistatus::{self, RawEntry, PROPFIND_BODY};
use crate::DavError;

/// DAV root below the server origin
const DAV_ROOT: &str = "/remote.php/dav";

/// HTTP methods WebDAV adds on top of the standard set
#[derive(Debug, Clone)]
struct DavMethods {
    propfind: Method,
    mkcol: Method,
    copy: Method,
    move_: Method,
}

impl DavMethods {
    fn new() -> Result<Self, DavError> {
        let parse = |name: &str| {
            Method::from_bytes(name.as_bytes())
                .map_err(|e| DavError::InvalidResponse(format!("method {name}: {e}")))
        };
        Ok(Self {
            propfind: parse("PROPFIND")?,
            mkcol: parse("MKCOL")?,
            copy: parse("COPY")?,
            move_: parse("MOVE")?,
        })
    }
}

// ============================================================================
// DavClient
// ============================================================================

/// HTTP client for the Nextcloud DAV endpoints
///
/// Paths accepted and returned by this client are absolute and decoded, e.g.
/// `/remote.php/dav/files/alice/Photos/2020/01/my photo.jpg`. Each segment
/// is percent-encoded when the request URL is built.
#[derive(Debug, Clone)]
pub struct DavClient {
    client: Client,
    /// `scheme://host[:port]` plus any path prefix, without trailing slash
    origin: String,
    /// Path prefix of the origin (non-empty when Nextcloud lives in a subdirectory)
    prefix: String,
    user: String,
    password: String,
    methods: DavMethods,
}

impl DavClient {
    /// Creates a client for the server at `origin`
    ///
    /// # Arguments
    /// * `origin` - Server URL, e.g. `https://cloud.example.org` or `http://host/nextcloud`
    /// * `user` - Login name
    /// * `password` - Login or app password
    pub fn new(
        origin: &str,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, DavError> {
        let parsed = Url::parse(origin).map_err(|e| DavError::InvalidUrl(format!("{origin}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(DavError::InvalidUrl(format!(
                "{origin}: expected an http(s) URL with a host"
            )));
        }

        let prefix = parsed.path().trim_end_matches('/').to_string();
        let authority = match parsed.port() {
            Some(port) => format!("{}:{}", parsed.host_str().unwrap_or_default(), port),
            None => parsed.host_str().unwrap_or_default().to_string(),
        };

        Ok(Self {
            client: Client::builder().build()?,
            origin: format!("{}://{}{}", parsed.scheme(), authority, prefix),
            prefix,
            user: user.into(),
            password: password.into(),
            methods: DavMethods::new()?,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Root of the user's files, e.g. `/remote.php/dav/files/alice`
    pub fn files_base(&self) -> String {
        format!("{DAV_ROOT}/files/{}", self.user)
    }

    /// Root of the user's photo albums, e.g. `/remote.php/dav/photos/alice/albums`
    pub fn albums_base(&self) -> String {
        format!("{DAV_ROOT}/photos/{}/albums", self.user)
    }

    /// Absolute, percent-encoded URL for a decoded path
    pub fn url_for(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.origin, encoded.join("/"))
    }

    /// Decoded absolute path for an href returned by the server
    ///
    /// Strips the origin's path prefix and any trailing slash.
    pub fn path_from_href(&self, href: &str) -> String {
        let raw = match Url::parse(href) {
            Ok(url) => url.path().to_string(),
            Err(_) => href.to_string(),
        };
        let raw = raw.strip_prefix(self.prefix.as_str()).unwrap_or(&raw);

        let decoded: Vec<String> = raw
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| match urlencoding::decode(segment) {
                Ok(value) => value.into_owned(),
                Err(_) => segment.to_string(),
            })
            .collect();
        format!("/{}", decoded.join("/"))
    }

    /// Creates an authenticated request builder for the given method and path
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url_for(path))
            .basic_auth(&self.user, Some(&self.password))
    }

    /// Sends a request and collects status, headers and body
    ///
    /// Only failures that produce no status at all become errors.
    async fn send(
        &self,
        operation: &'static str,
        path: &str,
        request: RequestBuilder,
    ) -> Result<RemoteResponse, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(format!("{operation} {path}: {e}")))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transport(format!("{operation} {path}: reading body: {e}")))?;

        debug!(operation, path, status, "DAV request completed");

        Ok(RemoteResponse {
            status,
            headers,
            body: (!body.is_empty()).then(|| body.to_vec()),
        })
    }

    fn to_entry(&self, raw: RawEntry) -> RemoteEntry {
        let path = self.path_from_href(&raw.href);
        let props = raw.props;
        let display_name = props
            .display_name
            .unwrap_or_else(|| file_name_of(&path).to_string());
        let checksums = (!props.checksums.is_empty()).then(|| props.checksums.join(" "));
        let created_at = props
            .creation_time
            .filter(|secs| *secs > 0)
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

        RemoteEntry {
            path,
            display_name,
            size: if props.is_collection { None } else { props.content_length },
            content_type: props.content_type,
            checksums,
            created_at,
            file_id: props.file_id,
            is_collection: props.is_collection,
        }
    }
}

fn collect_headers(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut collected: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            collected
                .entry(name.as_str().to_ascii_lowercase())
                .or_default()
                .push(value.to_string());
        }
    }
    collected
}

// ============================================================================
// IRemoteStore implementation
// ============================================================================

#[async_trait]
impl IRemoteStore for DavClient {
    async fn probe(&self, path: &str) -> Result<RemoteResponse, RemoteError> {
        self.send("HEAD", path, self.request(Method::HEAD, path)).await
    }

    async fn get(&self, path: &str) -> Result<RemoteResponse, RemoteError> {
        self.send("GET", path, self.request(Method::GET, path)).await
    }

    async fn list(&self, path: &str, depth: u8) -> Result<Vec<RemoteEntry>, RemoteError> {
        let request = self
            .request(self.methods.propfind.clone(), path)
            .header("Depth", depth.to_string())
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(PROPFIND_BODY);
        let response = self.send("PROPFIND", path, request).await?;

        if response.status != 207 {
            return Err(RemoteError::UnexpectedStatus {
                operation: "PROPFIND",
                path: path.to_string(),
                status: response.status,
            });
        }

        let body = response.body.unwrap_or_default();
        let raw_entries =
            multistatus::parse(&body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))?;

        let own_path = self.path_from_href(path);
        let entries: Vec<RemoteEntry> = raw_entries
            .into_iter()
            .map(|raw| self.to_entry(raw))
            .filter(|entry| entry.path != own_path)
            .collect();

        debug!(path, depth, count = entries.len(), "Listed collection");
        Ok(entries)
    }

    async fn create_collection(&self, path: &str) -> Result<RemoteResponse, RemoteError> {
        self.send("MKCOL", path, self.request(self.methods.mkcol.clone(), path))
            .await
    }

    async fn put(
        &self,
        path: &str,
        source: &Path,
        metadata: &UploadMetadata,
    ) -> Result<RemoteResponse, RemoteError> {
        let file = tokio::fs::File::open(source).await?;
        let body = Body::wrap_stream(ReaderStream::new(file));

        let request = self
            .request(Method::PUT, path)
            .header("X-OC-MTime", metadata.mtime.to_string())
            .header("X-OC-CTime", metadata.created_at.to_string())
            .header("OC-Total-Length", metadata.total_length.to_string())
            .body(body);

        let response = self.send("PUT", path, request).await?;
        if !response.is_success() {
            warn!(path, status = response.status, "Upload rejected");
        }
        Ok(response)
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<RemoteResponse, RemoteError> {
        let request = self
            .request(self.methods.copy.clone(), source)
            .header("Destination", self.url_for(destination))
            .header("Overwrite", "T");
        self.send("COPY", source, request).await
    }

    async fn move_to(
        &self,
        source: &str,
        destination: &str,
        overwrite: bool,
    ) -> Result<RemoteResponse, RemoteError> {
        let request = self
            .request(self.methods.move_.clone(), source)
            .header("Destination", self.url_for(destination))
            .header("Overwrite", if overwrite { "T" } else { "F" });
        self.send("MOVE", source, request).await
    }
}
