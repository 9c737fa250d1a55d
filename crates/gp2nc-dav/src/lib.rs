//! gp2nc DAV - Nextcloud WebDAV client
//!
//! Provides the async adapter behind the `IRemoteStore` port:
//! - HTTP basic authentication against `<origin>/remote.php/dav`
//! - Existence probes, downloads, collection listings and creation
//! - Streamed uploads carrying Nextcloud timestamp headers
//! - Server-side copy and move
//!
//! ## Modules
//!
//! - [`client`] - HTTP client, URL construction and the `IRemoteStore` implementation
//! - [`multistatus`] - PROPFIND request body and multi-status response parsing

pub mod client;
pub mod multistatus;

pub use client::DavClient;

use thiserror::Error;

/// Errors raised while setting up or decoding DAV exchanges
#[derive(Debug, Error)]
pub enum DavError {
    /// The server URL could not be parsed or is not http(s)
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// A multi-status body was malformed
    #[error("Invalid multistatus response: {0}")]
    InvalidResponse(String),
}
