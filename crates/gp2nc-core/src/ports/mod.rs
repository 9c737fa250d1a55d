//! Port definitions (hexagonal architecture interfaces)
//!
//! - [`IRemoteStore`] - WebDAV-like remote store (probe, list, create, put, copy, move)
//! - [`IMediaTagReader`] - embedded date tags of a media file

pub mod media_tags;
pub mod remote_store;

pub use media_tags::{IMediaTagReader, DATE_TAGS};
pub use remote_store::{
    IRemoteStore, ProbeResult, RemoteEntry, RemoteError, RemoteResponse, UploadMetadata,
};
