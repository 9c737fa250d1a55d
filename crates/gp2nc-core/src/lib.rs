//! gp2nc Core - Domain types and boundaries for the photo migrator
//!
//! This crate holds everything the migration engine and its adapters agree on:
//! - **Domain types** - `ContentHash`, `LocalMediaItem`, `RemoteFileDescriptor`,
//!   `RemoteIndex`, `Album`, `ProgressRecord`, `DirectoryState`
//! - **Port definitions** - `IRemoteStore` (WebDAV-like remote) and
//!   `IMediaTagReader` (embedded date tags)
//! - **Configuration** - the YAML configuration file and its validation
//!
//! # Architecture
//!
//! The domain module has no I/O. Ports are traits implemented by adapter
//! crates (`gp2nc-dav`) or by the engine itself (`gp2nc-migrate`).

pub mod config;
pub mod domain;
pub mod ports;
