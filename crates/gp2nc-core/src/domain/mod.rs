//! Domain entities
//!
//! - Content hashes and local media items
//! - Remote file descriptors and the content-addressed remote index
//! - Albums
//! - Progress records (per content hash, with legacy format support)
//! - Directory state and job outcomes

pub mod album;
pub mod directory;
pub mod errors;
pub mod media;
pub mod progress;
pub mod remote;

pub use album::Album;
pub use directory::{DirectoryOutcome, DirectoryState, DirectorySummary, FileOutcome};
pub use errors::DomainError;
pub use media::{ContentHash, LocalMediaItem};
pub use progress::ProgressRecord;
pub use remote::{file_name_of, parent_of, RemoteFileDescriptor, RemoteIndex};
