//! Embedded media tag port
//!
//! Low-level EXIF/video metadata extraction is delegated to an adapter that
//! returns a tag-name to string mapping for one file.

use std::collections::HashMap;
use std::path::Path;

/// Date tags consulted for the taken-time, in priority order
pub const DATE_TAGS: [&str; 3] = ["DateTimeOriginal", "DateTime", "DateTimeDigitized"];

/// Reads embedded tags from a media file
///
/// Implementations return only the tags they found. An error means the file
/// could not be inspected at all; callers treat it like an empty map.
#[async_trait::async_trait]
pub trait IMediaTagReader: Send + Sync {
    async fn read_tags(&self, path: &Path) -> anyhow::Result<HashMap<String, String>>;
}
