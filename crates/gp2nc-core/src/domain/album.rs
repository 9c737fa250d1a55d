//! Albums mirrored from local directories

use serde::{Deserialize, Serialize};

/// A named remote collection that receives copies of a directory's media
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Album {
    /// Album name as declared by the export
    pub name: String,
    /// Remote collection path of the album
    pub remote_path: String,
}

impl Album {
    pub fn new(name: impl Into<String>, remote_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote_path: remote_path.into(),
        }
    }

    /// Membership key the photos app uses inside an album collection
    ///
    /// Album members are exposed as `<fileId>-<filename>`.
    pub fn membership_key(file_id: &str, filename: &str) -> String {
        format!("{file_id}-{filename}")
    }

    /// Remote path a copy of `filename` gets inside this album
    pub fn member_path(&self, filename: &str) -> String {
        format!("{}/{}", self.remote_path, filename)
    }
}
