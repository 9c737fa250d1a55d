//! Declared user albums and per-job album membership
//!
//! The export lists the user's own albums in
//! `user-generated-memory-titles.json` as `{"title": [..]}`. Those albums are
//! created remotely once per run; a local directory is an album when its name
//! (or the `title` in its metadata) is one of them.

use std::collections::{BTreeSet, HashSet};
use std::io::ErrorKind;
use std::path::Path;

use gp2nc_core::domain::{file_name_of, Album};
use serde::Deserialize;
use tracing::{debug, info};

use crate::filesystem::directory_title;
use crate::retry::Remote;
use crate::MigrateError;

/// MKCOL answer when the collection already exists
const METHOD_NOT_ALLOWED: u16 = 405;

#[derive(Debug, Deserialize)]
struct AlbumTitles {
    #[serde(default)]
    title: Vec<String>,
}

// ============================================================================
// AlbumCatalog
// ============================================================================

/// The user albums declared by the export
#[derive(Debug, Clone, Default)]
pub struct AlbumCatalog {
    names: BTreeSet<String>,
    albums_base: String,
}

impl AlbumCatalog {
    pub fn new(names: impl IntoIterator<Item = String>, albums_base: impl Into<String>) -> Self {
        Self {
            names: names.into_iter().collect(),
            albums_base: albums_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Reads `<root>/<albums_file>`; a missing file declares no albums
    pub async fn load(
        root: &Path,
        albums_file: &str,
        albums_base: &str,
    ) -> Result<Self, MigrateError> {
        let path = root.join(albums_file);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No user albums declared");
                return Ok(Self::new(Vec::new(), albums_base));
            }
            Err(e) => return Err(e.into()),
        };
        let titles: AlbumTitles = serde_json::from_str(&content)
            .map_err(|e| MigrateError::Metadata(format!("{}: {e}", path.display())))?;

        let catalog = Self::new(titles.title, albums_base);
        info!(albums = catalog.len(), "Found user albums");
        Ok(catalog)
    }

    /// Loads the declared albums and creates the ones missing remotely
    pub async fn bootstrap(
        root: &Path,
        albums_file: &str,
        remote: &Remote,
        albums_base: &str,
    ) -> Result<Self, MigrateError> {
        let catalog = Self::load(root, albums_file, albums_base).await?;
        if catalog.is_empty() {
            return Ok(catalog);
        }

        let available: HashSet<String> = remote
            .list(&catalog.albums_base, 1)
            .await?
            .into_iter()
            .filter(|entry| entry.is_collection)
            .map(|entry| file_name_of(&entry.path).to_string())
            .collect();
        info!(available = available.len(), "Found available albums");

        for name in catalog.names.iter().filter(|n| !available.contains(*n)) {
            let path = format!("{}/{name}", catalog.albums_base);
            let response = remote.create_collection(&path).await?;
            if !response.is_success() && response.status != METHOD_NOT_ALLOWED {
                return Err(MigrateError::DirectoryCreation {
                    path,
                    reason: format!("album creation returned HTTP {}", response.status),
                });
            }
            info!(album = %name, "Created album");
        }
        Ok(catalog)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn album(&self, name: &str) -> Album {
        Album::new(name, format!("{}/{name}", self.albums_base))
    }

    /// The album `dir` mirrors, matched by directory name, then by title
    pub async fn album_for(&self, dir: &Path) -> Result<Option<Album>, MigrateError> {
        if self.names.is_empty() {
            return Ok(None);
        }
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.contains(&name) {
            return Ok(Some(self.album(&name)));
        }
        match directory_title(dir).await? {
            Some(title) if self.contains(&title) => Ok(Some(self.album(&title))),
            _ => Ok(None),
        }
    }
}

// ============================================================================
// AlbumMembership
// ============================================================================

/// Files already linked into one album, keyed by `<fileId>-<filename>`
///
/// Fetched once per directory job and kept in memory for that job only.
#[derive(Debug, Clone)]
pub struct AlbumMembership {
    album: Album,
    members: HashSet<String>,
}

impl AlbumMembership {
    pub async fn fetch(remote: &Remote, album: Album) -> Result<Self, MigrateError> {
        let members: HashSet<String> = remote
            .list(&album.remote_path, 1)
            .await?
            .into_iter()
            .filter(|entry| !entry.is_collection)
            .map(|entry| file_name_of(&entry.path).to_string())
            .collect();
        info!(album = %album.name, photos = members.len(), "Found album");
        Ok(Self { album, members })
    }

    pub fn album(&self) -> &Album {
        &self.album
    }

    pub fn contains(&self, file_id: &str, filename: &str) -> bool {
        self.members
            .contains(&Album::membership_key(file_id, filename))
    }

    pub fn insert(&mut self, file_id: &str, filename: &str) {
        self.members.insert(Album::membership_key(file_id, filename));
    }

    /// Copies `source` into the album unless it is already a member
    ///
    /// Returns `true` when a copy was issued.
    pub async fn link(
        &mut self,
        remote: &Remote,
        source: &str,
        file_id: &str,
        filename: &str,
    ) -> Result<bool, MigrateError> {
        if self.contains(file_id, filename) {
            debug!(album = %self.album.name, filename, "Already in album");
            return Ok(false);
        }

        let response = remote
            .copy(source, &self.album.member_path(filename))
            .await?;
        if !response.is_success() {
            return Err(MigrateError::AlbumLink {
                path: source.to_string(),
                album: self.album.name.clone(),
                status: response.status,
            });
        }
        self.insert(file_id, filename);
        debug!(album = %self.album.name, filename, "Copied to album");
        Ok(true)
    }
}
