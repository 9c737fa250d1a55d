//! In-memory remote store for engine tests
//!
//! Mimics the Nextcloud behaviour the engine relies on: collections must
//! exist before children are created, copies into a photos album show up as
//! `<fileId>-<filename>`, and every call is recorded so tests can count verbs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use gp2nc_core::domain::file_name_of;
use gp2nc_core::ports::{IRemoteStore, RemoteEntry, RemoteError, RemoteResponse, UploadMetadata};

pub(crate) const FILES: &str = "/remote.php/dav/files/alice";
pub(crate) const ALBUMS: &str = "/remote.php/dav/photos/alice/albums";

#[derive(Debug, Clone)]
pub(crate) struct FakeFile {
    pub content: Vec<u8>,
    pub file_id: String,
    pub uploaded: Option<UploadMetadata>,
}

#[derive(Debug, Default)]
struct FakeState {
    files: BTreeMap<String, FakeFile>,
    collections: BTreeSet<String>,
    calls: Vec<(String, String)>,
    next_id: u64,
    transport_failures: HashMap<String, u32>,
    status_overrides: HashMap<(String, String), u16>,
    hide_checksums: bool,
    truncate_uploads: bool,
    upload_delay: Option<Duration>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeRemote {
    state: Mutex<FakeState>,
    uploads_in_flight: AtomicUsize,
    peak_uploads: AtomicUsize,
}

fn parent_of(path: &str) -> &str {
    path.rfind('/').map(|idx| &path[..idx]).unwrap_or("")
}

fn md5_hex(content: &[u8]) -> String {
    format!("{:x}", md5::compute(content))
}

impl FakeRemote {
    /// A store holding the files root, the albums root and `/Photos`
    pub fn new() -> Self {
        let remote = Self::default();
        remote.add_collection("/remote.php/dav/files");
        remote.add_collection(FILES);
        remote.add_collection("/remote.php/dav/photos");
        remote.add_collection("/remote.php/dav/photos/alice");
        remote.add_collection(ALBUMS);
        remote.add_collection(&format!("{FILES}/Photos"));
        remote
    }

    pub fn add_collection(&self, path: &str) {
        self.lock().collections.insert(path.to_string());
    }

    /// Adds a file (creating parents) and returns its file id
    pub fn add_file(&self, path: &str, content: &[u8]) -> String {
        let mut state = self.lock();
        let mut parent = parent_of(path);
        while !parent.is_empty() {
            state.collections.insert(parent.to_string());
            parent = parent_of(parent);
        }
        state.next_id += 1;
        let file_id = format!("{}", 1000 + state.next_id);
        state.files.insert(
            path.to_string(),
            FakeFile {
                content: content.to_vec(),
                file_id: file_id.clone(),
                uploaded: None,
            },
        );
        file_id
    }

    pub fn file(&self, path: &str) -> Option<FakeFile> {
        self.lock().files.get(path).cloned()
    }

    pub fn has_collection(&self, path: &str) -> bool {
        self.lock().collections.contains(path)
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// The next `times` calls of `verb` fail at the transport level
    pub fn fail_transport(&self, verb: &str, times: u32) {
        self.lock().transport_failures.insert(verb.to_string(), times);
    }

    /// Every `verb` on `path` answers with `status`
    pub fn override_status(&self, verb: &str, path: &str, status: u16) {
        self.lock()
            .status_overrides
            .insert((verb.to_string(), path.to_string()), status);
    }

    pub fn hide_checksums(&self) {
        self.lock().hide_checksums = true;
    }

    /// Stores one byte less than was sent, so verification fails
    pub fn truncate_uploads(&self) {
        self.lock().truncate_uploads = true;
    }

    /// Every PUT stays in flight for `delay` before it is stored
    pub fn delay_uploads(&self, delay: Duration) {
        self.lock().upload_delay = Some(delay);
    }

    /// Highest number of PUTs seen in flight at once
    pub fn peak_uploads(&self) -> usize {
        self.peak_uploads.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.lock().calls.clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.lock().calls.iter().filter(|(v, _)| v == verb).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records the call and applies scripted failures
    fn enter(&self, verb: &str, path: &str) -> Result<Option<u16>, RemoteError> {
        let mut state = self.lock();
        state.calls.push((verb.to_string(), path.to_string()));
        if let Some(remaining) = state.transport_failures.get_mut(verb) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::Transport(format!("{verb} {path}: connection reset")));
            }
        }
        Ok(state
            .status_overrides
            .get(&(verb.to_string(), path.to_string()))
            .copied())
    }
}

#[async_trait]
impl IRemoteStore for FakeRemote {
    async fn probe(&self, path: &str) -> Result<RemoteResponse, RemoteError> {
        if let Some(status) = self.enter("HEAD", path)? {
            return Ok(RemoteResponse::with_status(status));
        }
        let state = self.lock();
        if let Some(file) = state.files.get(path) {
            return Ok(RemoteResponse::with_status(200)
                .header_value("content-length", file.content.len().to_string())
                .header_value("oc-fileid", file.file_id.clone()));
        }
        if state.collections.contains(path) {
            return Ok(RemoteResponse::with_status(200));
        }
        Ok(RemoteResponse::with_status(404))
    }

    async fn get(&self, path: &str) -> Result<RemoteResponse, RemoteError> {
        if let Some(status) = self.enter("GET", path)? {
            return Ok(RemoteResponse::with_status(status));
        }
        let state = self.lock();
        Ok(match state.files.get(path) {
            Some(file) => RemoteResponse::with_status(200).body(file.content.clone()),
            None => RemoteResponse::with_status(404),
        })
    }

    async fn list(&self, path: &str, depth: u8) -> Result<Vec<RemoteEntry>, RemoteError> {
        if let Some(status) = self.enter("PROPFIND", path)? {
            return Err(RemoteError::UnexpectedStatus {
                operation: "PROPFIND",
                path: path.to_string(),
                status,
            });
        }
        let state = self.lock();
        if !state.collections.contains(path) {
            return Err(RemoteError::UnexpectedStatus {
                operation: "PROPFIND",
                path: path.to_string(),
                status: 404,
            });
        }

        let prefix = format!("{path}/");
        let within = |candidate: &str| {
            candidate
                .strip_prefix(&prefix)
                .map(|rest| rest.split('/').count() <= usize::from(depth))
                .unwrap_or(false)
        };

        let mut entries = Vec::new();
        for collection in state.collections.iter().filter(|c| within(c)) {
            entries.push(RemoteEntry {
                path: collection.clone(),
                display_name: file_name_of(collection).to_string(),
                size: None,
                content_type: None,
                checksums: None,
                created_at: None,
                file_id: None,
                is_collection: true,
            });
        }
        for (file_path, file) in state.files.iter().filter(|(p, _)| within(p)) {
            entries.push(RemoteEntry {
                path: file_path.clone(),
                display_name: file_name_of(file_path).to_string(),
                size: Some(file.content.len() as u64),
                content_type: Some("image/jpeg".to_string()),
                checksums: (!state.hide_checksums)
                    .then(|| format!("SHA1:0000 MD5:{}", md5_hex(&file.content))),
                created_at: None,
                file_id: Some(file.file_id.clone()),
                is_collection: false,
            });
        }
        Ok(entries)
    }

    async fn create_collection(&self, path: &str) -> Result<RemoteResponse, RemoteError> {
        if let Some(status) = self.enter("MKCOL", path)? {
            return Ok(RemoteResponse::with_status(status));
        }
        let mut state = self.lock();
        if state.collections.contains(path) || state.files.contains_key(path) {
            return Ok(RemoteResponse::with_status(405));
        }
        if !state.collections.contains(parent_of(path)) {
            return Ok(RemoteResponse::with_status(409));
        }
        state.collections.insert(path.to_string());
        Ok(RemoteResponse::with_status(201))
    }

    async fn put(
        &self,
        path: &str,
        source: &Path,
        metadata: &UploadMetadata,
    ) -> Result<RemoteResponse, RemoteError> {
        if let Some(status) = self.enter("PUT", path)? {
            return Ok(RemoteResponse::with_status(status));
        }
        let delay = self.lock().upload_delay;
        if let Some(delay) = delay {
            let in_flight = self.uploads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_uploads.fetch_max(in_flight, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.uploads_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        let mut content = std::fs::read(source)?;
        let mut state = self.lock();
        if !state.collections.contains(parent_of(path)) {
            return Ok(RemoteResponse::with_status(409));
        }
        if state.truncate_uploads {
            content.pop();
        }
        state.next_id += 1;
        let file_id = format!("{}", 1000 + state.next_id);
        state.files.insert(
            path.to_string(),
            FakeFile {
                content,
                file_id: file_id.clone(),
                uploaded: Some(*metadata),
            },
        );
        Ok(RemoteResponse::with_status(201).header_value("oc-fileid", file_id))
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<RemoteResponse, RemoteError> {
        if let Some(status) = self.enter("COPY", source)? {
            return Ok(RemoteResponse::with_status(status));
        }
        let mut state = self.lock();
        let Some(file) = state.files.get(source).cloned() else {
            return Ok(RemoteResponse::with_status(404));
        };
        let album = parent_of(destination);
        if !state.collections.contains(album) {
            return Ok(RemoteResponse::with_status(409));
        }
        let target = if destination.starts_with(ALBUMS) {
            format!("{album}/{}-{}", file.file_id, file_name_of(destination))
        } else {
            destination.to_string()
        };
        state.files.insert(target, file);
        Ok(RemoteResponse::with_status(201))
    }

    async fn move_to(
        &self,
        source: &str,
        destination: &str,
        overwrite: bool,
    ) -> Result<RemoteResponse, RemoteError> {
        if let Some(status) = self.enter("MOVE", source)? {
            return Ok(RemoteResponse::with_status(status));
        }
        let mut state = self.lock();
        if !state.files.contains_key(source) {
            return Ok(RemoteResponse::with_status(404));
        }
        if !state.collections.contains(parent_of(destination)) {
            return Ok(RemoteResponse::with_status(409));
        }
        if state.files.contains_key(destination) && !overwrite {
            return Ok(RemoteResponse::with_status(412));
        }
        if let Some(file) = state.files.remove(source) {
            state.files.insert(destination.to_string(), file);
        }
        Ok(RemoteResponse::with_status(201))
    }
}
