//! End-to-end orchestration
//!
//! 1. Make sure the upload collection exists
//! 2. Create the declared user albums that are missing remotely
//! 3. Build the remote index
//! 4. Run a directory job per top-level directory of the export
//!
//! A dry run only reads: it builds the index and reports, per directory,
//! what a real run would find.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gp2nc_core::config::{Config, FingerprintMode};
use gp2nc_core::domain::{DirectoryState, RemoteIndex};
use gp2nc_core::ports::{IMediaTagReader, IRemoteStore};
use serde::Serialize;
use tracing::{info, instrument};

use crate::albums::AlbumCatalog;
use crate::dir_cache::RemoteDirectoryCache;
use crate::filesystem::{hash_file, list_directories, list_media, read_directory_state};
use crate::job::{DirectoryJob, JobContext, RenameLedger};
use crate::pool::{DirectoryReport, MigrationPool};
use crate::progress::ProgressStore;
use crate::remote_index::{policy_for, RemoteIndexBuilder};
use crate::retry::{Remote, RetryPolicy};
use crate::taken_time::TakenTimeResolver;
use crate::MigrateError;

/// Everything a run needs besides the remote store and the tag reader
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    /// `/remote.php/dav/files/<user>`
    pub files_base: String,
    /// `/remote.php/dav/photos/<user>/albums`
    pub albums_base: String,
    /// Collection under `files_base` receiving the `YYYY/MM` tree
    pub upload_path: String,
    pub workers: usize,
    pub index_depth: u8,
    pub albums_file: String,
    pub fingerprint: FingerprintMode,
    pub retry: RetryPolicy,
    pub dry_run: bool,
}

impl MigrationSettings {
    pub fn from_config(
        config: &Config,
        files_base: impl Into<String>,
        albums_base: impl Into<String>,
    ) -> Self {
        Self {
            files_base: files_base.into(),
            albums_base: albums_base.into(),
            upload_path: config.remote.upload_path.clone(),
            workers: config.migration.workers,
            index_depth: config.migration.index_depth,
            albums_file: config.migration.albums_file.clone(),
            fingerprint: config.migration.fingerprint,
            retry: RetryPolicy::from_config(&config.retry),
            dry_run: false,
        }
    }

    /// Full remote path of the upload collection
    pub fn upload_base(&self) -> String {
        let relative = self.upload_path.trim_matches('/');
        if relative.is_empty() {
            self.files_base.clone()
        } else {
            format!("{}/{relative}", self.files_base.trim_end_matches('/'))
        }
    }
}

/// What a dry run found for one directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryPlan {
    pub directory: PathBuf,
    /// `unvisited`, `migrated` or `error_locked`
    pub state: &'static str,
    pub media_files: usize,
    /// Files whose content is already in the remote index
    pub already_remote: usize,
    pub album: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub indexed_files: usize,
    pub albums: usize,
    /// Outcomes of a real run
    pub directories: Vec<DirectoryReport>,
    /// Findings of a dry run
    pub plan: Vec<DirectoryPlan>,
}

pub struct Migrator {
    remote: Remote,
    tags: Arc<dyn IMediaTagReader>,
    settings: MigrationSettings,
}

impl Migrator {
    pub fn new(
        store: Arc<dyn IRemoteStore>,
        tags: Arc<dyn IMediaTagReader>,
        settings: MigrationSettings,
    ) -> Self {
        Self {
            remote: Remote::new(store, settings.retry),
            tags,
            settings,
        }
    }

    /// Migrates every top-level directory of `root`
    #[instrument(skip(self), fields(dry_run = self.settings.dry_run))]
    pub async fn run(&self, root: &Path) -> Result<MigrationReport, MigrateError> {
        let settings = &self.settings;
        let upload_base = settings.upload_base();
        info!(root = %root.display(), upload = %upload_base, "Working");

        let dir_cache = Arc::new(RemoteDirectoryCache::new(self.remote.clone()));
        let upload_exists = if settings.dry_run {
            self.remote.probe(&upload_base).await?.probe_result().exists
        } else {
            dir_cache
                .ensure(&settings.files_base, &settings.upload_path)
                .await?;
            true
        };

        let albums = if settings.dry_run {
            AlbumCatalog::load(root, &settings.albums_file, &settings.albums_base).await?
        } else {
            AlbumCatalog::bootstrap(
                root,
                &settings.albums_file,
                &self.remote,
                &settings.albums_base,
            )
            .await?
        };

        let index = if upload_exists {
            RemoteIndexBuilder::new(self.remote.clone(), policy_for(settings.fingerprint))
                .build(&upload_base, settings.index_depth)
                .await?
        } else {
            info!(upload = %upload_base, "Upload collection does not exist yet, nothing indexed");
            RemoteIndex::new()
        };

        let directories = list_directories(root).await?;
        info!(directories = directories.len(), "Walking directories");

        let mut report = MigrationReport {
            dry_run: settings.dry_run,
            indexed_files: index.file_count(),
            albums: albums.len(),
            ..MigrationReport::default()
        };

        if settings.dry_run {
            for directory in directories {
                report.plan.push(plan(&directory, &index, &albums).await?);
            }
            return Ok(report);
        }

        let ctx = JobContext {
            remote: self.remote.clone(),
            index: Arc::new(index),
            renames: Arc::new(RenameLedger::new()),
            albums: Arc::new(albums),
            dir_cache,
            resolver: Arc::new(TakenTimeResolver::new(self.tags.clone())),
            progress: Arc::new(ProgressStore::new(root)),
            upload_base,
        };
        let pool = MigrationPool::new(DirectoryJob::new(Arc::new(ctx)), settings.workers);
        report.directories = pool.run(directories).await;
        Ok(report)
    }
}

async fn plan(
    directory: &Path,
    index: &RemoteIndex,
    albums: &AlbumCatalog,
) -> Result<DirectoryPlan, MigrateError> {
    let state = match read_directory_state(directory).await? {
        DirectoryState::Unvisited => "unvisited",
        DirectoryState::Migrated => "migrated",
        DirectoryState::ErrorLocked(_) => "error_locked",
    };
    let media = list_media(directory).await?;
    let mut already_remote = 0;
    for item in &media {
        if index.contains(&hash_file(item.path()).await?) {
            already_remote += 1;
        }
    }
    // A malformed directory metadata file only matters to a real run.
    let album = albums
        .album_for(directory)
        .await
        .ok()
        .flatten()
        .map(|album| album.name);

    Ok(DirectoryPlan {
        directory: directory.to_path_buf(),
        state,
        media_files: media.len(),
        already_remote,
        album,
    })
}

#[cfg(test)]
mod tests {
    use gp2nc_core::domain::DirectoryOutcome;
    use tempfile::TempDir;

    use super::*;
    use crate::exiftool::NoTagReader;
    use crate::testing::{FakeRemote, ALBUMS, FILES};

    fn settings(upload_path: &str, dry_run: bool) -> MigrationSettings {
        let mut settings = MigrationSettings::from_config(&Config::default(), FILES, ALBUMS);
        settings.upload_path = upload_path.to_string();
        settings.workers = 2;
        settings.dry_run = dry_run;
        settings
    }

    fn migrator(fake: &Arc<FakeRemote>, settings: MigrationSettings) -> Migrator {
        Migrator::new(fake.clone(), Arc::new(NoTagReader), settings)
    }

    fn export(root: &Path) {
        std::fs::write(
            root.join("user-generated-memory-titles.json"),
            r#"{"title":["Trip"]}"#,
        )
        .unwrap();
        for (dir, file, content) in [
            ("Trip", "a.jpg", b"alpha".as_slice()),
            ("Photos from 2020", "b.jpg", b"bravo".as_slice()),
        ] {
            let dir = root.join(dir);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(file), content).unwrap();
            std::fs::write(
                dir.join(format!("{file}.json")),
                r#"{"photoTakenTime":{"timestamp":"1579000000"}}"#,
            )
            .unwrap();
        }
    }

    #[test]
    fn test_upload_base() {
        let mut s = settings("/Photos/", false);
        assert_eq!(s.upload_base(), format!("{FILES}/Photos"));
        s.upload_path = "/".to_string();
        assert_eq!(s.upload_base(), FILES);
    }

    #[tokio::test]
    async fn test_full_run_then_rerun() {
        let root = TempDir::new().unwrap();
        export(root.path());
        let fake = Arc::new(FakeRemote::new());

        let report = migrator(&fake, settings("/Uploads", false))
            .run(root.path())
            .await
            .unwrap();

        assert!(fake.has_collection(&format!("{FILES}/Uploads")));
        assert!(fake.has_collection(&format!("{ALBUMS}/Trip")));
        assert_eq!(report.albums, 1);
        assert_eq!(report.directories.len(), 2);
        assert!(report
            .directories
            .iter()
            .all(|r| matches!(r.outcome, DirectoryOutcome::Done(_))));
        let a = format!("{FILES}/Uploads/2020/01/a.jpg");
        let file_id = fake.file(&a).unwrap().file_id;
        assert!(fake.file(&format!("{ALBUMS}/Trip/{file_id}-a.jpg")).is_some());

        fake.clear_calls();
        let again = migrator(&fake, settings("/Uploads", false))
            .run(root.path())
            .await
            .unwrap();

        assert_eq!(again.indexed_files, 2);
        assert!(again
            .directories
            .iter()
            .all(|r| r.outcome == DirectoryOutcome::AlreadyMigrated));
        for verb in ["PUT", "COPY", "MOVE", "MKCOL"] {
            assert_eq!(fake.count(verb), 0, "{verb} issued on rerun");
        }
    }

    #[tokio::test]
    async fn test_dry_run_mutates_nothing() {
        let root = TempDir::new().unwrap();
        export(root.path());
        let fake = Arc::new(FakeRemote::new());
        fake.add_file(&format!("{FILES}/Photos/2019/12/old.jpg"), b"alpha");

        let report = migrator(&fake, settings("/Photos", true))
            .run(root.path())
            .await
            .unwrap();

        assert!(report.dry_run);
        assert!(report.directories.is_empty());
        assert_eq!(report.plan.len(), 2);
        let trip = report
            .plan
            .iter()
            .find(|p| p.directory.ends_with("Trip"))
            .unwrap();
        assert_eq!(trip.state, "unvisited");
        assert_eq!(trip.media_files, 1);
        assert_eq!(trip.already_remote, 1);
        assert_eq!(trip.album.as_deref(), Some("Trip"));
        for verb in ["PUT", "COPY", "MOVE", "MKCOL"] {
            assert_eq!(fake.count(verb), 0, "{verb} issued during dry run");
        }
        assert!(!root.path().join(".progress").exists());
    }

    #[tokio::test]
    async fn test_dry_run_with_missing_upload_collection() {
        let root = TempDir::new().unwrap();
        export(root.path());
        let fake = Arc::new(FakeRemote::new());

        let report = migrator(&fake, settings("/Elsewhere", true))
            .run(root.path())
            .await
            .unwrap();

        assert_eq!(report.indexed_files, 0);
        assert_eq!(fake.count("PROPFIND"), 0);
    }
}
