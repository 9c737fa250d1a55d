//! Taken-time resolution
//!
//! The moment a photo or video was captured decides its remote `YYYY/MM`
//! directory. Sources are tried in order, first match wins:
//!
//! 1. Sidecar JSON files written by the export (`photoTakenTime`, then
//!    `creationTime`)
//! 2. Embedded date tags (`DateTimeOriginal`, `DateTime`, `DateTimeDigitized`)
//! 3. The file's modification time
//!
//! Results are memoized per path for the lifetime of the resolver.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDateTime, Utc};
use dashmap::DashMap;
use gp2nc_core::ports::{IMediaTagReader, DATE_TAGS};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::MigrateError;

/// Accepted embedded date formats: (detection pattern, chrono format)
const EXIF_FORMATS: [(&str, &str); 2] = [
    (r"\d+-\d+-\d+_\d+:\d+:\d+", "%Y-%m-%d_%H:%M:%S"),
    (r"\d+:\d+:\d+ \d+:\d+:\d+", "%Y:%m:%d %H:%M:%S"),
];

fn exif_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        EXIF_FORMATS
            .iter()
            .map(|(pattern, format)| (Regex::new(pattern).expect("valid EXIF pattern"), *format))
            .collect()
    })
}

/// `IMG_0001(1)` -> (`IMG_0001`, `(1)`)
fn increment_stem() -> &'static Regex {
    static STEM: OnceLock<Regex> = OnceLock::new();
    STEM.get_or_init(|| Regex::new(r"^([^(]+)(\(\d+\))$").expect("valid stem pattern"))
}

/// Sidecar names that belong to an incremented sibling, e.g. `a.jpg.supplemental-metadata(1).json`
fn incremented_sidecar() -> &'static Regex {
    static SIDECAR: OnceLock<Regex> = OnceLock::new();
    SIDECAR.get_or_init(|| Regex::new(r"\(\d+\)\.json$").expect("valid sidecar pattern"))
}

/// Parses an embedded date tag value in one of the two accepted formats
///
/// Values are naive and interpreted as UTC.
pub fn parse_exif_datetime(value: &str) -> Option<DateTime<Utc>> {
    exif_patterns().iter().find_map(|(pattern, format)| {
        let found = pattern.find(value)?;
        NaiveDateTime::parse_from_str(found.as_str(), format)
            .ok()
            .map(|naive| naive.and_utc())
    })
}

/// Reads the taken-time from one sidecar document
fn sidecar_timestamp(document: &Value) -> Option<DateTime<Utc>> {
    ["photoTakenTime", "creationTime"].iter().find_map(|key| {
        let timestamp = document.get(key)?.get("timestamp")?;
        let seconds = match timestamp {
            Value::String(text) => text.trim().parse::<i64>().ok()?,
            Value::Number(number) => number.as_i64()?,
            _ => return None,
        };
        DateTime::<Utc>::from_timestamp(seconds, 0)
    })
}

fn glob_sorted(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(paths) => {
            let mut found: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
            found.sort();
            found
        }
        Err(e) => {
            warn!(pattern, error = %e, "Invalid sidecar pattern");
            Vec::new()
        }
    }
}

/// Candidate sidecar metadata files for `photo`, in the order they are tried
///
/// By default every `<photo>*.json` sibling is a candidate. When the file
/// name carries an increment (`IMG_1(2).jpg`) and the unsuffixed original
/// exists with the same size, the sidecars the export wrote for the
/// duplicate (`IMG_1.jpg*(2).json`) are added; when the sizes differ the
/// file is independent and only those suffixed sidecars are used.
pub fn sidecar_candidates(photo: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(filename)) = (photo.parent(), photo.file_name().and_then(|n| n.to_str()))
    else {
        return Vec::new();
    };
    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());
    let escaped_photo = glob::Pattern::escape(&photo.to_string_lossy());

    let mut candidates = glob_sorted(&format!("{escaped_photo}*.json"));

    let increment = filename
        .rsplit_once('.')
        .and_then(|(stem, ext)| increment_stem().captures(stem).map(|caps| (caps, ext)));

    match increment {
        None => {
            candidates.retain(|candidate| {
                let name = candidate.file_name().map(|n| n.to_string_lossy());
                !name.is_some_and(|n| incremented_sidecar().is_match(&n))
            });
        }
        Some((caps, ext)) => {
            let base = &caps[1];
            let suffix = &caps[2];
            let original = dir.join(format!("{}.{ext}", base.trim_end()));
            let suffixed = glob_sorted(&format!(
                "{escaped_dir}/{}.{}*{}.json",
                glob::Pattern::escape(base),
                glob::Pattern::escape(ext),
                glob::Pattern::escape(suffix)
            ));

            let sizes = (std::fs::metadata(photo), std::fs::metadata(&original));
            match sizes {
                (Ok(own), Ok(orig)) if own.len() == orig.len() => {
                    debug!(photo = %photo.display(), original = %original.display(), "Duplicate of original, adding suffixed sidecars");
                    candidates.extend(suffixed);
                }
                (Ok(_), Ok(_)) => {
                    debug!(photo = %photo.display(), "Size differs from unsuffixed original, using suffixed sidecars only");
                    candidates = suffixed;
                }
                _ => {
                    debug!(photo = %photo.display(), original = %original.display(), "Possible duplicate but original file missing");
                }
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    candidates.retain(|candidate| seen.insert(candidate.clone()));
    candidates
}

// ============================================================================
// TakenTimeResolver
// ============================================================================

/// Resolves and memoizes taken-times for local media files
pub struct TakenTimeResolver {
    tags: Arc<dyn IMediaTagReader>,
    cache: DashMap<PathBuf, DateTime<Utc>>,
}

impl TakenTimeResolver {
    pub fn new(tags: Arc<dyn IMediaTagReader>) -> Self {
        Self {
            tags,
            cache: DashMap::new(),
        }
    }

    /// Taken-time of `path`
    ///
    /// Unreadable or malformed sidecars and tag extraction failures are
    /// skipped. Only a file whose own metadata cannot be read fails.
    pub async fn resolve(&self, path: &Path) -> Result<DateTime<Utc>, MigrateError> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(*cached);
        }

        let resolved = match self.from_sidecars(path).await {
            Some(taken) => taken,
            None => match self.from_tags(path).await {
                Some(taken) => taken,
                None => {
                    let modified = tokio::fs::metadata(path).await?.modified()?;
                    debug!(path = %path.display(), "No date in metadata or tags, using mtime");
                    DateTime::<Utc>::from(modified)
                }
            },
        };

        self.cache.insert(path.to_path_buf(), resolved);
        Ok(resolved)
    }

    async fn from_sidecars(&self, path: &Path) -> Option<DateTime<Utc>> {
        let owned = path.to_path_buf();
        let candidates = tokio::task::spawn_blocking(move || sidecar_candidates(&owned))
            .await
            .unwrap_or_default();
        if candidates.is_empty() {
            debug!(path = %path.display(), "No metadata files found");
        }

        for candidate in candidates {
            let content = match tokio::fs::read(&candidate).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(sidecar = %candidate.display(), error = %e, "Unreadable sidecar");
                    continue;
                }
            };
            let document: Value = match serde_json::from_slice(&content) {
                Ok(document) => document,
                Err(e) => {
                    warn!(sidecar = %candidate.display(), error = %e, "Malformed sidecar JSON");
                    continue;
                }
            };
            if let Some(taken) = sidecar_timestamp(&document) {
                debug!(path = %path.display(), sidecar = %candidate.display(), %taken, "Taken-time from sidecar");
                return Some(taken);
            }
            debug!(sidecar = %candidate.display(), "Found no datetime in sidecar");
        }
        None
    }

    async fn from_tags(&self, path: &Path) -> Option<DateTime<Utc>> {
        let tags: HashMap<String, String> = match self.tags.read_tags(path).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read embedded tags");
                return None;
            }
        };

        DATE_TAGS.iter().find_map(|tag| {
            let value = tags.get(*tag)?;
            let taken = parse_exif_datetime(value)?;
            debug!(path = %path.display(), tag, value = %value, "Taken-time from embedded tag");
            Some(taken)
        })
    }
}
