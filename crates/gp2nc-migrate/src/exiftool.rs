//! Embedded tag readers
//!
//! [`ExifToolReader`] shells out to `exiftool -j`, which handles both images
//! and videos. Its tag names differ from the EXIF ones for two of the date
//! tags, so they are mapped back before the resolver sees them.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context};
use async_trait::async_trait;
use gp2nc_core::ports::IMediaTagReader;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

/// exiftool tag name to EXIF tag name
const TAG_NAMES: [(&str, &str); 3] = [
    ("DateTimeOriginal", "DateTimeOriginal"),
    ("ModifyDate", "DateTime"),
    ("CreateDate", "DateTimeDigitized"),
];

/// Reads date tags with the `exiftool` binary
#[derive(Debug, Clone)]
pub struct ExifToolReader {
    program: String,
}

impl ExifToolReader {
    pub fn new() -> Self {
        Self::with_program("exiftool")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the binary can be started
    pub async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-ver")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for ExifToolReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps one `exiftool -j` document to EXIF tag names
fn parse_output(stdout: &[u8]) -> anyhow::Result<HashMap<String, String>> {
    let documents: Vec<Value> =
        serde_json::from_slice(stdout).context("exiftool produced invalid JSON")?;
    let Some(document) = documents.first() else {
        return Ok(HashMap::new());
    };

    Ok(TAG_NAMES
        .iter()
        .filter_map(|(exiftool_name, exif_name)| {
            let value = match document.get(*exiftool_name)? {
                Value::String(s) => s.clone(),
                Value::Null => return None,
                other => other.to_string(),
            };
            Some((exif_name.to_string(), value))
        })
        .collect())
}

#[async_trait]
impl IMediaTagReader for ExifToolReader {
    async fn read_tags(&self, path: &Path) -> anyhow::Result<HashMap<String, String>> {
        let output = Command::new(&self.program)
            .arg("-j")
            .args(TAG_NAMES.iter().map(|(name, _)| format!("-{name}")))
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.program))?;

        if !output.status.success() && output.stdout.is_empty() {
            bail!(
                "{} failed for {}: {}",
                self.program,
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let tags = parse_output(&output.stdout)?;
        debug!(path = %path.display(), tags = tags.len(), "Read embedded tags");
        Ok(tags)
    }
}

/// Tag reader for systems without exiftool: never finds a tag
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTagReader;

#[async_trait]
impl IMediaTagReader for NoTagReader {
    async fn read_tags(&self, _path: &Path) -> anyhow::Result<HashMap<String, String>> {
        Ok(HashMap::new())
    }
}
