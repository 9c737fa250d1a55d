//! Directory state and job outcomes

use serde::Serialize;

/// Persisted state of a local album directory, read once at job entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryState {
    /// No marker present; the directory must be processed
    Unvisited,
    /// The migrated marker is present; never re-entered
    Migrated,
    /// The error marker is present; skipped until a human removes it
    ErrorLocked(String),
}

/// What happened to one media file inside a directory job
///
/// Only continue-on-error failures are represented here; failures that
/// abort the directory travel as `Err` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum FileOutcome {
    /// New content was uploaded and verified
    Uploaded,
    /// A same-named, same-sized file was already at the target path
    AlreadyPresent,
    /// The content hash was found in the remote index
    Deduplicated,
    /// A progress record from an earlier run was reused
    Resumed,
    /// The file was skipped; the next run retries it
    Failed(String),
}

/// Per-directory counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectorySummary {
    pub uploaded: u32,
    pub already_present: u32,
    pub deduplicated: u32,
    pub resumed: u32,
    pub failed: u32,
    /// `<file>: <reason>` for each skipped file
    pub failures: Vec<String>,
}

impl DirectorySummary {
    pub fn record(&mut self, filename: &str, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Uploaded => self.uploaded += 1,
            FileOutcome::AlreadyPresent => self.already_present += 1,
            FileOutcome::Deduplicated => self.deduplicated += 1,
            FileOutcome::Resumed => self.resumed += 1,
            FileOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push(format!("{filename}: {reason}"));
            }
        }
    }

    pub fn processed(&self) -> u32 {
        self.uploaded + self.already_present + self.deduplicated + self.resumed + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Result of running a directory job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum DirectoryOutcome {
    AlreadyMigrated,
    SkippedDueToError,
    Done(DirectorySummary),
    Failed { reason: String },
}

impl DirectoryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DirectoryOutcome::AlreadyMigrated => "already migrated",
            DirectoryOutcome::SkippedDueToError => "skipped (error marker)",
            DirectoryOutcome::Done(summary) if summary.is_complete() => "done",
            DirectoryOutcome::Done(_) => "done with skipped files",
            DirectoryOutcome::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_outcomes() {
        let mut summary = DirectorySummary::default();
        summary.record("a.jpg", &FileOutcome::Uploaded);
        summary.record("b.jpg", &FileOutcome::Deduplicated);
        summary.record("c.jpg", &FileOutcome::Failed("size mismatch".into()));

        assert_eq!(summary.processed(), 3);
        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.failures, vec!["c.jpg: size mismatch".to_string()]);
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(DirectoryOutcome::Failed {
            reason: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "boom");
    }

    #[test]
    fn test_labels() {
        assert_eq!(DirectoryOutcome::AlreadyMigrated.label(), "already migrated");
        assert_eq!(
            DirectoryOutcome::Done(DirectorySummary::default()).label(),
            "done"
        );
    }
}
