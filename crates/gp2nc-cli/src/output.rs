use anyhow::Result;
use gp2nc_core::domain::DirectoryOutcome;
use gp2nc_migrate::migrator::MigrationReport;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
    fn is_json(&self) -> bool;
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }
    fn is_json(&self) -> bool {
        false
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
    fn is_json(&self) -> bool {
        true
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

/// One line per directory, e.g. `Trip: done (3 uploaded, 1 deduplicated)`
pub fn outcome_line(name: &str, outcome: &DirectoryOutcome) -> String {
    match outcome {
        DirectoryOutcome::Done(summary) => {
            let counts: Vec<String> = [
                (summary.uploaded, "uploaded"),
                (summary.already_present, "already present"),
                (summary.deduplicated, "deduplicated"),
                (summary.resumed, "resumed"),
                (summary.failed, "skipped"),
            ]
            .iter()
            .filter(|(n, _)| *n > 0)
            .map(|(n, what)| format!("{n} {what}"))
            .collect();
            if counts.is_empty() {
                format!("{name}: {}", outcome.label())
            } else {
                format!("{name}: {} ({})", outcome.label(), counts.join(", "))
            }
        }
        DirectoryOutcome::Failed { reason } => format!("{name}: failed: {reason}"),
        other => format!("{name}: {}", other.label()),
    }
}

/// Prints a run or dry-run report
pub fn print_report(formatter: &dyn OutputFormatter, report: &MigrationReport) -> Result<()> {
    if formatter.is_json() {
        formatter.print_json(&serde_json::to_value(report)?);
        return Ok(());
    }

    formatter.info(&format!(
        "{} files indexed remotely, {} albums",
        report.indexed_files, report.albums
    ));

    if report.dry_run {
        for plan in &report.plan {
            let name = plan.directory.display();
            let album = plan
                .album
                .as_deref()
                .map(|a| format!(", album {a}"))
                .unwrap_or_default();
            formatter.info(&format!(
                "{name}: {}, {} media files, {} already remote{album}",
                plan.state, plan.media_files, plan.already_remote
            ));
        }
        formatter.success("Dry run complete");
        return Ok(());
    }

    for entry in &report.directories {
        let line = outcome_line(&entry.directory.display().to_string(), &entry.outcome);
        match &entry.outcome {
            DirectoryOutcome::Failed { .. } => formatter.error(&line),
            DirectoryOutcome::Done(summary) => {
                for failure in &summary.failures {
                    formatter.warn(failure);
                }
                formatter.success(&line);
            }
            _ => formatter.info(&line),
        }
    }
    Ok(())
}
