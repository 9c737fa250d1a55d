//! Bounded-concurrency execution of directory jobs
//!
//! At most `workers` directories are migrated at the same time. Directories
//! are independent: there is no ordering between them and one failing never
//! stops the others.

use std::path::PathBuf;
use std::sync::Arc;

use gp2nc_core::domain::DirectoryOutcome;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::job::DirectoryJob;

/// Outcome of one directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryReport {
    pub directory: PathBuf,
    pub outcome: DirectoryOutcome,
}

pub struct MigrationPool {
    job: Arc<DirectoryJob>,
    semaphore: Arc<Semaphore>,
    workers: usize,
}

impl MigrationPool {
    pub fn new(job: DirectoryJob, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            job: Arc::new(job),
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs a job per directory and collects the outcomes in input order
    pub async fn run(&self, directories: Vec<PathBuf>) -> Vec<DirectoryReport> {
        info!(directories = directories.len(), workers = self.workers, "Starting workers");

        let mut tasks = JoinSet::new();
        for (position, directory) in directories.iter().cloned().enumerate() {
            let job = self.job.clone();
            let semaphore = self.semaphore.clone();
            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => job.run(&directory).await,
                    Err(_) => DirectoryOutcome::Failed {
                        reason: "worker pool closed".to_string(),
                    },
                };
                (position, outcome)
            });
        }

        let mut outcomes: Vec<Option<DirectoryOutcome>> = vec![None; directories.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, outcome)) => {
                    info!(
                        directory = %directories[position].display(),
                        outcome = outcome.label(),
                        "Directory finished"
                    );
                    outcomes[position] = Some(outcome);
                }
                Err(e) => error!(error = %e, "Directory job panicked"),
            }
        }

        directories
            .into_iter()
            .zip(outcomes)
            .map(|(directory, outcome)| DirectoryReport {
                directory,
                outcome: outcome.unwrap_or_else(|| DirectoryOutcome::Failed {
                    reason: "directory job panicked".to_string(),
                }),
            })
            .collect()
    }
}
