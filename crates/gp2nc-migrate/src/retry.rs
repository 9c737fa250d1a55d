//! Retry policy for remote calls
//!
//! Every remote call made by the engine goes through [`Remote`], which wraps
//! the [`IRemoteStore`] port with a [`RetryPolicy`]. Only transport-level
//! failures are retried; a well-formed response with any status code is
//! returned to the caller to interpret.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gp2nc_core::config::RetryConfig;
use gp2nc_core::ports::{IRemoteStore, RemoteEntry, RemoteError, RemoteResponse, UploadMetadata};
use tracing::{info, warn};

// ============================================================================
// RetryPolicy
// ============================================================================

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Total attempts, including the first one
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);

    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.delay_secs))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `op` until it succeeds, fails non-transiently, or attempts run out
    ///
    /// The last failure is returned unchanged.
    pub async fn attempt<F, Fut, T>(&self, operation: &str, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        operation,
                        attempt,
                        delay_secs = self.delay.as_secs(),
                        error = %err,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!(operation, attempts = attempt, error = %err, "Retry limit exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

// ============================================================================
// Remote - retrying facade over IRemoteStore
// ============================================================================

/// The remote store with every call routed through a [`RetryPolicy`]
#[derive(Clone)]
pub struct Remote {
    store: Arc<dyn IRemoteStore>,
    policy: RetryPolicy,
}

impl Remote {
    pub fn new(store: Arc<dyn IRemoteStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn probe(&self, path: &str) -> Result<RemoteResponse, RemoteError> {
        self.policy.attempt("HEAD", || self.store.probe(path)).await
    }

    pub async fn get(&self, path: &str) -> Result<RemoteResponse, RemoteError> {
        self.policy.attempt("GET", || self.store.get(path)).await
    }

    pub async fn list(&self, path: &str, depth: u8) -> Result<Vec<RemoteEntry>, RemoteError> {
        self.policy
            .attempt("PROPFIND", || self.store.list(path, depth))
            .await
    }

    pub async fn create_collection(&self, path: &str) -> Result<RemoteResponse, RemoteError> {
        self.policy
            .attempt("MKCOL", || self.store.create_collection(path))
            .await
    }

    pub async fn put(
        &self,
        path: &str,
        source: &Path,
        metadata: &UploadMetadata,
    ) -> Result<RemoteResponse, RemoteError> {
        self.policy
            .attempt("PUT", || self.store.put(path, source, metadata))
            .await
    }

    pub async fn copy(&self, source: &str, destination: &str) -> Result<RemoteResponse, RemoteError> {
        self.policy
            .attempt("COPY", || self.store.copy(source, destination))
            .await
    }

    pub async fn move_to(
        &self,
        source: &str,
        destination: &str,
        overwrite: bool,
    ) -> Result<RemoteResponse, RemoteError> {
        self.policy
            .attempt("MOVE", || self.store.move_to(source, destination, overwrite))
            .await
    }
}
