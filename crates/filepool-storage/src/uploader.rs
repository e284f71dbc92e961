//! Upload orchestrator.
//!
//! Sweeps the account pool sequentially: each eligible account is tried at
//! most once per request, in topology order, each attempt completing (success,
//! failure, or timeout) before the next begins. The first success wins and
//! advances the rotation cursor; an exhausted sweep yields one aggregate
//! failure carrying the per-account errors in attempt order.
//!
//! Sequential fallback is a deliberate simplicity-over-latency trade-off:
//! racing all accounts concurrently would burn bandwidth on backends that are
//! about to be skipped and would break the rotation semantics.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::pool::AccountPool;
use crate::staged::StagedPayload;

/// Terminal result of a successful orchestrated upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Public URL of the stored file
    pub url: String,
    /// Provider-assigned identifier
    pub provider_id: String,
    /// Name of the account that succeeded
    pub service: String,
}

/// Terminal failure of an orchestrated upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The eligible pool is empty; nothing was attempted.
    #[error("no storage accounts configured")]
    NoAccountsConfigured,

    /// Every account was tried once and failed. `errors` holds one
    /// `"<account>: <detail>"` entry per attempt, in attempt order.
    #[error("all storage accounts failed")]
    AllAccountsFailed { errors: Vec<String> },
}

impl From<UploadError> for filepool_core::AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::NoAccountsConfigured => filepool_core::AppError::NoAccountsConfigured,
            UploadError::AllAccountsFailed { errors } => {
                filepool_core::AppError::AllAccountsFailed { errors }
            }
        }
    }
}

/// Orchestrates provider fallback over the account pool.
pub struct Uploader {
    pool: Arc<AccountPool>,
    attempt_timeout: Duration,
}

impl Uploader {
    pub fn new(pool: Arc<AccountPool>, attempt_timeout: Duration) -> Self {
        Uploader {
            pool,
            attempt_timeout,
        }
    }

    pub fn pool(&self) -> &Arc<AccountPool> {
        &self.pool
    }

    /// Store the payload via the first account that accepts it.
    ///
    /// Dropping the returned future (caller disconnect) cancels the in-flight
    /// attempt; no further accounts are tried.
    pub async fn upload(
        &self,
        payload: &StagedPayload,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadOutcome, UploadError> {
        if self.pool.is_empty() {
            return Err(UploadError::NoAccountsConfigured);
        }

        let n = self.pool.len();
        let start = self.pool.sweep_start();
        let mut errors = Vec::new();

        for i in 0..n {
            let idx = (start + i) % n;
            let entry = &self.pool.entries()[idx];

            tracing::info!(
                account = %entry.name,
                filename = %filename,
                size_bytes = payload.len(),
                "Attempting upload"
            );

            let attempt = entry.backend.store(payload, filename, content_type);
            match tokio::time::timeout(self.attempt_timeout, attempt).await {
                Ok(Ok(stored)) => {
                    self.pool.advance_past(idx);
                    tracing::info!(
                        account = %entry.name,
                        provider_id = %stored.provider_id,
                        "Upload succeeded"
                    );
                    return Ok(UploadOutcome {
                        url: stored.url,
                        provider_id: stored.provider_id,
                        service: entry.name.clone(),
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!(account = %entry.name, error = %e, "Upload attempt failed");
                    errors.push(format!("{}: {}", entry.name, e));
                }
                Err(_) => {
                    tracing::warn!(
                        account = %entry.name,
                        timeout_secs = self.attempt_timeout.as_secs(),
                        "Upload attempt timed out"
                    );
                    errors.push(format!(
                        "{}: timed out after {}s",
                        entry.name,
                        self.attempt_timeout.as_secs()
                    ));
                }
            }
        }

        // Cursor deliberately untouched: the next request's sweep starts
        // where this one did.
        Err(UploadError::AllAccountsFailed { errors })
    }
}
