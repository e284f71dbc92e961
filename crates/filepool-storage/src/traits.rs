//! Storage abstraction trait
//!
//! This module defines the StorageBackend trait that all provider adapters
//! must implement, plus the storage error type.

use crate::staged::StagedPayload;
use async_trait::async_trait;
use filepool_core::ProviderKind;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The object was stored but could not be made publicly readable. A
    /// stored-but-inaccessible object is not a valid success.
    #[error("Access grant failed: {0}")]
    AccessGrantFailed(String),

    #[error("Usage query failed: {0}")]
    UsageFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of a successful store call.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Publicly accessible URL for the uploaded file
    pub url: String,
    /// Provider-assigned identifier (object key or file id)
    pub provider_id: String,
}

/// Storage usage snapshot for one account, when the backend reports one.
#[derive(Debug, Clone)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub limit_bytes: Option<u64>,
}

/// Storage abstraction trait
///
/// One adapter instance wraps one credentialed account. Adapters are stateless
/// with respect to which account is "current" - the orchestrator owns account
/// selection and rotation.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store the staged payload under a collision-resistant name and return
    /// its public URL and provider-assigned id.
    ///
    /// `content_type` is the declared media type of the upload; adapters pass
    /// it through where the backend accepts one and must never reject a
    /// payload because of it.
    async fn store(
        &self,
        payload: &StagedPayload,
        filename: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject>;

    /// Storage usage for this account. Backends without a usage API return
    /// `Ok(None)`.
    async fn usage(&self) -> StorageResult<Option<StorageUsage>> {
        Ok(None)
    }

    /// The backend kind this adapter wraps.
    fn kind(&self) -> ProviderKind;
}
