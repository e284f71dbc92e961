//! Storage layer for the filepool upload relay.
//!
//! This crate provides the `StorageBackend` trait, the account pool with its
//! rotation cursor, the sequential fallback orchestrator, the staged payload
//! manager, and the S3 and Drive adapters.
//!
//! # Object name format
//!
//! Every stored object is named `uploads/{uuid}_{sanitized filename}` so that
//! uploads can never overwrite unrelated objects at the backend. Name
//! generation is centralized in the `keys` module so all backends stay
//! consistent.

pub mod drive;
pub mod factory;
pub(crate) mod keys;
pub mod pool;
pub mod s3;
pub mod staged;
pub mod traits;
pub mod uploader;

// Re-export commonly used types
pub use drive::DriveBackend;
pub use factory::build_pool;
pub use pool::{AccountEntry, AccountPool, Topology};
pub use s3::S3Backend;
pub use staged::{live_payloads, StagedPayload};
pub use traits::{StorageBackend, StorageError, StorageResult, StorageUsage, StoredObject};
pub use uploader::{UploadError, UploadOutcome, Uploader};

#[cfg(test)]
pub(crate) mod test_support {
    /// Serializes tests that stage payloads so live-count assertions stay stable.
    pub static PAYLOAD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    pub fn payload_guard() -> std::sync::MutexGuard<'static, ()> {
        PAYLOAD_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}
