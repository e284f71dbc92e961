//! Core types for the filepool upload relay.
//!
//! This crate holds configuration, provider credential bundles, and the error
//! taxonomy shared by the storage and API crates.

pub mod config;
pub mod credentials;
pub mod error;

pub use config::{Config, PoolTopology};
pub use credentials::{DriveCredentials, ProviderCredentials, ProviderKind, S3Credentials};
pub use error::{AppError, ErrorMetadata, LogLevel};
