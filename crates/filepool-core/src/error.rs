//! Error types module
//!
//! All request-terminal errors are unified under the `AppError` enum. Each
//! variant self-describes its HTTP presentation through the `ErrorMetadata`
//! trait: status code, machine-readable code, client-facing message, whether
//! internal detail is sensitive, and the log level to report it at.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like auth failures
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UNAUTHORIZED")
    fn error_code(&self) -> &'static str;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether internal details must be hidden from the client
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The server has no upload secret configured. A deployment error, not a
    /// client error.
    #[error("Server misconfigured: {0}")]
    ServerMisconfigured(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    /// The eligible account pool is empty; no upload was attempted.
    #[error("No storage accounts configured")]
    NoAccountsConfigured,

    /// Every eligible account was attempted once and failed. Carries the
    /// per-account error messages in attempt order.
    #[error("All storage accounts failed")]
    AllAccountsFailed { errors: Vec<String> },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Static metadata per variant: (http_status, error_code, sensitive, log_level).
fn static_metadata(err: &AppError) -> (u16, &'static str, bool, LogLevel) {
    match err {
        AppError::Unauthorized(_) => (401, "UNAUTHORIZED", false, LogLevel::Warn),
        AppError::ServerMisconfigured(_) => (500, "SERVER_MISCONFIGURED", true, LogLevel::Error),
        AppError::InvalidInput(_) => (400, "INVALID_INPUT", false, LogLevel::Debug),
        AppError::PayloadTooLarge(_) => (400, "PAYLOAD_TOO_LARGE", false, LogLevel::Debug),
        AppError::NoAccountsConfigured => (500, "NO_ACCOUNTS_CONFIGURED", true, LogLevel::Error),
        AppError::AllAccountsFailed { .. } => (500, "ALL_ACCOUNTS_FAILED", true, LogLevel::Error),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, LogLevel::Error),
    }
}

impl AppError {
    /// Get the error type name for structured logging
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::ServerMisconfigured(_) => "ServerMisconfigured",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::NoAccountsConfigured => "NoAccountsConfigured",
            AppError::AllAccountsFailed { .. } => "AllAccountsFailed",
            AppError::Internal(_) => "Internal",
        }
    }

    /// Internal detail for server-side logs. Per-account errors are joined
    /// here and nowhere else; they never reach the client.
    pub fn detailed_message(&self) -> String {
        match self {
            AppError::AllAccountsFailed { errors } => {
                format!("All storage accounts failed: {}", errors.join("; "))
            }
            other => other.to_string(),
        }
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        static_metadata(self).1
    }

    fn is_sensitive(&self) -> bool {
        static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Unauthorized(_) => "Unauthorized".to_string(),
            AppError::ServerMisconfigured(_) => "Server configuration error".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            // Backend configuration must not leak to the client; both terminal
            // upload failures surface as the same generic message.
            AppError::NoAccountsConfigured => "Upload failed on all accounts.".to_string(),
            AppError::AllAccountsFailed { .. } => "Upload failed on all accounts.".to_string(),
            AppError::Internal(_) => "Unexpected error".to_string(),
        }
    }
}
