//! Upload key verification.
//!
//! The relay is protected by one shared secret. Clients send it either in the
//! `x-upload-key` header or as an `uploadKey` multipart field; the header
//! wins when both are present.

use filepool_core::AppError;
use subtle::ConstantTimeEq;

pub const UPLOAD_KEY_HEADER: &str = "x-upload-key";
pub const UPLOAD_KEY_FIELD: &str = "uploadKey";

/// Constant-time string comparison.
///
/// Length differences still burn a comparison of `a` against itself so the
/// mismatch is not observable through timing.
fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        let _ = a.as_bytes().ct_eq(a.as_bytes());
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Check a client-provided key against the configured secret.
///
/// A missing server-side secret is a deployment defect and reported as such
/// (500), never as a client authorization failure.
pub fn verify_upload_key(expected: Option<&str>, provided: Option<&str>) -> Result<(), AppError> {
    let expected = expected.ok_or(AppError::ServerMisconfigured(
        "UPLOAD_SECRET_KEY is not set".to_string(),
    ))?;

    match provided {
        Some(key) if secure_compare(expected, key) => Ok(()),
        Some(_) => Err(AppError::Unauthorized("invalid upload key".to_string())),
        None => Err(AppError::Unauthorized("missing upload key".to_string())),
    }
}
