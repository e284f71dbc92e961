//! Shared object-name generation for storage backends.
//!
//! Name format: `uploads/{uuid}_{sanitized filename}`. The random component
//! makes names collision-resistant; the sanitized original filename keeps them
//! human-readable.

use uuid::Uuid;

/// Folder prefix under which all relayed uploads are stored.
pub const UPLOAD_FOLDER: &str = "uploads";

const MAX_NAME_LEN: usize = 100;

/// Generate a collision-resistant object name for the given original filename.
pub fn generate_object_name(filename: &str) -> String {
    format!("{}_{}", Uuid::new_v4(), sanitize_filename(filename))
}

/// Generate the full storage key, including the upload folder prefix.
pub fn generate_object_key(filename: &str) -> String {
    format!("{}/{}", UPLOAD_FOLDER, generate_object_name(filename))
}

/// Reduce a caller-supplied filename to a safe object-name component.
///
/// Strips any path components, replaces everything outside `[A-Za-z0-9._-]`,
/// trims leading dots, and caps the length. Falls back to `file` when nothing
/// usable remains.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let mut sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    sanitized = sanitized.trim_start_matches('.').to_string();
    sanitized.truncate(MAX_NAME_LEN);

    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}
