//! Upload handler
//!
//! Accepts one file as multipart form data, authenticates the caller, stages
//! the payload, and hands it to the orchestrator. The staged resource is
//! released on every exit path via `StagedPayload`'s drop behavior.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    Json,
};
use bytes::{Bytes, BytesMut};
use filepool_core::AppError;
use filepool_storage::StagedPayload;
use serde::Serialize;

use crate::auth::{verify_upload_key, UPLOAD_KEY_FIELD, UPLOAD_KEY_HEADER};
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::ip_extraction::{extract_client_ip, PeerAddr};

fn check_key(
    state: &AppState,
    headers: &HeaderMap,
    peer: Option<std::net::SocketAddr>,
    provided: Option<&str>,
) -> Result<(), HttpAppError> {
    verify_upload_key(state.config.upload_secret_key(), provided).map_err(|e| {
        let client_ip =
            extract_client_ip(headers, peer.as_ref(), state.config.trusted_proxy_count());
        tracing::warn!(client_ip = %client_ip, "Rejected upload key");
        HttpAppError(e)
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub asset_url: String,
    pub asset_id: String,
    pub service: String,
    pub filename: String,
    pub size: usize,
}

struct ParsedForm {
    file: Option<ReceivedFile>,
    form_key: Option<String>,
}

struct ReceivedFile {
    data: Bytes,
    filename: String,
    content_type: String,
}

/// Read the multipart form: one `file` field plus an optional `uploadKey`.
///
/// The file field is size-capped while streaming so an oversized body never
/// accumulates past the limit.
async fn parse_form(mut multipart: Multipart, max_bytes: usize) -> Result<ParsedForm, AppError> {
    let mut parsed = ParsedForm {
        file: None,
        form_key: None,
    };

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "file".to_string());
                let content_type = field
                    .content_type()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                let mut data = BytesMut::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read file: {}", e)))?
                {
                    if data.len() + chunk.len() > max_bytes {
                        return Err(AppError::PayloadTooLarge(format!(
                            "File too large. Maximum allowed size is {} MB.",
                            max_bytes / 1024 / 1024
                        )));
                    }
                    data.extend_from_slice(&chunk);
                }

                parsed.file = Some(ReceivedFile {
                    data: data.freeze(),
                    filename,
                    content_type,
                });
            }
            Some(name) if name == UPLOAD_KEY_FIELD => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Malformed form field: {}", e)))?;
                parsed.form_key = Some(value);
            }
            _ => {
                // Unknown fields are skipped, matching common form clients
                // that send extra metadata.
            }
        }
    }

    Ok(parsed)
}

/// Upload a file through the account pool.
///
/// The upload key is taken from the `x-upload-key` header when present,
/// otherwise from the `uploadKey` form field. A header key is verified before
/// the body is read at all.
#[tracing::instrument(
    skip(state, headers, peer, multipart),
    fields(operation = "upload_file")
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    PeerAddr(peer): PeerAddr,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let header_key = headers
        .get(UPLOAD_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    // Fail fast before touching the body when the header key is wrong.
    if let Some(ref key) = header_key {
        check_key(&state, &headers, peer, Some(key))?;
    }

    let parsed = parse_form(multipart, state.config.max_file_size_bytes())
        .await
        .map_err(HttpAppError::from)?;

    if header_key.is_none() {
        check_key(&state, &headers, peer, parsed.form_key.as_deref())?;
    }

    let file = parsed
        .file
        .ok_or_else(|| HttpAppError(AppError::InvalidInput("No file uploaded.".to_string())))?;

    // Zero-byte files are legal; the backends accept them.
    let size = file.data.len();
    let payload = StagedPayload::stage(file.data, state.config.spill_threshold_bytes())
        .map_err(|e| HttpAppError(AppError::from(e)))?;

    let outcome = match state
        .uploader
        .upload(&payload, &file.filename, &file.content_type)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // Drop of `payload` releases the staged resource.
            return Err(HttpAppError::from(e));
        }
    };

    payload.release();

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded successfully.".to_string(),
        asset_url: outcome.url,
        asset_id: outcome.provider_id,
        service: outcome.service,
        filename: file.filename,
        size,
    }))
}
