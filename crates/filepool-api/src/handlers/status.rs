//! Pool status handler.
//!
//! Reports the configured accounts and, where the backend supports it, their
//! storage usage. Usage queries run concurrently and failures degrade to a
//! `null` usage entry rather than failing the whole response.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::HeaderMap, Json};
use futures::future::join_all;
use serde::Serialize;

use crate::auth::{verify_upload_key, UPLOAD_KEY_HEADER};
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::ip_extraction::PeerAddr;

const USAGE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub accounts_active: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_account: Option<String>,
    pub accounts: Vec<AccountStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    pub name: String,
    pub kind: String,
    pub usage: Option<AccountUsage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUsage {
    pub used_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_bytes: Option<u64>,
}

#[tracing::instrument(skip(state, headers, peer), fields(operation = "pool_status"))]
pub async fn pool_status(
    State(state): State<Arc<AppState>>,
    PeerAddr(peer): PeerAddr,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, HttpAppError> {
    let provided = headers.get(UPLOAD_KEY_HEADER).and_then(|v| v.to_str().ok());
    verify_upload_key(state.config.upload_secret_key(), provided).map_err(|e| {
        let client_ip = crate::utils::ip_extraction::extract_client_ip(
            &headers,
            peer.as_ref(),
            state.config.trusted_proxy_count(),
        );
        tracing::warn!(client_ip = %client_ip, "Rejected status request key");
        HttpAppError(e)
    })?;

    let pool = state.uploader.pool();

    let usage_queries = pool.entries().iter().map(|entry| async move {
        let usage = match tokio::time::timeout(USAGE_TIMEOUT, entry.backend.usage()).await {
            Ok(Ok(usage)) => usage,
            Ok(Err(e)) => {
                tracing::warn!(account = %entry.name, error = %e, "Usage query failed");
                None
            }
            Err(_) => {
                tracing::warn!(account = %entry.name, "Usage query timed out");
                None
            }
        };

        AccountStatus {
            name: entry.name.clone(),
            kind: entry.backend.kind().as_str().to_string(),
            usage: usage.map(|u| AccountUsage {
                used_bytes: u.used_bytes,
                limit_bytes: u.limit_bytes,
            }),
        }
    });

    let accounts = join_all(usage_queries).await;

    Ok(Json(StatusResponse {
        success: true,
        accounts_active: pool.len(),
        next_account: pool.next_in_line().map(ToString::to_string),
        accounts,
    }))
}
