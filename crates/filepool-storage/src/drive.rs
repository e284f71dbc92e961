//! Drive storage adapter.
//!
//! Wraps one Drive account behind the OAuth refresh-token flow: mint an
//! access token, upload the file with a multipart/related request, then grant
//! anyone-with-link read access. Drive defaults files to private, so the
//! permission grant is part of the store contract - if it fails, the whole
//! store fails and the orphaned file is deleted best-effort.

use async_trait::async_trait;
use filepool_core::{DriveCredentials, ProviderKind};
use serde::Deserialize;

use crate::keys;
use crate::staged::StagedPayload;
use crate::traits::{StorageBackend, StorageError, StorageResult, StorageUsage, StoredObject};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const API_URL: &str = "https://www.googleapis.com/drive/v3";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutResponse {
    storage_quota: QuotaResponse,
}

// Drive reports quota numbers as decimal strings.
#[derive(Debug, Deserialize)]
struct QuotaResponse {
    usage: Option<String>,
    limit: Option<String>,
}

/// Drive adapter for one credentialed account.
pub struct DriveBackend {
    client: reqwest::Client,
    credentials: DriveCredentials,
    token_url: String,
    upload_url: String,
    api_url: String,
}

impl DriveBackend {
    pub fn new(credentials: &DriveCredentials) -> Self {
        DriveBackend {
            client: reqwest::Client::new(),
            credentials: credentials.clone(),
            token_url: TOKEN_URL.to_string(),
            upload_url: UPLOAD_URL.to_string(),
            api_url: API_URL.to_string(),
        }
    }

    /// Exchange the refresh token for a short-lived access token.
    async fn fetch_access_token(&self) -> StorageResult<String> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| StorageError::AuthFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::AuthFailed(format!(
                "token refresh returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::AuthFailed(e.to_string()))?;
        Ok(token.access_token)
    }

    /// Grant anyone-with-link read access to a stored file.
    async fn grant_public_read(&self, access_token: &str, file_id: &str) -> StorageResult<()> {
        let response = self
            .client
            .post(format!("{}/files/{}/permissions", self.api_url, file_id))
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .map_err(|e| StorageError::AccessGrantFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::AccessGrantFailed(format!(
                "permission grant returned {status}: {body}"
            )));
        }

        Ok(())
    }

    async fn delete_file(&self, access_token: &str, file_id: &str) {
        let result = self
            .client
            .delete(format!("{}/files/{}", self.api_url, file_id))
            .bearer_auth(access_token)
            .send()
            .await;
        if let Err(e) = result {
            tracing::warn!(
                account = %self.credentials.name,
                file_id = %file_id,
                error = %e,
                "Failed to delete inaccessible Drive file"
            );
        }
    }

    fn public_url(file_id: &str) -> String {
        format!("https://drive.google.com/uc?export=view&id={file_id}")
    }

    /// Assemble the multipart/related body: JSON metadata part followed by
    /// the media part.
    fn build_upload_body(
        boundary: &str,
        metadata: &serde_json::Value,
        content_type: &str,
        data: &[u8],
    ) -> Vec<u8> {
        let mut body = Vec::with_capacity(data.len() + 512);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata.to_string().as_bytes());
        body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }
}

#[async_trait]
impl StorageBackend for DriveBackend {
    async fn store(
        &self,
        payload: &StagedPayload,
        filename: &str,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        let access_token = self.fetch_access_token().await?;

        let object_name = keys::generate_object_name(filename);
        let mut metadata = serde_json::json!({ "name": object_name });
        if let Some(ref folder_id) = self.credentials.folder_id {
            metadata["parents"] = serde_json::json!([folder_id]);
        }

        let data = payload.bytes().await?;
        let size = data.len() as u64;
        let boundary = format!("filepool-{}", uuid::Uuid::new_v4());
        let body = Self::build_upload_body(&boundary, &metadata, content_type, &data);

        let start = std::time::Instant::now();

        let response = self
            .client
            .post(format!("{}?uploadType=multipart&fields=id", self.upload_url))
            .bearer_auth(&access_token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(
                account = %self.credentials.name,
                status = %status,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Drive upload failed"
            );
            return Err(StorageError::UploadFailed(format!(
                "upload returned {status}: {detail}"
            )));
        }

        let file: FileResponse = response
            .json()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        // A stored-but-private file is not a valid success.
        if let Err(e) = self.grant_public_read(&access_token, &file.id).await {
            self.delete_file(&access_token, &file.id).await;
            return Err(e);
        }

        tracing::info!(
            account = %self.credentials.name,
            file_id = %file.id,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Drive upload successful"
        );

        Ok(StoredObject {
            url: Self::public_url(&file.id),
            provider_id: file.id,
        })
    }

    async fn usage(&self) -> StorageResult<Option<StorageUsage>> {
        let access_token = self.fetch_access_token().await?;

        let response = self
            .client
            .get(format!("{}/about?fields=storageQuota", self.api_url))
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| StorageError::UsageFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::UsageFailed(format!(
                "usage query returned {}",
                response.status()
            )));
        }

        let about: AboutResponse = response
            .json()
            .await
            .map_err(|e| StorageError::UsageFailed(e.to_string()))?;

        let used_bytes = about
            .storage_quota
            .usage
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let limit_bytes = about.storage_quota.limit.and_then(|s| s.parse().ok());

        Ok(Some(StorageUsage {
            used_bytes,
            limit_bytes,
        }))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Drive
    }
}
