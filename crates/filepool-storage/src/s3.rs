use crate::keys;
use crate::staged::StagedPayload;
use crate::traits::{StorageBackend, StorageError, StorageResult, StoredObject};
use async_trait::async_trait;
use filepool_core::{ProviderKind, S3Credentials};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{ObjectStoreExt, PutPayload, Result as ObjectResult};

/// S3 (or S3-compatible) storage adapter for one credentialed account.
///
/// Public read access is governed by the bucket policy; the generated URL
/// assumes the `uploads/` prefix is world-readable.
#[derive(Clone)]
pub struct S3Backend {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
}

impl S3Backend {
    /// Build an adapter from one credential bundle. Credentials are applied
    /// explicitly so multiple accounts can coexist in one process.
    pub fn new(credentials: &S3Credentials) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_region(credentials.region.clone())
            .with_bucket_name(credentials.bucket.clone())
            .with_access_key_id(credentials.access_key_id.clone())
            .with_secret_access_key(credentials.secret_access_key.clone());

        if let Some(ref endpoint) = credentials.endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Backend {
            store,
            bucket: credentials.bucket.clone(),
            region: credentials.region.clone(),
            endpoint_url: credentials.endpoint.clone(),
        })
    }

    /// Public URL for an object key.
    ///
    /// Standard AWS format when no custom endpoint is set; path-style
    /// `{endpoint}/{bucket}/{key}` otherwise for S3-compatible providers.
    fn generate_url(&self, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, self.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            )
        }
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn store(
        &self,
        payload: &StagedPayload,
        filename: &str,
        _content_type: &str,
    ) -> StorageResult<StoredObject> {
        let key = keys::generate_object_key(filename);
        let bytes = payload.bytes().await?;
        let size = bytes.len() as u64;
        let location = Path::from(key.clone());

        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.put(&location, PutPayload::from(bytes)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        let url = self.generate_url(&key);

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(StoredObject {
            url,
            provider_id: key,
        })
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::S3
    }
}
