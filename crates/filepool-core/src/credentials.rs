//! Provider credential bundles.
//!
//! Each configured storage account is described by one credential bundle read
//! from indexed environment variables (`S3_BUCKET_1`, `DRIVE_REFRESH_TOKEN_2`,
//! ...). Only fully-populated bundles are eligible; a bundle with some but not
//! all of its required fields is excluded at startup and never retried.

/// Backend kind for a configured account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    S3,
    Drive,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::S3 => "s3",
            ProviderKind::Drive => "drive",
        }
    }
}

/// Credentials for one S3 (or S3-compatible) account.
#[derive(Debug, Clone)]
pub struct S3Credentials {
    pub name: String,
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, ...).
    pub endpoint: Option<String>,
}

/// Credentials for one Drive account (OAuth refresh-token flow).
#[derive(Debug, Clone)]
pub struct DriveCredentials {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Destination folder. When absent, files land in the Drive root.
    pub folder_id: Option<String>,
}

/// One eligible account: a display name plus an opaque credential bundle.
#[derive(Debug, Clone)]
pub enum ProviderCredentials {
    S3(S3Credentials),
    Drive(DriveCredentials),
}

impl ProviderCredentials {
    pub fn name(&self) -> &str {
        match self {
            ProviderCredentials::S3(c) => &c.name,
            ProviderCredentials::Drive(c) => &c.name,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderCredentials::S3(_) => ProviderKind::S3,
            ProviderCredentials::Drive(_) => ProviderKind::Drive,
        }
    }
}

/// Highest account index scanned per backend kind.
const MAX_ACCOUNTS_PER_KIND: usize = 8;

/// Collect eligible accounts using the given variable lookup.
///
/// The lookup abstraction exists so tests can supply a map instead of mutating
/// process environment. Empty-string values count as absent.
pub fn collect_accounts<F>(lookup: F) -> Vec<ProviderCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let mut accounts = Vec::new();

    for i in 1..=MAX_ACCOUNTS_PER_KIND {
        let bucket = get(&format!("S3_BUCKET_{i}"));
        let region = get(&format!("S3_REGION_{i}"));
        let access_key_id = get(&format!("S3_ACCESS_KEY_ID_{i}"));
        let secret_access_key = get(&format!("S3_SECRET_ACCESS_KEY_{i}"));
        let endpoint = get(&format!("S3_ENDPOINT_{i}"));

        let any_set = bucket.is_some()
            || region.is_some()
            || access_key_id.is_some()
            || secret_access_key.is_some();

        match (bucket, region, access_key_id, secret_access_key) {
            (Some(bucket), Some(region), Some(access_key_id), Some(secret_access_key)) => {
                accounts.push(ProviderCredentials::S3(S3Credentials {
                    name: format!("S3-{i}"),
                    bucket,
                    region,
                    access_key_id,
                    secret_access_key,
                    endpoint,
                }));
            }
            _ if any_set => {
                tracing::warn!(
                    account = %format!("S3-{i}"),
                    "Partially configured S3 account excluded from pool"
                );
            }
            _ => {}
        }
    }

    for i in 1..=MAX_ACCOUNTS_PER_KIND {
        let client_id = get(&format!("DRIVE_CLIENT_ID_{i}"));
        let client_secret = get(&format!("DRIVE_CLIENT_SECRET_{i}"));
        let refresh_token = get(&format!("DRIVE_REFRESH_TOKEN_{i}"));
        let folder_id = get(&format!("DRIVE_FOLDER_ID_{i}"));

        let any_set = client_id.is_some() || client_secret.is_some() || refresh_token.is_some();

        match (client_id, client_secret, refresh_token) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                accounts.push(ProviderCredentials::Drive(DriveCredentials {
                    name: format!("Drive-{i}"),
                    client_id,
                    client_secret,
                    refresh_token,
                    folder_id,
                }));
            }
            _ if any_set => {
                tracing::warn!(
                    account = %format!("Drive-{i}"),
                    "Partially configured Drive account excluded from pool"
                );
            }
            _ => {}
        }
    }

    accounts
}
