//! Configuration module
//!
//! Environment-backed configuration for the upload relay: server settings, the
//! shared upload secret, payload limits, orchestrator tuning, and the set of
//! provider accounts (delegated to [`crate::credentials`]).

use std::env;
use std::time::Duration;

use crate::credentials::{collect_accounts, ProviderCredentials};

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_MAX_FILE_SIZE_MB: usize = 5;
const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 20;
const DEFAULT_TRUSTED_PROXY_COUNT: usize = 1;

/// How the orchestrator walks the account pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolTopology {
    /// Fixed order, sweep always starts at the first account.
    Ordered,
    /// Rotation cursor spreads load across same-kind accounts.
    RoundRobin,
    /// Resolved at pool build time: round-robin when all accounts share a
    /// backend kind, ordered otherwise.
    Auto,
}

impl PoolTopology {
    fn parse(value: &str) -> Result<Self, anyhow::Error> {
        match value.to_lowercase().as_str() {
            "ordered" => Ok(PoolTopology::Ordered),
            "round-robin" | "round_robin" => Ok(PoolTopology::RoundRobin),
            "auto" => Ok(PoolTopology::Auto),
            other => Err(anyhow::anyhow!(
                "POOL_TOPOLOGY must be 'ordered', 'round-robin' or 'auto', got '{}'",
                other
            )),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    server_port: u16,
    environment: String,
    cors_origins: Vec<String>,
    upload_secret_key: Option<String>,
    max_file_size_bytes: usize,
    attempt_timeout: Duration,
    spill_threshold_bytes: usize,
    topology: PoolTopology,
    http_rate_limit_per_minute: u32,
    trusted_proxy_count: usize,
    providers: Vec<ProviderCredentials>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| DEFAULT_MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(DEFAULT_MAX_FILE_SIZE_MB);
        let max_file_size_bytes = max_file_size_mb * 1024 * 1024;

        // Payloads above the threshold are staged on temp disk instead of in
        // memory. Defaults to the max file size, i.e. memory staging only.
        let spill_threshold_bytes = env::var("STAGING_SPILL_THRESHOLD_MB")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .map(|mb| mb * 1024 * 1024)
            .unwrap_or(max_file_size_bytes);

        let config = Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            cors_origins,
            upload_secret_key: env::var("UPLOAD_SECRET_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            max_file_size_bytes,
            attempt_timeout: Duration::from_secs(
                env::var("UPLOAD_ATTEMPT_TIMEOUT_SECS")
                    .unwrap_or_else(|_| DEFAULT_ATTEMPT_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            ),
            spill_threshold_bytes,
            topology: PoolTopology::parse(
                &env::var("POOL_TOPOLOGY").unwrap_or_else(|_| "auto".to_string()),
            )?,
            http_rate_limit_per_minute: env::var("HTTP_RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| DEFAULT_RATE_LIMIT_PER_MINUTE.to_string())
                .parse()
                .unwrap_or(DEFAULT_RATE_LIMIT_PER_MINUTE),
            trusted_proxy_count: env::var("TRUSTED_PROXY_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TRUSTED_PROXY_COUNT),
            providers: collect_accounts(|name| env::var(name).ok()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }

        // Both are request-time failures (500) rather than startup failures so
        // the service still boots far enough to report them, but warn loudly.
        if self.upload_secret_key.is_none() {
            tracing::warn!("UPLOAD_SECRET_KEY not set; every upload will be rejected");
        }
        if self.providers.is_empty() {
            tracing::warn!("No fully-configured storage accounts; uploads cannot succeed");
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    pub fn upload_secret_key(&self) -> Option<&str> {
        self.upload_secret_key.as_deref()
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_bytes
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub fn spill_threshold_bytes(&self) -> usize {
        self.spill_threshold_bytes
    }

    pub fn topology(&self) -> PoolTopology {
        self.topology
    }

    pub fn http_rate_limit_per_minute(&self) -> u32 {
        self.http_rate_limit_per_minute
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.trusted_proxy_count
    }

    pub fn providers(&self) -> &[ProviderCredentials] {
        &self.providers
    }

    /// Construct a config directly. Intended for tests and embedding.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server_port: u16,
        environment: String,
        cors_origins: Vec<String>,
        upload_secret_key: Option<String>,
        max_file_size_bytes: usize,
        attempt_timeout: Duration,
        topology: PoolTopology,
        providers: Vec<ProviderCredentials>,
    ) -> Self {
        Config {
            server_port,
            environment,
            cors_origins,
            upload_secret_key,
            max_file_size_bytes,
            attempt_timeout,
            spill_threshold_bytes: max_file_size_bytes,
            topology,
            http_rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            trusted_proxy_count: DEFAULT_TRUSTED_PROXY_COUNT,
            providers,
        }
    }
}
