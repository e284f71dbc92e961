//! Pool construction from configuration.

use std::sync::Arc;

use filepool_core::{Config, PoolTopology, ProviderCredentials};

use crate::drive::DriveBackend;
use crate::pool::{AccountEntry, AccountPool, Topology};
use crate::s3::S3Backend;
use crate::traits::{StorageBackend, StorageResult};

/// Build the account pool from the configured credential bundles.
///
/// `Auto` topology resolves to round-robin when every account is the same
/// backend kind (interchangeable capacity), ordered otherwise (a preference
/// chain across kinds).
pub fn build_pool(config: &Config) -> StorageResult<Arc<AccountPool>> {
    let providers = config.providers();
    let topology = resolve_topology(config.topology(), providers);

    let mut entries = Vec::with_capacity(providers.len());
    for credentials in providers {
        let backend: Arc<dyn StorageBackend> = match credentials {
            ProviderCredentials::S3(creds) => Arc::new(S3Backend::new(creds)?),
            ProviderCredentials::Drive(creds) => Arc::new(DriveBackend::new(creds)),
        };
        tracing::info!(
            account = %credentials.name(),
            kind = %credentials.kind().as_str(),
            "Registered storage account"
        );
        entries.push(AccountEntry {
            name: credentials.name().to_string(),
            backend,
        });
    }

    tracing::info!(
        accounts = entries.len(),
        topology = ?topology,
        "Storage pool ready"
    );

    Ok(Arc::new(AccountPool::new(entries, topology)))
}

fn resolve_topology(configured: PoolTopology, providers: &[ProviderCredentials]) -> Topology {
    match configured {
        PoolTopology::Ordered => Topology::Ordered,
        PoolTopology::RoundRobin => Topology::RoundRobin,
        PoolTopology::Auto => {
            let mut kinds = providers.iter().map(|p| p.kind());
            let homogeneous = match kinds.next() {
                Some(first) => kinds.all(|k| k == first),
                None => false,
            };
            if homogeneous {
                Topology::RoundRobin
            } else {
                Topology::Ordered
            }
        }
    }
}
