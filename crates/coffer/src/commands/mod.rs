//! CLI command implementations

pub mod keygen;
pub mod object;
pub mod reset;
pub mod stats;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use coffer_core::{
    CallContext, ChaChaCryptoService, ConnectionConfig, DataStore, SecureString, StoreOption,
};
use coffer_s3::S3DataStore;
use std::sync::Arc;
use tracing::debug;

use crate::cli::ConnectionArgs;

/// Everything needed to open a data store, as given on the command line
#[derive(Debug, Clone)]
pub struct Session {
    config_path: Option<Utf8PathBuf>,
    connection: ConnectionArgs,
}

impl Session {
    pub fn new(config_path: Option<Utf8PathBuf>, connection: ConnectionArgs) -> Self {
        Self {
            config_path,
            connection,
        }
    }

    /// Resolve the connection: config file (or environment), then flags
    pub fn connection_config(&self) -> Result<ConnectionConfig> {
        let mut config = match &self.config_path {
            Some(path) => ConnectionConfig::load(path.as_std_path())
                .with_context(|| format!("Failed to load config from {}", path))?,
            None => ConnectionConfig::from_env().context("Failed to read COFFER_* variables")?,
        };

        let flags = &self.connection;
        if let Some(endpoint) = &flags.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(access_key) = &flags.access_key {
            config.access_key_id = access_key.clone();
        }
        if let Some(secret_key) = &flags.secret_key {
            config.secret_access_key = SecureString::new(secret_key.clone());
        }
        if flags.secure {
            config.secure = true;
        }
        if let Some(region) = &flags.region {
            config.region = region.clone();
        }

        debug!("Resolved connection: {:?}", config);
        Ok(config)
    }

    /// Session options derived from the flags
    pub fn store_options(&self) -> Result<Vec<StoreOption>> {
        let mut options = Vec::new();
        if let Some(key_file) = &self.connection.key_file {
            let crypto = ChaChaCryptoService::from_key_file(key_file)
                .with_context(|| format!("Failed to load key file {}", key_file.display()))?;
            options.push(StoreOption::crypto_service(Arc::new(crypto)));
        }
        Ok(options)
    }

    /// Build and initialise a data store
    pub async fn open(&self, ctx: &CallContext) -> Result<S3DataStore> {
        let config = self.connection_config()?;
        let mut store = S3DataStore::new(config, vec![]).context("Invalid connection settings")?;
        store
            .init(ctx, self.store_options()?)
            .await
            .with_context(|| format!("Failed to connect to {}", store))?;
        Ok(store)
    }
}

/// Close a store, logging rather than failing on error
pub async fn close(mut store: S3DataStore, ctx: &CallContext) {
    if let Err(e) = store.close(ctx).await {
        tracing::warn!("Failed to close {}: {}", store, e);
    }
}
