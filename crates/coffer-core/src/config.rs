//! Connection configuration
//!
//! Loaded with the following precedence (low to high):
//! 1. Defaults (`region = us-east-1`, `secure = false`)
//! 2. YAML file (`coffer.yaml`)
//! 3. Environment variables (`COFFER_*` prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::security::{SecureString, MASK};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Environment variable overriding the endpoint
pub const ENV_ENDPOINT: &str = "COFFER_ENDPOINT";
/// Environment variable overriding the transport-security flag
pub const ENV_SECURE: &str = "COFFER_SECURE";
/// Environment variable overriding the access key id
pub const ENV_ACCESS_KEY_ID: &str = "COFFER_ACCESS_KEY_ID";
/// Environment variable overriding the secret access key
pub const ENV_SECRET_ACCESS_KEY: &str = "COFFER_SECRET_ACCESS_KEY";
/// Environment variable overriding the region
pub const ENV_REGION: &str = "COFFER_REGION";

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Parameters needed to reach an S3-compatible backend
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Host and port of the backend, e.g. `127.0.0.1:9000`
    pub endpoint: String,
    /// Use TLS when talking to the backend
    #[serde(default)]
    pub secure: bool,
    pub access_key_id: String,
    pub secret_access_key: SecureString,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl ConnectionConfig {
    pub fn new(
        endpoint: impl Into<String>,
        secure: bool,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<SecureString>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            secure,
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: default_region(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Parse a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Load a YAML file (`~` is expanded) and apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let expanded_path = shellexpand::tilde(&path.to_string_lossy()).to_string();
        debug!("Loading connection config from {}", expanded_path);
        let content = std::fs::read_to_string(&expanded_path)?;
        let config = Self::from_yaml_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", expanded_path, e)))?;
        config.apply_env_overrides()
    }

    /// Build entirely from `COFFER_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new("", false, "", "").apply_env_overrides()
    }

    /// Apply `COFFER_*` environment variable overrides
    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(endpoint) = env::var(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Ok(secure) = env::var(ENV_SECURE) {
            self.secure = parse_bool(ENV_SECURE, &secure)?;
        }
        if let Ok(access_key_id) = env::var(ENV_ACCESS_KEY_ID) {
            self.access_key_id = access_key_id;
        }
        if let Ok(secret) = env::var(ENV_SECRET_ACCESS_KEY) {
            self.secret_access_key = SecureString::new(secret);
        }
        if let Ok(region) = env::var(ENV_REGION) {
            self.region = region;
        }
        Ok(self)
    }

    /// Check that every field needed to connect is present
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::invalid_config("endpoint must not be empty"));
        }
        if self.endpoint.contains("://") {
            return Err(Error::invalid_config(format!(
                "endpoint must be host[:port] without a scheme, got {}",
                self.endpoint
            )));
        }
        if self.access_key_id.trim().is_empty() {
            return Err(Error::invalid_config("access key id must not be empty"));
        }
        if self.secret_access_key.is_empty() {
            return Err(Error::invalid_config("secret access key must not be empty"));
        }
        if self.region.trim().is_empty() {
            return Err(Error::invalid_config("region must not be empty"));
        }
        Ok(())
    }

    /// Transport scheme derived from the security flag
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Full URL handed to the backend client
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}", self.scheme(), self.endpoint)
    }

    /// `<store_type>://<endpoint>`, safe for display
    pub fn descriptor(&self, store_type: &str) -> String {
        format!("{}://{}", store_type, self.endpoint)
    }

    /// `<store_type>://<accessKey>:***@<endpoint>, secure: <bool>`, safe for diagnostics
    pub fn masked_descriptor(&self, store_type: &str) -> String {
        format!(
            "{}://{}:{}@{}, secure: {}",
            store_type, self.access_key_id, MASK, self.endpoint, self.secure
        )
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::invalid_config(format!(
            "{} must be a boolean, got {}",
            name, other
        ))),
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("secure", &self.secure)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key)
            .field("region", &self.region)
            .finish()
    }
}
