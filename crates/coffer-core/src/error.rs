//! Error types for coffer-core

use crate::crypto::CryptoError;
use crate::types::{DataModel, Listing, StoreInfo};
use thiserror::Error;

/// Result type alias using coffer-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error source carried by backend failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error types for Coffer
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration option or the connection configuration is invalid
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A per-call option failed validation
    #[error("Invalid {operation} option: {message}")]
    InvalidOption {
        operation: &'static str,
        message: String,
    },

    /// A data operation ran before `init` (or after `close`)
    #[error("Data store is not initialized: call init before {operation}")]
    NotInitialized { operation: &'static str },

    /// The requested object does not exist
    #[error("Object not found: {bucket}/{object}")]
    NotFound { bucket: String, object: String },

    /// The backend rejected or failed a request
    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    /// The destination bucket could not be checked, created or given a policy
    #[error("Failed to provision bucket {bucket}: {source}")]
    Provisioning {
        bucket: String,
        #[source]
        source: BackendError,
    },

    /// The configured crypto service failed to encrypt a payload
    #[error("{operation} on {store}: encryption failed: {source}")]
    Encrypt {
        operation: &'static str,
        store: String,
        #[source]
        source: CryptoError,
    },

    /// The configured crypto service failed to decrypt a payload.
    ///
    /// The still-encrypted model is kept so callers can inspect or retry.
    #[error("{operation} on {store}: decryption failed: {source}")]
    Decrypt {
        operation: &'static str,
        store: String,
        #[source]
        source: CryptoError,
        model: Box<DataModel>,
    },

    /// Enumeration stopped early; the listing holds what was collected before
    /// the failure and its total is a lower bound.
    #[error("Listing aborted after {} object(s): {source}", .partial.total)]
    PartialListing {
        partial: Box<Listing>,
        #[source]
        source: Box<Error>,
    },

    /// Statistics collection stopped early; the info holds the counters
    /// gathered before the failure (zeroed when no bucket could be listed).
    #[error("Store info incomplete after {} object(s): {source}", .partial.num_objects)]
    PartialInfo {
        partial: Box<StoreInfo>,
        #[source]
        source: Box<Error>,
    },

    /// A best-effort reset visited everything but some steps failed
    #[error(
        "Reset finished with {} failure(s); first: {}",
        .failures.len(),
        first_failure(.failures)
    )]
    ResetIncomplete { failures: Vec<Error> },

    /// The call context was cancelled
    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },

    /// The call context deadline passed
    #[error("{operation} exceeded its deadline")]
    DeadlineExceeded { operation: &'static str },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn first_failure(failures: &[Error]) -> String {
    failures
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

impl Error {
    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid option error
    pub fn invalid_option(operation: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            operation,
            message: message.into(),
        }
    }

    /// Create a not initialized error
    pub fn not_initialized(operation: &'static str) -> Self {
        Self::NotInitialized { operation }
    }

    /// Create a not found error
    pub fn not_found(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    /// Wrap a backend error with the operation that produced it
    pub fn backend(operation: &'static str, source: BackendError) -> Self {
        Self::Backend { operation, source }
    }

    /// Create a provisioning error
    pub fn provisioning(bucket: impl Into<String>, source: BackendError) -> Self {
        Self::Provisioning {
            bucket: bucket.into(),
            source,
        }
    }

    /// Whether this error means the addressed object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Backend { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Whether this error came from a cancelled or expired call context
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => true,
            Self::PartialInfo { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// The individual failures of an incomplete reset
    pub fn failures(&self) -> &[Error] {
        match self {
            Self::ResetIncomplete { failures } => failures,
            _ => &[],
        }
    }

    /// The still-encrypted model attached to a decryption failure
    pub fn undecrypted_model(&self) -> Option<&DataModel> {
        match self {
            Self::Decrypt { model, .. } => Some(model),
            _ => None,
        }
    }

    /// Take the still-encrypted model out of a decryption failure
    pub fn into_undecrypted_model(self) -> Option<DataModel> {
        match self {
            Self::Decrypt { model, .. } => Some(*model),
            _ => None,
        }
    }

    /// The partial listing attached to an aborted enumeration
    pub fn partial_listing(&self) -> Option<&Listing> {
        match self {
            Self::PartialListing { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// The counters collected before statistics gathering failed
    pub fn partial_info(&self) -> Option<&StoreInfo> {
        match self {
            Self::PartialInfo { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// Classification of a backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Bucket or object does not exist
    NotFound,
    /// Credentials rejected or permission denied
    AccessDenied,
    /// Resource state prevents the request (e.g. bucket not empty, or a
    /// bucket name taken by another account)
    Conflict,
    /// The bucket being created already exists and belongs to the caller
    AlreadyOwned,
    /// Network, timeout or dispatch failure before a response was received
    Transport,
    /// Any other error response from the service
    Service,
    /// Failure injected by a test backend
    Injected,
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendErrorKind::NotFound => write!(f, "not found"),
            BackendErrorKind::AccessDenied => write!(f, "access denied"),
            BackendErrorKind::Conflict => write!(f, "conflict"),
            BackendErrorKind::AlreadyOwned => write!(f, "already owned"),
            BackendErrorKind::Transport => write!(f, "transport"),
            BackendErrorKind::Service => write!(f, "service"),
            BackendErrorKind::Injected => write!(f, "injected"),
        }
    }
}

/// A failure reported by an object backend
#[derive(Error, Debug)]
#[error("{message} ({kind})")]
pub struct BackendError {
    kind: BackendErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl BackendError {
    /// Create a backend error without an underlying cause
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a backend error wrapping an underlying cause
    pub fn with_source(
        kind: BackendErrorKind,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }

    pub fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == BackendErrorKind::NotFound
    }
}
