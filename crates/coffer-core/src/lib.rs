//! # coffer-core
//!
//! Core library for Coffer providing:
//! - The [`DataStore`] contract for S3-compatible object storage
//! - Data model ([`DataModel`], [`StoreInfo`], [`Listing`])
//! - Session options and per-call request builders
//! - The pluggable [`CryptoService`] hook and a ChaCha20-Poly1305 implementation
//! - Connection configuration with environment overrides

pub mod attributes;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod options;
pub mod security;
pub mod store;
pub mod types;

pub use attributes::{Attributes, IS_PUBLIC};
pub use config::ConnectionConfig;
pub use context::CallContext;
pub use crypto::{ChaChaCryptoService, CryptoError, CryptoService};
pub use error::{BackendError, BackendErrorKind, Error, Result};
pub use options::{
    compose, ApplyOption, CopyOptions, DeleteOptions, GetOptions, ListOptions, SetOptions,
    StoreOption, StoreOptions,
};
pub use security::SecureString;
pub use store::{DataStore, ObjectStream};
pub use types::{DataModel, Listing, ObjectSummary, StoreInfo};
