//! Backend acquisition
//!
//! A [`Connector`] turns a [`ConnectionConfig`] into a backend handle when the
//! data store is initialised.

use crate::backend::ObjectBackend;
use crate::s3::S3Backend;
use async_trait::async_trait;
use coffer_core::{ConnectionConfig, Result};
use std::fmt;
use std::sync::Arc;

/// Opens a backend handle for a connection configuration
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn ObjectBackend>>;
}

/// Connects to an S3-compatible endpoint through `aws-sdk-s3`
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Connector;

#[async_trait]
impl Connector for S3Connector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn ObjectBackend>> {
        Ok(Arc::new(S3Backend::connect(config).await))
    }
}
