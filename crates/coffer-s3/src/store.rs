//! S3-compatible data store
//!
//! [`S3DataStore`] implements the [`DataStore`] contract over any
//! [`ObjectBackend`]. Writes provision their destination bucket first and,
//! when a crypto service is configured, payloads are encrypted on `set` and
//! decrypted on `get`. Copies happen server-side and never re-encrypt.

use crate::aggregate::Aggregator;
use crate::backend::ObjectBackend;
use crate::connector::{Connector, S3Connector};
use crate::erase::BulkEraser;
use crate::listing::walk_objects;
use crate::provisioner::BucketProvisioner;
use async_trait::async_trait;
use bytes::Bytes;
use coffer_core::{
    compose, Attributes, BackendError, CallContext, ConnectionConfig, CopyOptions, DataModel,
    DataStore, DeleteOptions, Error, GetOptions, ListOptions, Listing, ObjectStream, Result,
    SetOptions, StoreInfo, StoreOption, StoreOptions,
};
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Store type reported in descriptors and [`StoreInfo`]
pub const STORE_TYPE: &str = "s3";

/// Data store backed by S3 or an S3-compatible service
pub struct S3DataStore {
    config: ConnectionConfig,
    options: StoreOptions,
    connector: Box<dyn Connector>,
    backend: Option<Arc<dyn ObjectBackend>>,
}

impl S3DataStore {
    /// Create a store that connects through `aws-sdk-s3` on `init`
    pub fn new(config: ConnectionConfig, options: Vec<StoreOption>) -> Result<Self> {
        Self::with_connector(config, S3Connector, options)
    }

    /// Create a store that acquires its backend from `connector`
    pub fn with_connector(
        config: ConnectionConfig,
        connector: impl Connector + 'static,
        options: Vec<StoreOption>,
    ) -> Result<Self> {
        config.validate()?;
        let mut store_options = StoreOptions::new();
        compose(&mut store_options, options)?;

        Ok(Self {
            config,
            options: store_options,
            connector: Box::new(connector),
            backend: None,
        })
    }

    /// Masked connection descriptor; the secret is never included
    pub fn connection_info(&self) -> String {
        self.config.masked_descriptor(STORE_TYPE)
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self, operation: &'static str) -> Result<&Arc<dyn ObjectBackend>> {
        self.backend
            .as_ref()
            .ok_or_else(|| Error::not_initialized(operation))
    }

    /// Per-call `is-public` wins over the session attribute
    fn is_public(&self, attributes: &Attributes) -> bool {
        attributes
            .is_public()
            .or_else(|| self.options.attributes().is_public())
            .unwrap_or(false)
    }

    fn encrypt(&self, operation: &'static str, data: Bytes) -> Result<Bytes> {
        match self.options.crypto_service() {
            Some(crypto) => crypto
                .encrypt(&data)
                .map(Bytes::from)
                .map_err(|source| Error::Encrypt {
                    operation,
                    store: self.to_string(),
                    source,
                }),
            None => Ok(data),
        }
    }

    fn decrypt(&self, operation: &'static str, model: DataModel) -> Result<DataModel> {
        let crypto = match self.options.crypto_service() {
            Some(crypto) if !model.data().is_empty() => crypto,
            _ => return Ok(model),
        };

        match crypto.decrypt(model.data()) {
            Ok(plaintext) => Ok(DataModel::new(
                model.bucket_name(),
                model.object_name(),
                plaintext,
            )),
            Err(source) => Err(Error::Decrypt {
                operation,
                store: self.to_string(),
                source,
                model: Box::new(model),
            }),
        }
    }
}

fn object_error(
    operation: &'static str,
    bucket: &str,
    object: &str,
    source: BackendError,
) -> Error {
    if source.is_not_found() {
        Error::not_found(bucket, object)
    } else {
        Error::backend(operation, source)
    }
}

#[async_trait]
impl DataStore for S3DataStore {
    async fn init(&mut self, ctx: &CallContext, options: Vec<StoreOption>) -> Result<()> {
        if self.backend.is_some() {
            return Err(Error::invalid_config(format!(
                "{} is already initialized",
                self
            )));
        }
        ctx.check("init")?;

        let mut session = self.options.clone();
        compose(&mut session, options)?;

        let backend = self.connector.connect(&self.config).await?;
        self.options = session;
        self.backend = Some(backend);
        info!("Initialized data store {}", self);
        Ok(())
    }

    async fn get(&self, ctx: &CallContext, options: GetOptions) -> Result<DataModel> {
        options.validate()?;
        let backend = self.backend("get")?;
        ctx.check("get")?;

        let GetOptions {
            bucket_name,
            object_name,
        } = options;
        debug!("Getting object {}/{}", bucket_name, object_name);
        let data = backend
            .get_object(&bucket_name, &object_name)
            .await
            .map_err(|e| object_error("get_object", &bucket_name, &object_name, e))?;

        self.decrypt("get", DataModel::new(bucket_name, object_name, data))
    }

    async fn set(&self, ctx: &CallContext, options: SetOptions) -> Result<()> {
        options.validate()?;
        let backend = self.backend("set")?;
        ctx.check("set")?;

        let public = self.is_public(&options.attributes);
        let SetOptions {
            bucket_name,
            object_name,
            content_type,
            data,
            ..
        } = options;

        let payload = self.encrypt("set", data)?;
        BucketProvisioner::new(backend.as_ref())
            .ensure(&bucket_name, public)
            .await?;

        ctx.check("set")?;
        debug!(
            "Putting object {}/{} ({} bytes)",
            bucket_name,
            object_name,
            payload.len()
        );
        backend
            .put_object(&bucket_name, &object_name, payload, content_type.as_deref())
            .await
            .map_err(|e| Error::backend("put_object", e))
    }

    async fn copy(&self, ctx: &CallContext, options: CopyOptions) -> Result<()> {
        options.validate()?;
        let backend = self.backend("copy")?;
        ctx.check("copy")?;

        BucketProvisioner::new(backend.as_ref())
            .ensure(&options.dst_bucket_name, self.is_public(&options.attributes))
            .await?;

        ctx.check("copy")?;
        debug!(
            "Copying {}/{} to {}/{}",
            options.src_bucket_name,
            options.src_object_name,
            options.dst_bucket_name,
            options.dst_object_name
        );
        backend
            .copy_object(
                &options.src_bucket_name,
                &options.src_object_name,
                &options.dst_bucket_name,
                &options.dst_object_name,
            )
            .await
            .map_err(|e| {
                object_error(
                    "copy_object",
                    &options.src_bucket_name,
                    &options.src_object_name,
                    e,
                )
            })
    }

    async fn list(&self, ctx: &CallContext, options: ListOptions) -> Result<Listing> {
        let mut objects = self.objects(ctx, options)?;
        let mut listing = Listing::default();

        while let Some(item) = objects.next().await {
            match item {
                Ok(object) => listing.push(object.to_model()),
                Err(source) => {
                    return Err(Error::PartialListing {
                        partial: Box::new(listing),
                        source: Box::new(source),
                    })
                }
            }
        }

        debug!("Listed {} objects", listing.total);
        Ok(listing)
    }

    fn objects(&self, ctx: &CallContext, options: ListOptions) -> Result<ObjectStream<'static>> {
        options.validate()?;
        let backend = self.backend("list")?;
        ctx.check("list")?;
        Ok(walk_objects(
            Arc::clone(backend),
            ctx.clone(),
            "list",
            options,
        ))
    }

    async fn delete(&self, ctx: &CallContext, options: DeleteOptions) -> Result<()> {
        options.validate()?;
        let backend = self.backend("delete")?;
        ctx.check("delete")?;

        debug!(
            "Removing object {}/{}",
            options.bucket_name, options.object_name
        );
        backend
            .remove_object(&options.bucket_name, &options.object_name, None)
            .await
            .map_err(|e| Error::backend("remove_object", e))
    }

    async fn total(&self, ctx: &CallContext) -> i64 {
        match self.backend("total") {
            Ok(backend) => Aggregator::new(Arc::clone(backend)).total(ctx).await,
            Err(e) => {
                warn!("{}", e);
                0
            }
        }
    }

    async fn info(&self, ctx: &CallContext) -> Result<StoreInfo> {
        let backend = self.backend("info")?;
        Aggregator::new(Arc::clone(backend))
            .info(ctx, StoreInfo::empty(STORE_TYPE, self.connection_info()))
            .await
    }

    async fn reset(&self, ctx: &CallContext) -> Result<()> {
        let backend = self.backend("reset")?;
        info!("Resetting data store {}", self);
        BulkEraser::new(Arc::clone(backend)).reset(ctx).await
    }

    async fn close(&mut self, _ctx: &CallContext) -> Result<()> {
        if self.backend.take().is_some() {
            info!("Closed data store {}", self);
        }
        Ok(())
    }

    fn options(&self) -> &StoreOptions {
        &self.options
    }
}

impl fmt::Display for S3DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.config.descriptor(STORE_TYPE))
    }
}

impl fmt::Debug for S3DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3DataStore")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("connector", &self.connector)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
