//! The data store contract consumed by application code

use crate::context::CallContext;
use crate::error::Result;
use crate::options::{
    CopyOptions, DeleteOptions, GetOptions, ListOptions, SetOptions, StoreOption, StoreOptions,
};
use crate::types::{DataModel, Listing, ObjectSummary, StoreInfo};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

/// Lazy, finite, non-restartable enumeration of objects.
///
/// A failing bucket yields one `Err` item and the stream continues with the
/// next bucket. Dropping the stream part-way has no effect on the backend.
pub type ObjectStream<'a> = BoxStream<'a, Result<ObjectSummary>>;

/// Uniform contract over an object-storage backend.
///
/// `Display` renders a descriptor that never contains credentials.
#[async_trait]
pub trait DataStore: Send + Sync + fmt::Display {
    /// Apply session options, then connect. Must be called once before any
    /// data operation.
    async fn init(&mut self, ctx: &CallContext, options: Vec<StoreOption>) -> Result<()>;

    /// Fetch one object, decrypting it when a crypto service is configured
    async fn get(&self, ctx: &CallContext, options: GetOptions) -> Result<DataModel>;

    /// Store one object, provisioning its bucket and encrypting as configured
    async fn set(&self, ctx: &CallContext, options: SetOptions) -> Result<()>;

    /// Server-side copy; stored bytes are preserved exactly
    async fn copy(&self, ctx: &CallContext, options: CopyOptions) -> Result<()>;

    /// Materialise every object (names only). Fails fast on the first
    /// enumeration error with the partial listing attached.
    async fn list(&self, ctx: &CallContext, options: ListOptions) -> Result<Listing>;

    /// Lazily enumerate objects
    fn objects(&self, ctx: &CallContext, options: ListOptions) -> Result<ObjectStream<'static>>;

    /// Remove one object; removing an absent object succeeds
    async fn delete(&self, ctx: &CallContext, options: DeleteOptions) -> Result<()>;

    /// Best-effort object count. Buckets that fail to list are skipped, so
    /// the result is a lower bound when the backend misbehaves.
    async fn total(&self, ctx: &CallContext) -> i64;

    /// Recompute aggregate statistics with a full traversal
    async fn info(&self, ctx: &CallContext) -> Result<StoreInfo>;

    /// Erase every object version and bucket, best effort
    async fn reset(&self, ctx: &CallContext) -> Result<()>;

    /// Release the backend connection. Safe to call repeatedly.
    async fn close(&mut self, ctx: &CallContext) -> Result<()>;

    /// Session options in effect
    fn options(&self) -> &StoreOptions;
}
