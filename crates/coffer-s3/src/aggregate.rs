//! Store-wide aggregation
//!
//! Both aggregations walk every bucket and every current object. A bucket
//! whose objects cannot be listed is skipped with a warning, so results are a
//! lower bound when the backend misbehaves. `info` still fails when the
//! buckets themselves cannot be listed, handing back the zeroed counters with
//! the error.

use crate::backend::ObjectBackend;
use crate::listing::{bucket_names, objects_in};
use coffer_core::{CallContext, Error, ObjectSummary, Result, StoreInfo};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Folds the objects of every bucket into running totals
#[derive(Debug, Clone)]
pub struct Aggregator {
    backend: Arc<dyn ObjectBackend>,
}

impl Aggregator {
    pub fn new(backend: Arc<dyn ObjectBackend>) -> Self {
        Self { backend }
    }

    /// Visit every object of every bucket.
    ///
    /// `buckets` receives the number of buckets found before the walk starts.
    /// Per-bucket listing failures are logged and skipped; a cancelled context
    /// stops the walk with an error.
    async fn fold<F>(
        &self,
        ctx: &CallContext,
        operation: &'static str,
        buckets: &mut i64,
        mut visit: F,
    ) -> Result<()>
    where
        F: FnMut(&ObjectSummary) + Send,
    {
        let names = bucket_names(self.backend.as_ref(), ctx, operation, None).await?;
        *buckets = names.len() as i64;

        for bucket in names {
            ctx.check(operation)?;
            let mut objects = objects_in(
                Arc::clone(&self.backend),
                ctx.clone(),
                operation,
                bucket.clone(),
                None,
            );
            while let Some(item) = objects.next().await {
                match item {
                    Ok(object) => visit(&object),
                    Err(e) if e.is_cancelled() => return Err(e),
                    Err(e) => {
                        warn!("Skipping bucket {} while computing {}: {}", bucket, operation, e);
                    }
                }
            }
        }

        Ok(())
    }

    /// Best-effort object count; never fails
    pub async fn total(&self, ctx: &CallContext) -> i64 {
        let mut count = 0;
        let mut buckets = 0;
        let result = self.fold(ctx, "total", &mut buckets, |_| count += 1).await;
        match result {
            Ok(()) => debug!("Counted {} objects in {} buckets", count, buckets),
            Err(e) => warn!("Object count incomplete after {} objects: {}", count, e),
        }
        count
    }

    /// Fill `info` with bucket, object, size and last-modified statistics.
    ///
    /// On failure the error is [`Error::PartialInfo`] carrying whatever was
    /// counted so far.
    pub async fn info(&self, ctx: &CallContext, mut info: StoreInfo) -> Result<StoreInfo> {
        let mut buckets = 0;
        let result = self
            .fold(ctx, "info", &mut buckets, |object| info.record_object(object))
            .await;
        info.num_buckets = buckets;

        match result {
            Ok(()) => Ok(info),
            Err(source) => Err(Error::PartialInfo {
                partial: Box::new(info),
                source: Box::new(source),
            }),
        }
    }
}
