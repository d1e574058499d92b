//! Bulk erasure
//!
//! Removes every object version, every delete marker and then every bucket.
//! Failures do not stop the run: they are collected and reported together
//! once every bucket has been visited. Only cancellation ends the run early.

use crate::backend::{ObjectBackend, VersionMarker};
use crate::listing::bucket_names;
use coffer_core::{CallContext, Error, Result};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, info, warn};

const OPERATION: &str = "reset";

/// Erases all buckets reachable through a backend
#[derive(Debug, Clone)]
pub struct BulkEraser {
    backend: Arc<dyn ObjectBackend>,
}

impl BulkEraser {
    pub fn new(backend: Arc<dyn ObjectBackend>) -> Self {
        Self { backend }
    }

    /// Erase everything, best effort.
    ///
    /// Returns [`Error::ResetIncomplete`] listing every failure when any step
    /// failed. Running it again retries whatever is left.
    pub async fn reset(&self, ctx: &CallContext) -> Result<()> {
        let buckets = bucket_names(self.backend.as_ref(), ctx, OPERATION, None)
            .await
            .map_err(|e| Error::ResetIncomplete { failures: vec![e] })?;

        let mut failures = Vec::new();
        let mut erased = 0;
        for bucket in &buckets {
            let before = failures.len();
            if self.erase_bucket(ctx, bucket, &mut failures).await.is_break() {
                break;
            }
            if failures.len() == before {
                erased += 1;
            }
        }

        if failures.is_empty() {
            info!("Erased {} buckets", erased);
            Ok(())
        } else {
            warn!(
                "Reset erased {} of {} buckets with {} failure(s)",
                erased,
                buckets.len(),
                failures.len()
            );
            Err(Error::ResetIncomplete { failures })
        }
    }

    async fn erase_bucket(
        &self,
        ctx: &CallContext,
        bucket: &str,
        failures: &mut Vec<Error>,
    ) -> ControlFlow<()> {
        let mut bucket_failed = false;
        let mut marker: Option<VersionMarker> = None;

        loop {
            if let Err(e) = ctx.check(OPERATION) {
                failures.push(e);
                return ControlFlow::Break(());
            }

            let page = match self
                .backend
                .list_object_versions_page(bucket, marker.take())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!("Failed to list object versions in bucket {}: {}", bucket, e);
                    failures.push(Error::backend("list_object_versions", e));
                    bucket_failed = true;
                    break;
                }
            };

            for version in &page.versions {
                if let Err(e) = ctx.check(OPERATION) {
                    failures.push(e);
                    return ControlFlow::Break(());
                }
                debug!(
                    "Removing {}/{} (version: {:?}, delete marker: {})",
                    bucket, version.object_name, version.version_id, version.is_delete_marker
                );
                if let Err(e) = self
                    .backend
                    .remove_object(bucket, &version.object_name, version.version_id.as_deref())
                    .await
                {
                    warn!("Failed to remove {}/{}: {}", bucket, version.object_name, e);
                    failures.push(Error::backend("remove_object", e));
                    bucket_failed = true;
                }
            }

            match page.next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        // A bucket that still holds versions cannot be removed
        if bucket_failed {
            return ControlFlow::Continue(());
        }

        match self.backend.remove_bucket(bucket).await {
            Ok(()) => info!("Removed bucket {}", bucket),
            Err(e) => {
                warn!("Failed to remove bucket {}: {}", bucket, e);
                failures.push(Error::backend("remove_bucket", e));
            }
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Fault, MemoryBackend, Operation};
    use bytes::Bytes;

    async fn seeded() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::with_page_size(2));
        for bucket in ["alpha", "beta", "gamma"] {
            backend.make_bucket(bucket, true).await.unwrap();
            for key in ["k1", "k2", "k3"] {
                backend
                    .put_object(bucket, key, Bytes::from_static(b"v1"), None)
                    .await
                    .unwrap();
                backend
                    .put_object(bucket, key, Bytes::from_static(b"v2"), None)
                    .await
                    .unwrap();
            }
            backend.remove_object(bucket, "k1", None).await.unwrap();
        }
        backend
    }

    #[tokio::test]
    async fn test_reset_removes_versions_markers_and_buckets() {
        let backend = seeded().await;
        assert_eq!(backend.version_count("alpha", "k1"), 3);

        BulkEraser::new(backend.clone())
            .reset(&CallContext::new())
            .await
            .unwrap();

        assert!(backend.bucket_names().is_empty());
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let backend = Arc::new(MemoryBackend::new());
        let eraser = BulkEraser::new(backend);

        eraser.reset(&CallContext::new()).await.unwrap();
        eraser.reset(&CallContext::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_partial_failure_still_erases_other_buckets() {
        let backend = seeded().await;
        backend.inject(Fault::on(Operation::RemoveObject).in_bucket("beta"));

        let err = BulkEraser::new(backend.clone())
            .reset(&CallContext::new())
            .await
            .unwrap_err();

        // Every version in beta failed; the bucket itself was left alone
        assert_eq!(err.failures().len(), 7);
        assert!(err.to_string().starts_with("Reset finished with 7 failure(s)"));
        assert_eq!(backend.bucket_names(), vec!["beta".to_string()]);

        backend.clear_faults();
        BulkEraser::new(backend.clone())
            .reset(&CallContext::new())
            .await
            .unwrap();
        assert!(backend.bucket_names().is_empty());
    }

    #[tokio::test]
    async fn test_remove_bucket_failure_is_reported() {
        let backend = seeded().await;
        backend.inject(Fault::on(Operation::RemoveBucket).in_bucket("gamma"));

        let err = BulkEraser::new(backend.clone())
            .reset(&CallContext::new())
            .await
            .unwrap_err();

        assert_eq!(err.failures().len(), 1);
        assert!(matches!(
            err.failures()[0],
            Error::Backend {
                operation: "remove_bucket",
                ..
            }
        ));
        assert_eq!(backend.bucket_names(), vec!["gamma".to_string()]);
    }

    #[tokio::test]
    async fn test_bucket_listing_failure() {
        let backend = seeded().await;
        backend.inject(Fault::on(Operation::ListBuckets));

        let err = BulkEraser::new(backend.clone())
            .reset(&CallContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.failures().len(), 1);
        assert_eq!(backend.bucket_names().len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_reset_reports_cancellation() {
        let backend = seeded().await;
        let ctx = CallContext::new();
        ctx.cancel();

        let err = BulkEraser::new(backend.clone())
            .reset(&ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ResetIncomplete { .. }));
        assert!(err.failures()[0].is_cancelled());
        assert_eq!(backend.bucket_names().len(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_between_pages_stops_the_run() {
        let backend = seeded().await;
        let ctx = CallContext::new();
        // Page size is two: cancel while removing the last version of the first page
        backend.cancel_after(Operation::RemoveObject, 2, ctx.clone());

        let err = BulkEraser::new(backend.clone())
            .reset(&ctx)
            .await
            .unwrap_err();

        assert_eq!(err.failures().len(), 1);
        assert!(err.failures()[0].is_cancelled());

        // Only the first page of alpha was erased; the bucket and the rest remain
        assert_eq!(backend.version_count("alpha", "k1"), 1);
        assert_eq!(backend.version_count("alpha", "k2"), 2);
        assert_eq!(backend.version_count("beta", "k1"), 3);
        assert_eq!(backend.bucket_names().len(), 3);

        BulkEraser::new(backend.clone())
            .reset(&CallContext::new())
            .await
            .unwrap();
        assert!(backend.bucket_names().is_empty());
    }
}
