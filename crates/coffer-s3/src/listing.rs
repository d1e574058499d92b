//! Lazy object enumeration
//!
//! Objects are fetched one page at a time and only when the consumer polls
//! for more. A bucket whose listing fails yields a single `Err` item and the
//! walk moves on to the next bucket. A cancelled context yields one `Err` and
//! ends the walk.

use crate::backend::ObjectBackend;
use coffer_core::{CallContext, Error, ListOptions, ObjectStream, ObjectSummary, Result};
use futures::future;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Names of the buckets to visit, optionally restricted to one bucket.
///
/// A filter naming an absent bucket yields no buckets rather than an error.
pub async fn bucket_names(
    backend: &dyn ObjectBackend,
    ctx: &CallContext,
    operation: &'static str,
    only: Option<&str>,
) -> Result<Vec<String>> {
    ctx.check(operation)?;
    let buckets = backend
        .list_buckets()
        .await
        .map_err(|e| Error::backend("list_buckets", e))?;

    Ok(buckets
        .into_iter()
        .map(|bucket| bucket.name)
        .filter(|name| only.map_or(true, |wanted| wanted == name))
        .collect())
}

struct Pager {
    backend: Arc<dyn ObjectBackend>,
    ctx: CallContext,
    operation: &'static str,
    bucket: String,
    prefix: Option<String>,
    token: Option<String>,
    buffer: VecDeque<ObjectSummary>,
    exhausted: bool,
    done: bool,
}

impl Pager {
    fn stop(mut self, err: Error) -> Option<(Result<ObjectSummary>, Self)> {
        self.done = true;
        Some((Err(err), self))
    }
}

async fn next_object(mut pager: Pager) -> Option<(Result<ObjectSummary>, Pager)> {
    loop {
        if pager.done {
            return None;
        }
        if let Err(e) = pager.ctx.check(pager.operation) {
            return pager.stop(e);
        }
        if let Some(object) = pager.buffer.pop_front() {
            return Some((Ok(object), pager));
        }
        if pager.exhausted {
            return None;
        }

        let token = pager.token.take();
        debug!("Listing objects in bucket {} (token: {:?})", pager.bucket, token);
        match pager
            .backend
            .list_objects_page(&pager.bucket, pager.prefix.as_deref(), token)
            .await
        {
            Ok(page) => {
                pager.exhausted = page.next_token.is_none();
                pager.token = page.next_token;
                pager.buffer.extend(page.objects);
            }
            Err(e) => return pager.stop(Error::backend("list_objects", e)),
        }
    }
}

/// Lazily enumerate the objects of one bucket.
///
/// The stream ends after the first error.
pub fn objects_in(
    backend: Arc<dyn ObjectBackend>,
    ctx: CallContext,
    operation: &'static str,
    bucket: String,
    prefix: Option<String>,
) -> ObjectStream<'static> {
    let pager = Pager {
        backend,
        ctx,
        operation,
        bucket,
        prefix,
        token: None,
        buffer: VecDeque::new(),
        exhausted: false,
        done: false,
    };
    stream::unfold(pager, next_object).boxed()
}

/// Lazily enumerate every object matching `options`, bucket by bucket
pub fn walk_objects(
    backend: Arc<dyn ObjectBackend>,
    ctx: CallContext,
    operation: &'static str,
    options: ListOptions,
) -> ObjectStream<'static> {
    let ListOptions {
        bucket_name,
        prefix,
    } = options;

    let names = {
        let backend = Arc::clone(&backend);
        let ctx = ctx.clone();
        async move { bucket_names(backend.as_ref(), &ctx, operation, bucket_name.as_deref()).await }
    };

    stream::once(names)
        .flat_map(move |result| match result {
            Ok(names) => {
                let backend = Arc::clone(&backend);
                let ctx = ctx.clone();
                let prefix = prefix.clone();
                stream::iter(names)
                    .flat_map(move |bucket| {
                        objects_in(
                            Arc::clone(&backend),
                            ctx.clone(),
                            operation,
                            bucket,
                            prefix.clone(),
                        )
                    })
                    .boxed()
            }
            Err(e) => stream::once(future::ready(Err(e))).boxed(),
        })
        // Cancellation ends the whole walk, not just the current bucket
        .scan(false, |cancelled, item| {
            if *cancelled {
                return future::ready(None);
            }
            if let Err(e) = &item {
                *cancelled = e.is_cancelled();
            }
            future::ready(Some(item))
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Fault, MemoryBackend, Operation};
    use bytes::Bytes;

    async fn seeded(page_size: usize) -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::with_page_size(page_size));
        for bucket in ["alpha", "beta", "gamma"] {
            backend.make_bucket(bucket, false).await.unwrap();
            for key in ["k1", "k2", "k3"] {
                backend
                    .put_object(bucket, key, Bytes::from_static(b"v"), None)
                    .await
                    .unwrap();
            }
        }
        backend
    }

    #[tokio::test]
    async fn test_walk_visits_every_object_across_pages() {
        let backend = seeded(2).await;
        let items: Vec<_> = walk_objects(backend, CallContext::new(), "list", ListOptions::new())
            .collect()
            .await;

        assert_eq!(items.len(), 9);
        assert!(items.iter().all(|item| item.is_ok()));
    }

    #[tokio::test]
    async fn test_walk_filters_bucket_and_prefix() {
        let backend = seeded(2).await;
        backend
            .put_object("beta", "logs/1", Bytes::from_static(b"v"), None)
            .await
            .unwrap();

        let options = ListOptions::new().bucket_name("beta").prefix("logs/");
        let items: Vec<_> = walk_objects(backend.clone(), CallContext::new(), "list", options)
            .collect()
            .await;
        assert_eq!(items.len(), 1);

        let absent = ListOptions::new().bucket_name("missing");
        let items: Vec<_> = walk_objects(backend, CallContext::new(), "list", absent)
            .collect()
            .await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_failing_bucket_yields_error_then_continues() {
        let backend = seeded(2).await;
        backend.inject(Fault::on(Operation::ListObjects).in_bucket("beta"));

        let items: Vec<_> = walk_objects(backend, CallContext::new(), "list", ListOptions::new())
            .collect()
            .await;

        assert_eq!(items.len(), 7);
        assert_eq!(items.iter().filter(|item| item.is_err()).count(), 1);
        assert!(items[3].is_err());
    }

    #[tokio::test]
    async fn test_bucket_listing_failure_is_single_error() {
        let backend = seeded(2).await;
        backend.inject(Fault::on(Operation::ListBuckets));

        let items: Vec<_> = walk_objects(backend, CallContext::new(), "list", ListOptions::new())
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn test_cancellation_ends_walk() {
        let backend = seeded(2).await;
        let ctx = CallContext::new();
        let mut walk = walk_objects(backend, ctx.clone(), "list", ListOptions::new());

        assert!(walk.next().await.unwrap().is_ok());
        ctx.cancel();
        let err = walk.next().await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(walk.next().await.is_none());
    }
}
