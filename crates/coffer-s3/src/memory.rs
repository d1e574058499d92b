//! In-process object backend
//!
//! Keeps buckets and object versions in memory with S3-like semantics:
//! buckets created with object locking keep every version, deletes without a
//! version id leave a delete marker, and listings are paged. Faults can be
//! injected per operation and bucket to exercise partial-failure paths.
//!
//! Only built for tests and with the `test-util` feature.

use crate::backend::{
    BackendResult, BucketInfo, ObjectBackend, ObjectPage, ObjectVersion, VersionMarker,
    VersionPage,
};
use crate::connector::Connector;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use coffer_core::{
    BackendError, BackendErrorKind, CallContext, ConnectionConfig, ObjectSummary, Result,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Default number of entries per listing page, matching S3
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Backend operation a fault can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    BucketExists,
    MakeBucket,
    SetBucketPolicy,
    RemoveBucket,
    ListBuckets,
    PutObject,
    GetObject,
    CopyObject,
    RemoveObject,
    ListObjects,
    ListObjectVersions,
}

/// An injected failure; `bucket: None` matches every bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub operation: Operation,
    pub bucket: Option<String>,
    /// Only fail once this many matching calls have succeeded
    pub after: usize,
    /// Kind of the returned error, `Injected` unless overridden
    pub kind: BackendErrorKind,
}

impl Fault {
    pub fn on(operation: Operation) -> Self {
        Self {
            operation,
            bucket: None,
            after: 0,
            kind: BackendErrorKind::Injected,
        }
    }

    /// Fail with a specific error kind, e.g. a `Conflict` from `make_bucket`
    pub fn with_kind(mut self, kind: BackendErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn in_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn after(mut self, successful_calls: usize) -> Self {
        self.after = successful_calls;
        self
    }
}

#[derive(Debug, Clone)]
struct StoredVersion {
    version_id: String,
    /// `None` marks a delete marker
    data: Option<Bytes>,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryBucket {
    object_locking: bool,
    policy: Option<String>,
    created: Option<DateTime<Utc>>,
    /// Versions per key, oldest first
    objects: BTreeMap<String, Vec<StoredVersion>>,
}

impl MemoryBucket {
    fn latest(&self, key: &str) -> Option<&StoredVersion> {
        self.objects.get(key).and_then(|versions| versions.last())
    }

    fn live_data(&self, key: &str) -> Option<&Bytes> {
        self.latest(key).and_then(|version| version.data.as_ref())
    }
}

/// Cancels a call context once an operation has run a number of times
#[derive(Debug)]
struct CancelTrip {
    operation: Operation,
    remaining: usize,
    ctx: CallContext,
}

#[derive(Debug, Default)]
struct MemoryState {
    buckets: BTreeMap<String, MemoryBucket>,
    faults: Vec<(Fault, usize)>,
    trips: Vec<CancelTrip>,
    next_version: u64,
}

impl MemoryState {
    fn check_fault(&mut self, operation: Operation, bucket: Option<&str>) -> BackendResult<()> {
        for trip in self.trips.iter_mut().filter(|t| t.operation == operation) {
            if trip.remaining > 0 {
                trip.remaining -= 1;
                if trip.remaining == 0 {
                    trip.ctx.cancel();
                }
            }
        }

        for (fault, seen) in self.faults.iter_mut() {
            let bucket_matches = match (&fault.bucket, bucket) {
                (None, _) => true,
                (Some(expected), Some(actual)) => expected == actual,
                (Some(_), None) => false,
            };
            if fault.operation != operation || !bucket_matches {
                continue;
            }
            if *seen < fault.after {
                *seen += 1;
                continue;
            }
            return Err(BackendError::new(
                fault.kind,
                format!(
                    "injected {:?} failure{}",
                    operation,
                    bucket.map(|b| format!(" in bucket {}", b)).unwrap_or_default()
                ),
            ));
        }
        Ok(())
    }

    fn bucket(&self, name: &str) -> BackendResult<&MemoryBucket> {
        self.buckets
            .get(name)
            .ok_or_else(|| BackendError::not_found(format!("bucket {} does not exist", name)))
    }

    fn bucket_mut(&mut self, name: &str) -> BackendResult<&mut MemoryBucket> {
        self.buckets
            .get_mut(name)
            .ok_or_else(|| BackendError::not_found(format!("bucket {} does not exist", name)))
    }

    fn next_version_id(&mut self) -> String {
        self.next_version += 1;
        format!("v{:08}", self.next_version)
    }

    fn write(
        &mut self,
        bucket: &str,
        key: &str,
        data: Option<Bytes>,
        content_type: Option<String>,
    ) -> BackendResult<()> {
        let version_id = self.next_version_id();
        let target = self.bucket_mut(bucket)?;
        let version = StoredVersion {
            version_id,
            data,
            content_type,
            last_modified: Utc::now(),
        };
        let versions = target.objects.entry(key.to_string()).or_default();
        if target.object_locking {
            versions.push(version);
        } else {
            versions.clear();
            if version.data.is_some() {
                versions.push(version);
            }
        }
        if versions.is_empty() {
            target.objects.remove(key);
        }
        Ok(())
    }
}

/// In-memory [`ObjectBackend`]
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    page_size: usize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Backend whose listings return at most `page_size` entries per page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            page_size: page_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave the maps half-updated
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make matching calls fail until the fault is cleared
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push((fault, 0));
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Cancel `ctx` during the `calls`-th call of `operation`.
    ///
    /// The call itself still completes; the caller sees the cancellation at
    /// its next context check.
    pub fn cancel_after(&self, operation: Operation, calls: usize, ctx: CallContext) {
        if calls == 0 {
            ctx.cancel();
            return;
        }
        self.lock().trips.push(CancelTrip {
            operation,
            remaining: calls,
            ctx,
        });
    }

    /// Policy document attached to a bucket
    pub fn bucket_policy(&self, bucket: &str) -> Option<String> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.policy.clone())
    }

    /// Whether a bucket was created with object locking
    pub fn object_locking(&self, bucket: &str) -> Option<bool> {
        self.lock().buckets.get(bucket).map(|b| b.object_locking)
    }

    /// Stored bytes of the current version, exactly as written
    pub fn raw_object(&self, bucket: &str, object: &str) -> Option<Bytes> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.live_data(object).cloned())
    }

    /// Content type recorded for the current version
    pub fn content_type(&self, bucket: &str, object: &str) -> Option<String> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.latest(object))
            .and_then(|version| version.content_type.clone())
    }

    /// Number of stored versions and delete markers of an object
    pub fn version_count(&self, bucket: &str, object: &str) -> usize {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(object))
            .map_or(0, Vec::len)
    }

    pub fn bucket_names(&self) -> Vec<String> {
        self.lock().buckets.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool> {
        let mut state = self.lock();
        state.check_fault(Operation::BucketExists, Some(bucket))?;
        Ok(state.buckets.contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str, object_locking: bool) -> BackendResult<()> {
        let mut state = self.lock();
        state.check_fault(Operation::MakeBucket, Some(bucket))?;
        if state.buckets.contains_key(bucket) {
            return Err(BackendError::new(
                BackendErrorKind::AlreadyOwned,
                format!("bucket {} already owned by you", bucket),
            ));
        }
        state.buckets.insert(
            bucket.to_string(),
            MemoryBucket {
                object_locking,
                created: Some(Utc::now()),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> BackendResult<()> {
        let mut state = self.lock();
        state.check_fault(Operation::SetBucketPolicy, Some(bucket))?;
        serde_json::from_str::<serde_json::Value>(policy).map_err(|e| {
            BackendError::with_source(
                BackendErrorKind::Service,
                format!("malformed policy for bucket {}", bucket),
                e,
            )
        })?;
        state.bucket_mut(bucket)?.policy = Some(policy.to_string());
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> BackendResult<()> {
        let mut state = self.lock();
        state.check_fault(Operation::RemoveBucket, Some(bucket))?;
        if !state.bucket(bucket)?.objects.is_empty() {
            return Err(BackendError::new(
                BackendErrorKind::Conflict,
                format!("bucket {} is not empty", bucket),
            ));
        }
        state.buckets.remove(bucket);
        Ok(())
    }

    async fn list_buckets(&self) -> BackendResult<Vec<BucketInfo>> {
        let mut state = self.lock();
        state.check_fault(Operation::ListBuckets, None)?;
        Ok(state
            .buckets
            .iter()
            .map(|(name, bucket)| BucketInfo {
                name: name.clone(),
                created: bucket.created,
            })
            .collect())
    }

    async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> BackendResult<()> {
        let mut state = self.lock();
        state.check_fault(Operation::PutObject, Some(bucket))?;
        state.write(bucket, object, Some(data), content_type.map(str::to_owned))
    }

    async fn get_object(&self, bucket: &str, object: &str) -> BackendResult<Bytes> {
        let mut state = self.lock();
        state.check_fault(Operation::GetObject, Some(bucket))?;
        state
            .bucket(bucket)?
            .live_data(object)
            .cloned()
            .ok_or_else(|| BackendError::not_found(format!("no such key {}/{}", bucket, object)))
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_object: &str,
        dst_bucket: &str,
        dst_object: &str,
    ) -> BackendResult<()> {
        let mut state = self.lock();
        state.check_fault(Operation::CopyObject, Some(dst_bucket))?;
        let source = state.bucket(src_bucket)?;
        let data = source.live_data(src_object).cloned().ok_or_else(|| {
            BackendError::not_found(format!("no such key {}/{}", src_bucket, src_object))
        })?;
        let content_type = source
            .latest(src_object)
            .and_then(|version| version.content_type.clone());
        state.write(dst_bucket, dst_object, Some(data), content_type)
    }

    async fn remove_object(
        &self,
        bucket: &str,
        object: &str,
        version_id: Option<&str>,
    ) -> BackendResult<()> {
        let mut state = self.lock();
        state.check_fault(Operation::RemoveObject, Some(bucket))?;
        if !state.buckets.contains_key(bucket) {
            return Ok(());
        }

        match version_id {
            Some(version_id) => {
                let target = state.bucket_mut(bucket)?;
                if let Some(versions) = target.objects.get_mut(object) {
                    versions.retain(|version| version.version_id != version_id);
                    if versions.is_empty() {
                        target.objects.remove(object);
                    }
                }
                Ok(())
            }
            None => {
                let exists = state.bucket(bucket)?.live_data(object).is_some();
                if exists {
                    state.write(bucket, object, None, None)
                } else {
                    Ok(())
                }
            }
        }
    }

    async fn list_objects_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<String>,
    ) -> BackendResult<ObjectPage> {
        let mut state = self.lock();
        state.check_fault(Operation::ListObjects, Some(bucket))?;
        let source = state.bucket(bucket)?;

        let mut live = source
            .objects
            .iter()
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
            .filter(|(key, _)| {
                continuation_token
                    .as_deref()
                    .map_or(true, |token| key.as_str() > token)
            })
            .filter_map(|(key, versions)| {
                let latest = versions.last()?;
                let data = latest.data.as_ref()?;
                Some(ObjectSummary {
                    bucket_name: bucket.to_string(),
                    object_name: key.clone(),
                    size: data.len() as i64,
                    last_modified: Some(latest.last_modified),
                })
            });

        let objects: Vec<ObjectSummary> = live.by_ref().take(self.page_size).collect();
        let next_token = if live.next().is_some() {
            objects.last().map(|last| last.object_name.clone())
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_token,
        })
    }

    async fn list_object_versions_page(
        &self,
        bucket: &str,
        marker: Option<VersionMarker>,
    ) -> BackendResult<VersionPage> {
        let mut state = self.lock();
        state.check_fault(Operation::ListObjectVersions, Some(bucket))?;
        let source = state.bucket(bucket)?;

        // Versions ordered by key, then version id
        let after = marker.and_then(|m| m.key_marker.zip(m.version_id_marker));
        let mut entries = source
            .objects
            .iter()
            .flat_map(|(key, versions)| {
                versions.iter().map(move |version| (key.clone(), version))
            })
            .filter(|(key, version)| match &after {
                Some((marker_key, marker_version)) => {
                    (key.as_str(), version.version_id.as_str())
                        > (marker_key.as_str(), marker_version.as_str())
                }
                None => true,
            })
            .map(|(key, version)| ObjectVersion {
                object_name: key,
                version_id: Some(version.version_id.clone()),
                is_delete_marker: version.data.is_none(),
            });

        let versions: Vec<ObjectVersion> = entries.by_ref().take(self.page_size).collect();
        let next = if entries.next().is_some() {
            versions.last().map(|last| VersionMarker {
                key_marker: Some(last.object_name.clone()),
                version_id_marker: last.version_id.clone(),
            })
        } else {
            None
        };

        Ok(VersionPage { versions, next })
    }
}

/// Hands out a shared in-memory backend; the configuration is ignored
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    backend: Arc<MemoryBackend>,
}

impl MemoryConnector {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }

    /// The backend every connection shares
    pub fn backend(&self) -> &Arc<MemoryBackend> {
        &self.backend
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn ObjectBackend>> {
        Ok(self.backend.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let backend = MemoryBackend::new();
        backend.make_bucket("bucket", false).await.unwrap();
        backend
            .put_object("bucket", "key", Bytes::from_static(b"value"), Some("text/plain"))
            .await
            .unwrap();

        let data = backend.get_object("bucket", "key").await.unwrap();
        assert_eq!(data.as_ref(), b"value");
        assert_eq!(
            backend.content_type("bucket", "key").as_deref(),
            Some("text/plain")
        );
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let backend = MemoryBackend::new();
        backend.make_bucket("bucket", false).await.unwrap();

        let err = backend.get_object("bucket", "missing").await.unwrap_err();
        assert!(err.is_not_found());
        let err = backend.get_object("nobucket", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_locked_bucket_keeps_versions_and_delete_markers() {
        let backend = MemoryBackend::new();
        backend.make_bucket("locked", true).await.unwrap();
        backend
            .put_object("locked", "k", Bytes::from_static(b"1"), None)
            .await
            .unwrap();
        backend
            .put_object("locked", "k", Bytes::from_static(b"2"), None)
            .await
            .unwrap();
        backend.remove_object("locked", "k", None).await.unwrap();

        assert_eq!(backend.version_count("locked", "k"), 3);
        assert!(backend.get_object("locked", "k").await.is_err());

        let page = backend.list_objects_page("locked", None, None).await.unwrap();
        assert!(page.objects.is_empty());

        let versions = backend
            .list_object_versions_page("locked", None)
            .await
            .unwrap();
        assert_eq!(versions.versions.len(), 3);
        assert_eq!(
            versions
                .versions
                .iter()
                .filter(|v| v.is_delete_marker)
                .count(),
            1
        );

        // Non-empty until every version is gone
        assert!(backend.remove_bucket("locked").await.is_err());
        for version in versions.versions {
            backend
                .remove_object("locked", &version.object_name, version.version_id.as_deref())
                .await
                .unwrap();
        }
        backend.remove_bucket("locked").await.unwrap();
        assert!(!backend.bucket_exists("locked").await.unwrap());
    }

    #[tokio::test]
    async fn test_listing_pages() {
        let backend = MemoryBackend::with_page_size(2);
        backend.make_bucket("b", false).await.unwrap();
        for key in ["a", "b", "c", "d", "e"] {
            backend
                .put_object("b", key, Bytes::from_static(b"x"), None)
                .await
                .unwrap();
        }

        let mut names = Vec::new();
        let mut token = None;
        let mut pages = 0;
        loop {
            let page = backend.list_objects_page("b", None, token).await.unwrap();
            pages += 1;
            names.extend(page.objects.into_iter().map(|o| o.object_name));
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(pages, 3);
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_prefix_filter() {
        let backend = MemoryBackend::new();
        backend.make_bucket("b", false).await.unwrap();
        for key in ["logs/1", "logs/2", "data/1"] {
            backend
                .put_object("b", key, Bytes::from_static(b"x"), None)
                .await
                .unwrap();
        }

        let page = backend
            .list_objects_page("b", Some("logs/"), None)
            .await
            .unwrap();
        assert_eq!(page.objects.len(), 2);
    }

    #[tokio::test]
    async fn test_fault_injection_by_bucket_and_delay() {
        let backend = MemoryBackend::new();
        backend.make_bucket("good", false).await.unwrap();
        backend.make_bucket("bad", false).await.unwrap();
        backend.inject(Fault::on(Operation::ListObjects).in_bucket("bad"));
        backend.inject(Fault::on(Operation::PutObject).after(1));

        assert!(backend.list_objects_page("good", None, None).await.is_ok());
        let err = backend
            .list_objects_page("bad", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), BackendErrorKind::Injected);

        assert!(backend
            .put_object("good", "1", Bytes::new(), None)
            .await
            .is_ok());
        assert!(backend
            .put_object("good", "2", Bytes::new(), None)
            .await
            .is_err());

        backend.clear_faults();
        assert!(backend.list_objects_page("bad", None, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_make_existing_bucket_is_already_owned() {
        let backend = MemoryBackend::new();
        backend.make_bucket("b", true).await.unwrap();
        let err = backend.make_bucket("b", true).await.unwrap_err();
        assert_eq!(err.kind(), BackendErrorKind::AlreadyOwned);
        assert_eq!(backend.object_locking("b"), Some(true));
    }

    #[tokio::test]
    async fn test_fault_kind_override() {
        let backend = MemoryBackend::new();
        backend.inject(Fault::on(Operation::MakeBucket).with_kind(BackendErrorKind::Conflict));

        let err = backend.make_bucket("taken", true).await.unwrap_err();
        assert_eq!(err.kind(), BackendErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_cancel_after_counts_calls() {
        let backend = MemoryBackend::new();
        backend.make_bucket("b", false).await.unwrap();
        let ctx = CallContext::new();
        backend.cancel_after(Operation::PutObject, 2, ctx.clone());

        backend
            .put_object("b", "1", Bytes::new(), None)
            .await
            .unwrap();
        assert!(!ctx.is_cancelled());
        backend
            .put_object("b", "2", Bytes::new(), None)
            .await
            .unwrap();
        assert!(ctx.is_cancelled());
    }
}
