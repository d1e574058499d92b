//! Object backend seam
//!
//! [`ObjectBackend`] is the narrow set of primitive calls the data store makes
//! against a backend. Every method is a single round trip; listing is paged so
//! callers can stream arbitrarily large buckets.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use coffer_core::{BackendError, ObjectSummary};
use std::fmt;

/// Result type for backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A bucket as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
}

impl BucketInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created: None,
        }
    }
}

/// One page of current objects
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectSummary>,
    /// Token for the next page; `None` when this was the last page
    pub next_token: Option<String>,
}

/// One stored version or delete marker of an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub object_name: String,
    /// `None` for backends without versioning
    pub version_id: Option<String>,
    pub is_delete_marker: bool,
}

/// Resume position inside a version listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMarker {
    pub key_marker: Option<String>,
    pub version_id_marker: Option<String>,
}

/// One page of object versions and delete markers
#[derive(Debug, Clone, Default)]
pub struct VersionPage {
    pub versions: Vec<ObjectVersion>,
    /// Marker for the next page; `None` when this was the last page
    pub next: Option<VersionMarker>,
}

/// Primitive operations against an S3-compatible backend.
///
/// Implementations must be safe for concurrent use; the data store shares one
/// handle between all callers without additional locking.
#[async_trait]
pub trait ObjectBackend: Send + Sync + fmt::Debug {
    /// Whether a bucket exists and is reachable
    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool>;

    /// Create a bucket, optionally with object locking enabled
    async fn make_bucket(&self, bucket: &str, object_locking: bool) -> BackendResult<()>;

    /// Attach a bucket policy document
    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> BackendResult<()>;

    /// Remove an empty bucket
    async fn remove_bucket(&self, bucket: &str) -> BackendResult<()>;

    async fn list_buckets(&self) -> BackendResult<Vec<BucketInfo>>;

    async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> BackendResult<()>;

    /// Fetch an object; a missing object is a `NotFound` error
    async fn get_object(&self, bucket: &str, object: &str) -> BackendResult<Bytes>;

    /// Server-side copy
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_object: &str,
        dst_bucket: &str,
        dst_object: &str,
    ) -> BackendResult<()>;

    /// Remove an object, or one specific version of it.
    ///
    /// Removing an absent object succeeds.
    async fn remove_object(
        &self,
        bucket: &str,
        object: &str,
        version_id: Option<&str>,
    ) -> BackendResult<()>;

    /// One page of current objects, recursively, optionally under a prefix
    async fn list_objects_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<String>,
    ) -> BackendResult<ObjectPage>;

    /// One page of every version and delete marker in a bucket
    async fn list_object_versions_page(
        &self,
        bucket: &str,
        marker: Option<VersionMarker>,
    ) -> BackendResult<VersionPage>;
}
