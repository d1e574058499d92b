//! Data model shared by every data store

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named object and (optionally) its payload.
///
/// Identity is the `(bucket_name, object_name)` pair. The payload is
/// reference-counted and never mutated once a model is handed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataModel {
    bucket_name: String,
    object_name: String,
    data: Bytes,
}

impl DataModel {
    /// Create a model carrying a payload
    pub fn new(
        bucket_name: impl Into<String>,
        object_name: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            object_name: object_name.into(),
            data: data.into(),
        }
    }

    /// Create a names-only model (used by listings)
    pub fn named(bucket_name: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self::new(bucket_name, object_name, Bytes::new())
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consume the model and return its payload
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

/// One object seen while enumerating a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub bucket_name: String,
    pub object_name: String,
    /// Stored size in bytes (ciphertext size when encryption is enabled)
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectSummary {
    /// Names-only model for this object
    pub fn to_model(&self) -> DataModel {
        DataModel::named(&self.bucket_name, &self.object_name)
    }
}

/// Materialised result of a full listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Names-only models, payloads are not fetched
    pub items: Vec<DataModel>,
    /// Number of items successfully enumerated
    pub total: i64,
}

impl Listing {
    pub fn new(items: Vec<DataModel>) -> Self {
        let total = items.len() as i64;
        Self { items, total }
    }

    pub fn push(&mut self, item: DataModel) {
        self.items.push(item);
        self.total += 1;
    }
}

/// Aggregate statistics about a data store, recomputed on every request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Backend family, e.g. "s3"
    pub store_type: String,
    /// Masked connection descriptor; never contains the secret
    pub connection_info: String,
    /// Most recent object modification in unix nanoseconds (0 when empty)
    pub last_update_time: i64,
    pub num_buckets: i64,
    pub num_objects: i64,
    pub total_size_in_bytes: i64,
}

impl StoreInfo {
    /// Zeroed statistics for the given store
    pub fn empty(store_type: impl Into<String>, connection_info: impl Into<String>) -> Self {
        Self {
            store_type: store_type.into(),
            connection_info: connection_info.into(),
            ..Default::default()
        }
    }

    /// Fold one enumerated object into the running totals
    pub fn record_object(&mut self, object: &ObjectSummary) {
        self.num_objects += 1;
        self.total_size_in_bytes += object.size.max(0);
        if let Some(nanos) = object
            .last_modified
            .and_then(|modified| modified.timestamp_nanos_opt())
        {
            self.last_update_time = self.last_update_time.max(nanos);
        }
    }
}
