//! # coffer-s3
//!
//! S3-compatible [`DataStore`](coffer_core::DataStore) for Coffer.
//!
//! ```text
//! S3DataStore ──> Connector ──> ObjectBackend ─┬─> S3Backend (aws-sdk-s3)
//!     │                                        └─> MemoryBackend (test-util)
//!     ├─ BucketProvisioner   (set, copy)
//!     ├─ walk_objects        (list, objects)
//!     ├─ Aggregator          (total, info)
//!     └─ BulkEraser          (reset)
//! ```

pub mod aggregate;
pub mod backend;
pub mod connector;
pub mod erase;
pub mod listing;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod provisioner;
pub mod s3;
pub mod store;

pub use aggregate::Aggregator;
pub use backend::{
    BackendResult, BucketInfo, ObjectBackend, ObjectPage, ObjectVersion, VersionMarker,
    VersionPage,
};
pub use connector::{Connector, S3Connector};
pub use erase::BulkEraser;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{Fault, MemoryBackend, MemoryConnector, Operation};
pub use provisioner::{public_read_policy, BucketProvisioner, Provisioned};
pub use s3::S3Backend;
pub use store::{S3DataStore, STORE_TYPE};
