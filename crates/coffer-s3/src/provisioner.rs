//! Bucket provisioning
//!
//! Every write and copy path makes sure its destination bucket exists first.
//! New buckets are created with object locking enabled and, when requested,
//! get a public-read policy attached right after creation. Existing buckets
//! are never touched.

use crate::backend::ObjectBackend;
use coffer_core::{BackendErrorKind, Error, Result};
use serde_json::json;
use tracing::{debug, info};

/// Outcome of [`BucketProvisioner::ensure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// The bucket was already there
    Existing,
    /// The bucket was created
    Created,
    /// The bucket was created and made publicly readable
    CreatedPublic,
}

/// Public-read policy document for a bucket
pub fn public_read_policy(bucket: &str) -> String {
    json!({
        "Statement": [{
            "Action": ["s3:GetObject"],
            "Effect": "Allow",
            "Principal": {"AWS": ["*"]},
            "Resource": [format!("arn:aws:s3:::{}/*", bucket)],
        }],
        "Version": "2012-10-17",
    })
    .to_string()
}

/// Ensures destination buckets exist before objects are written into them
#[derive(Debug, Clone, Copy)]
pub struct BucketProvisioner<'a> {
    backend: &'a dyn ObjectBackend,
}

impl<'a> BucketProvisioner<'a> {
    pub fn new(backend: &'a dyn ObjectBackend) -> Self {
        Self { backend }
    }

    /// Create `bucket` if it is absent.
    ///
    /// `public` only applies to a bucket created by this call. Losing a
    /// creation race to ourselves counts as "exists"; a name held by another
    /// account is a provisioning error.
    pub async fn ensure(&self, bucket: &str, public: bool) -> Result<Provisioned> {
        let exists = self
            .backend
            .bucket_exists(bucket)
            .await
            .map_err(|e| Error::provisioning(bucket, e))?;
        if exists {
            debug!("Bucket {} already exists", bucket);
            return Ok(Provisioned::Existing);
        }

        info!("Creating bucket: {}", bucket);
        match self.backend.make_bucket(bucket, true).await {
            Ok(()) => {}
            Err(e) if e.kind() == BackendErrorKind::AlreadyOwned => {
                debug!("Bucket {} was created concurrently: {}", bucket, e);
                return Ok(Provisioned::Existing);
            }
            Err(e) => return Err(Error::provisioning(bucket, e)),
        }

        if !public {
            info!("Created bucket {} with object locking enabled", bucket);
            return Ok(Provisioned::Created);
        }

        self.backend
            .set_bucket_policy(bucket, &public_read_policy(bucket))
            .await
            .map_err(|e| Error::provisioning(bucket, e))?;
        info!("Created public-read bucket {} with object locking enabled", bucket);
        Ok(Provisioned::CreatedPublic)
    }
}
