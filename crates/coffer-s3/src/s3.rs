//! S3 backend
//!
//! Implements [`ObjectBackend`] on top of `aws-sdk-s3`. Works with AWS S3 and
//! S3-compatible storage (MinIO, Wasabi, DigitalOcean Spaces) using static
//! credentials and path-style addressing.

use crate::backend::{
    BackendResult, BucketInfo, ObjectBackend, ObjectPage, ObjectVersion, VersionMarker,
    VersionPage,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime as S3DateTime};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use coffer_core::config::DEFAULT_REGION;
use coffer_core::{BackendError, BackendErrorKind, ConnectionConfig, ObjectSummary};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

/// Provider name reported for the static credentials
const CREDENTIALS_PROVIDER: &str = "coffer";

/// S3 backend for object storage operations
pub struct S3Backend {
    /// S3 client
    client: Client,
    /// Endpoint URL the client talks to
    endpoint_url: String,
    /// Region used for bucket location constraints
    region: String,
}

impl S3Backend {
    /// Create a client for the configured endpoint.
    ///
    /// No request is sent; connectivity problems surface on the first call.
    pub async fn connect(config: &ConnectionConfig) -> Self {
        let endpoint_url = config.endpoint_url();
        debug!("Using S3 endpoint: {}", endpoint_url);

        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.expose().to_string(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&endpoint_url)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true) // Required for MinIO and many S3-compatible services
            .build();

        Self {
            client: Client::from_conf(s3_config),
            endpoint_url,
            region: config.region.clone(),
        }
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client, endpoint_url: String, region: String) -> Self {
        Self {
            client,
            endpoint_url,
            region,
        }
    }
}

/// Characters kept verbatim in a copy source: RFC 3986 unreserved plus `/`
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// `x-amz-copy-source` value for an object; the key is percent-encoded so
/// `?`, `%` and non-ASCII names address the right object
fn copy_source(bucket: &str, object: &str) -> String {
    format!("{}/{}", bucket, utf8_percent_encode(object, COPY_SOURCE))
}

/// Error kind implied by an S3 error code or HTTP status, if any
fn classify(code: Option<&str>, status: Option<u16>) -> Option<BackendErrorKind> {
    let kind = match (code, status) {
        (Some("NoSuchKey" | "NoSuchBucket" | "NoSuchVersion" | "NotFound"), _) | (_, Some(404)) => {
            BackendErrorKind::NotFound
        }
        (Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"), _)
        | (_, Some(401 | 403)) => BackendErrorKind::AccessDenied,
        // Our own bucket; any other 409 (BucketAlreadyExists, BucketNotEmpty) is a conflict
        (Some("BucketAlreadyOwnedByYou"), _) => BackendErrorKind::AlreadyOwned,
        (Some("BucketNotEmpty" | "BucketAlreadyExists"), _) | (_, Some(409)) => {
            BackendErrorKind::Conflict
        }
        _ => return None,
    };
    Some(kind)
}

/// Classify an SDK failure by error code and HTTP status
fn map_sdk_error<E>(operation: &str, err: SdkError<E>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    let code = err
        .as_service_error()
        .and_then(|service_error| service_error.code())
        .map(str::to_owned);

    let kind = match classify(code.as_deref(), status) {
        Some(kind) => kind,
        None if matches!(
            err,
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_)
        ) =>
        {
            BackendErrorKind::Transport
        }
        None => BackendErrorKind::Service,
    };

    let message = format!("{}: {}", operation, DisplayErrorContext(&err));
    BackendError::with_source(kind, message, err)
}

fn to_chrono(timestamp: &S3DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                debug!("Bucket {} is accessible", bucket);
                Ok(true)
            }
            Err(e) => {
                let err = map_sdk_error("head_bucket", e);
                if err.is_not_found() {
                    debug!("Bucket {} does not exist", bucket);
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn make_bucket(&self, bucket: &str, object_locking: bool) -> BackendResult<()> {
        let mut request = self
            .client
            .create_bucket()
            .bucket(bucket)
            .object_lock_enabled_for_bucket(object_locking);

        // us-east-1 rejects an explicit location constraint
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| map_sdk_error("create_bucket", e))?;
        Ok(())
    }

    async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> BackendResult<()> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(|e| map_sdk_error("put_bucket_policy", e))?;
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> BackendResult<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| map_sdk_error("delete_bucket", e))?;
        Ok(())
    }

    async fn list_buckets(&self) -> BackendResult<Vec<BucketInfo>> {
        let mut buckets = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_buckets()
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(|e| map_sdk_error("list_buckets", e))?;

            buckets.extend(resp.buckets().iter().filter_map(|bucket| {
                bucket.name().map(|name| BucketInfo {
                    name: name.to_string(),
                    created: bucket.creation_date().and_then(to_chrono),
                })
            }));

            match resp.continuation_token() {
                Some(token) if !token.is_empty() => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!("Found {} buckets", buckets.len());
        Ok(buckets)
    }

    async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> BackendResult<()> {
        debug!(
            "Uploading object ({} bytes): s3://{}/{}",
            data.len(),
            bucket,
            object
        );

        self.client
            .put_object()
            .bucket(bucket)
            .key(object)
            .body(ByteStream::from(data))
            .set_content_type(content_type.map(str::to_owned))
            .send()
            .await
            .map_err(|e| map_sdk_error("put_object", e))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, object: &str) -> BackendResult<Bytes> {
        debug!("Downloading object: s3://{}/{}", bucket, object);

        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(object)
            .send()
            .await
            .map_err(|e| map_sdk_error("get_object", e))?;

        let body = resp.body.collect().await.map_err(|e| {
            BackendError::with_source(
                BackendErrorKind::Transport,
                format!("get_object: failed to read body of {}/{}", bucket, object),
                e,
            )
        })?;

        let data = body.into_bytes();
        debug!(
            "Downloaded {} bytes from s3://{}/{}",
            data.len(),
            bucket,
            object
        );
        Ok(data)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_object: &str,
        dst_bucket: &str,
        dst_object: &str,
    ) -> BackendResult<()> {
        debug!(
            "Copying s3://{}/{} to s3://{}/{}",
            src_bucket, src_object, dst_bucket, dst_object
        );

        self.client
            .copy_object()
            .copy_source(copy_source(src_bucket, src_object))
            .bucket(dst_bucket)
            .key(dst_object)
            .send()
            .await
            .map_err(|e| map_sdk_error("copy_object", e))?;
        Ok(())
    }

    async fn remove_object(
        &self,
        bucket: &str,
        object: &str,
        version_id: Option<&str>,
    ) -> BackendResult<()> {
        debug!(
            "Deleting object: s3://{}/{} (version: {})",
            bucket,
            object,
            version_id.unwrap_or("latest")
        );

        match self
            .client
            .delete_object()
            .bucket(bucket)
            .key(object)
            .set_version_id(version_id.map(str::to_owned))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = map_sdk_error("delete_object", e);
                if err.is_not_found() {
                    Ok(())
                } else {
                    Err(err)
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
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(prefix.map(str::to_owned))
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(|e| map_sdk_error("list_objects_v2", e))?;

        let objects = resp
            .contents()
            .iter()
            .filter_map(|object| {
                object.key().map(|key| ObjectSummary {
                    bucket_name: bucket.to_string(),
                    object_name: key.to_string(),
                    size: object.size().unwrap_or(0),
                    last_modified: object.last_modified().and_then(to_chrono),
                })
            })
            .collect();

        let next_token = if resp.is_truncated() == Some(true) {
            resp.next_continuation_token().map(str::to_owned)
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
        let marker = marker.unwrap_or_default();
        let resp = self
            .client
            .list_object_versions()
            .bucket(bucket)
            .set_key_marker(marker.key_marker)
            .set_version_id_marker(marker.version_id_marker)
            .send()
            .await
            .map_err(|e| map_sdk_error("list_object_versions", e))?;

        let mut versions: Vec<ObjectVersion> = resp
            .versions()
            .iter()
            .filter_map(|version| {
                version.key().map(|key| ObjectVersion {
                    object_name: key.to_string(),
                    version_id: version.version_id().map(str::to_owned),
                    is_delete_marker: false,
                })
            })
            .collect();

        versions.extend(resp.delete_markers().iter().filter_map(|marker| {
            marker.key().map(|key| ObjectVersion {
                object_name: key.to_string(),
                version_id: marker.version_id().map(str::to_owned),
                is_delete_marker: true,
            })
        }));

        let next = if resp.is_truncated() == Some(true) {
            Some(VersionMarker {
                key_marker: resp.next_key_marker().map(str::to_owned),
                version_id_marker: resp.next_version_id_marker().map(str::to_owned),
            })
        } else {
            None
        };

        Ok(VersionPage { versions, next })
    }
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}
