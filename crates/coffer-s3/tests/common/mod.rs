//! Shared fixtures for coffer-s3 integration tests

#![allow(dead_code)]

use coffer_core::{
    CallContext, ChaChaCryptoService, ConnectionConfig, DataStore, SetOptions, StoreOption,
};
use coffer_s3::{MemoryBackend, MemoryConnector, S3DataStore};
use std::sync::Arc;

pub const ENDPOINT: &str = "127.0.0.1:9000";
pub const ACCESS_KEY: &str = "ROOTNAME";
pub const SECRET_KEY: &str = "CHANGEME123";

pub fn test_config() -> ConnectionConfig {
    ConnectionConfig::new(ENDPOINT, false, ACCESS_KEY, SECRET_KEY)
}

/// An initialised store over a fresh in-memory backend
pub async fn memory_store(
    page_size: usize,
    options: Vec<StoreOption>,
) -> (S3DataStore, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::with_page_size(page_size));
    let mut store = S3DataStore::with_connector(
        test_config(),
        MemoryConnector::new(backend.clone()),
        vec![],
    )
    .unwrap();
    store.init(&CallContext::new(), options).await.unwrap();
    (store, backend)
}

/// Same as [`memory_store`] with a ChaCha20-Poly1305 crypto service attached
pub async fn encrypted_store() -> (S3DataStore, Arc<MemoryBackend>) {
    memory_store(
        1000,
        vec![StoreOption::crypto_service(Arc::new(
            ChaChaCryptoService::generate(),
        ))],
    )
    .await
}

/// Write `value` to `bucket/object` as text
pub async fn put(store: &S3DataStore, bucket: &str, object: &str, value: &str) {
    store
        .set(
            &CallContext::new(),
            SetOptions::new(bucket, object)
                .content_type("text/plain")
                .data(value.as_bytes().to_vec()),
        )
        .await
        .unwrap();
}
