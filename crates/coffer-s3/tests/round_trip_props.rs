//! Property-based round trips through the data store
//!
//! Uses proptest to check that any byte payload comes back unchanged, with
//! and without encryption, and that copies leave their source intact.

mod common;

use coffer_core::{CallContext, CopyOptions, DataStore, GetOptions, SetOptions};
use common::*;
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Empty, small binary and large payloads
fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        Just(Vec::new()),
        prop::collection::vec(any::<u8>(), 1..64),
        prop::collection::vec(any::<u8>(), 64..4096),
        prop::collection::vec(any::<u8>(), 256 * 1024..=256 * 1024 + 17),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_plain_round_trip(data in payload()) {
        let got = runtime().block_on(async {
            let (store, backend) = memory_store(1000, vec![]).await;
            let ctx = CallContext::new();
            store
                .set(&ctx, SetOptions::new("bucket", "object").data(data.clone()))
                .await
                .unwrap();
            assert_eq!(
                backend.raw_object("bucket", "object").map(|b| b.to_vec()),
                Some(data.clone())
            );
            store.get(&ctx, GetOptions::new("bucket", "object")).await.unwrap()
        });

        prop_assert_eq!(got.data().as_ref(), data.as_slice());
    }

    #[test]
    fn prop_encrypted_round_trip(data in payload()) {
        let (got, stored) = runtime().block_on(async {
            let (store, backend) = encrypted_store().await;
            let ctx = CallContext::new();
            store
                .set(&ctx, SetOptions::new("bucket", "object").data(data.clone()))
                .await
                .unwrap();
            let got = store.get(&ctx, GetOptions::new("bucket", "object")).await.unwrap();
            (got, backend.raw_object("bucket", "object"))
        });

        prop_assert_eq!(got.data().as_ref(), data.as_slice());
        let stored = stored.unwrap();
        prop_assert!(stored.len() > data.len());
        if !data.is_empty() {
            prop_assert_ne!(stored.as_ref(), data.as_slice());
        }
    }

    #[test]
    fn prop_copy_keeps_source_and_destination_equal(
        data in payload(),
        encrypted in any::<bool>(),
    ) {
        let (source, copy) = runtime().block_on(async {
            let (store, _backend) = if encrypted {
                encrypted_store().await
            } else {
                memory_store(1000, vec![]).await
            };
            let ctx = CallContext::new();
            store
                .set(&ctx, SetOptions::new("src", "object").data(data.clone()))
                .await
                .unwrap();
            store
                .copy(&ctx, CopyOptions::new("src", "object", "dst", "object"))
                .await
                .unwrap();
            let source = store.get(&ctx, GetOptions::new("src", "object")).await.unwrap();
            let copy = store.get(&ctx, GetOptions::new("dst", "object")).await.unwrap();
            (source, copy)
        });

        prop_assert_eq!(source.data().as_ref(), data.as_slice());
        prop_assert_eq!(copy.data().as_ref(), data.as_slice());
    }
}
