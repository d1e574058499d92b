//! Store-wide read commands: list, total, info

use anyhow::{Context, Result};
use coffer_core::{CallContext, DataStore, ListOptions};
use futures::StreamExt;

use super::{close, Session};
use crate::cli::{InfoArgs, ListArgs};
use crate::output;

pub async fn list(args: ListArgs, session: &Session, ctx: &CallContext) -> Result<()> {
    let mut options = ListOptions::new();
    if let Some(bucket) = args.bucket {
        options = options.bucket_name(bucket);
    }
    if let Some(prefix) = args.prefix {
        options = options.prefix(prefix);
    }

    let store = session.open(ctx).await?;
    let mut objects = store.objects(ctx, options)?;
    let mut count = 0;
    let mut failures = 0;

    // Stream the listing so large stores print as they are walked
    while let Some(item) = objects.next().await {
        match item {
            Ok(object) => {
                count += 1;
                println!(
                    "{}/{}\t{}",
                    object.bucket_name,
                    object.object_name,
                    output::format_bytes(object.size)
                );
            }
            Err(e) if e.is_cancelled() => {
                close(store, ctx).await;
                return Err(e).context("Listing cancelled");
            }
            Err(e) => {
                failures += 1;
                output::warning(&format!("{}", e));
            }
        }
    }
    close(store, ctx).await;

    if failures > 0 {
        anyhow::bail!(
            "Listed {} objects, but {} bucket(s) could not be listed",
            count,
            failures
        );
    }
    output::info(&format!("{} objects", count));
    Ok(())
}

pub async fn total(session: &Session, ctx: &CallContext) -> Result<()> {
    let store = session.open(ctx).await?;
    let total = store.total(ctx).await;
    close(store, ctx).await;

    println!("{}", total);
    Ok(())
}

pub async fn info(args: InfoArgs, session: &Session, ctx: &CallContext) -> Result<()> {
    let store = session.open(ctx).await?;
    let spinner = output::spinner("Collecting statistics...");
    let result = store.info(ctx).await;
    spinner.finish_and_clear();
    close(store, ctx).await;

    if let Some(partial) = result.as_ref().err().and_then(|e| e.partial_info()) {
        output::warning(&format!(
            "Partial statistics: {} bucket(s), {} object(s), {}",
            partial.num_buckets,
            partial.num_objects,
            output::format_bytes(partial.total_size_in_bytes)
        ));
    }
    let info = result.context("Failed to collect store statistics")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    output::header("Store Info");
    output::kv("Type", &info.store_type);
    output::kv("Connection", &info.connection_info);
    output::kv("Buckets", &info.num_buckets.to_string());
    output::kv("Objects", &info.num_objects.to_string());
    output::kv("Total size", &output::format_bytes(info.total_size_in_bytes));
    output::kv("Last update", &output::format_timestamp(info.last_update_time));
    Ok(())
}
