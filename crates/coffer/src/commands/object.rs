//! Single-object commands: get, set, copy, delete

use anyhow::{Context, Result};
use coffer_core::{CallContext, CopyOptions, DataStore, DeleteOptions, GetOptions, SetOptions};
use std::io::Write;

use super::{close, Session};
use crate::cli::{CopyArgs, DeleteArgs, GetArgs, SetArgs};
use crate::output;

pub async fn get(args: GetArgs, session: &Session, ctx: &CallContext) -> Result<()> {
    let store = session.open(ctx).await?;
    let result = store
        .get(ctx, GetOptions::new(&args.bucket, &args.object))
        .await
        .with_context(|| format!("Failed to get {}/{}", args.bucket, args.object));
    close(store, ctx).await;
    let model = result?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, model.data())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output::success(&format!(
                "Wrote {} bytes to {}",
                model.data().len(),
                path.display()
            ));
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(model.data())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

pub async fn set(args: SetArgs, session: &Session, ctx: &CallContext) -> Result<()> {
    let data = match (args.value, &args.from_file) {
        (Some(value), _) => value.into_bytes(),
        (None, Some(path)) => std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("Either --value or --from-file is required"),
    };
    let size = data.len();

    let mut options = SetOptions::new(&args.bucket, &args.object)
        .data(data)
        .public(args.public);
    if let Some(content_type) = args.content_type {
        options = options.content_type(content_type);
    }

    let store = session.open(ctx).await?;
    let spinner = output::spinner("Uploading...");
    let result = store.set(ctx, options).await;
    spinner.finish_and_clear();
    close(store, ctx).await;
    result.with_context(|| format!("Failed to set {}/{}", args.bucket, args.object))?;

    output::success(&format!("Stored {}/{}", args.bucket, args.object));
    output::kv("Size", &output::format_bytes(size as i64));
    if args.public {
        output::kv("Public", "yes (applies to newly created buckets)");
    }
    Ok(())
}

pub async fn copy(args: CopyArgs, session: &Session, ctx: &CallContext) -> Result<()> {
    let options = CopyOptions::new(
        &args.src_bucket,
        &args.src_object,
        &args.dst_bucket,
        &args.dst_object,
    )
    .public(args.public);

    let store = session.open(ctx).await?;
    let result = store.copy(ctx, options).await;
    close(store, ctx).await;
    result.with_context(|| {
        format!(
            "Failed to copy {}/{} to {}/{}",
            args.src_bucket, args.src_object, args.dst_bucket, args.dst_object
        )
    })?;

    output::success(&format!(
        "Copied {}/{} to {}/{}",
        args.src_bucket, args.src_object, args.dst_bucket, args.dst_object
    ));
    Ok(())
}

pub async fn delete(args: DeleteArgs, session: &Session, ctx: &CallContext) -> Result<()> {
    let store = session.open(ctx).await?;
    let result = store
        .delete(ctx, DeleteOptions::new(&args.bucket, &args.object))
        .await;
    close(store, ctx).await;
    result.with_context(|| format!("Failed to delete {}/{}", args.bucket, args.object))?;

    output::success(&format!("Deleted {}/{}", args.bucket, args.object));
    Ok(())
}
