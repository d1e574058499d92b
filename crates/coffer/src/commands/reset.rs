//! Erase everything in the store

use anyhow::{Context, Result};
use coffer_core::{CallContext, DataStore};
use dialoguer::Confirm;

use super::{close, Session};
use crate::cli::ResetArgs;
use crate::output;

pub async fn run(args: ResetArgs, session: &Session, ctx: &CallContext) -> Result<()> {
    let store = session.open(ctx).await?;
    output::header("Reset Store");
    output::kv("Store", &store.to_string());
    output::warning("Every object version and every bucket will be permanently deleted");

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Erase everything?")
            .default(false)
            .interact()
            .context("Confirmation prompt failed; pass --yes to skip it")?;
        if !confirmed {
            close(store, ctx).await;
            output::info("Reset cancelled");
            return Ok(());
        }
    }

    let spinner = output::spinner("Erasing...");
    let result = store.reset(ctx).await;
    spinner.finish_and_clear();
    close(store, ctx).await;

    if let Err(e) = result {
        for failure in e.failures().iter().skip(1) {
            output::warning(&failure.to_string());
        }
        return Err(e).context("Reset incomplete; run it again to retry what is left");
    }

    output::success("Store erased");
    Ok(())
}
