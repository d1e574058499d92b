//! Coffer CLI - S3-compatible object storage with transparent encryption
//!
//! This is the main entry point for the coffer command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use coffer_core::CallContext;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    // Ctrl-C cancels the running operation between backend round trips
    let ctx = CallContext::new();
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_ctx.cancel();
        }
    });

    let session = commands::Session::new(cli.config, cli.connection);
    match cli.command {
        Commands::Get(args) => commands::object::get(args, &session, &ctx).await,
        Commands::Set(args) => commands::object::set(args, &session, &ctx).await,
        Commands::Copy(args) => commands::object::copy(args, &session, &ctx).await,
        Commands::Delete(args) => commands::object::delete(args, &session, &ctx).await,
        Commands::List(args) => commands::stats::list(args, &session, &ctx).await,
        Commands::Total => commands::stats::total(&session, &ctx).await,
        Commands::Info(args) => commands::stats::info(args, &session, &ctx).await,
        Commands::Reset(args) => commands::reset::run(args, &session, &ctx).await,
        Commands::Keygen(args) => commands::keygen::run(args),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
