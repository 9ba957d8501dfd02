//! CLI entry point for the catalog sync tool.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use atcsync_core::app;
use atcsync_core::config::{
    FetchSettings, RegistrySettings, ResolverSettings, RetrySettings, StoreSettings, SyncConfig,
};
use clap::Parser;
use tracing::debug;

mod cli;

use cli::{Args, Command};

/// Environment variable holding the store API token.
const TOKEN_ENV: &str = "ATCSYNC_STORE_TOKEN";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let config = build_config(&args)?;

    match args.command {
        Command::Reconcile { dry_run } => app::run_reconcile(&config, dry_run).await,
        Command::Enrich {
            limit,
            max_pages,
            report,
        } => {
            let mut config = config;
            config.resolver.max_document_pages = max_pages;
            app::run_enrich(&config, limit, report.as_deref()).await
        }
    }
}

fn build_config(args: &Args) -> Result<SyncConfig> {
    let Some(endpoint) = args.endpoint.clone() else {
        bail!("no store endpoint configured; pass --endpoint or set ATCSYNC_STORE_ENDPOINT");
    };
    let token = std::env::var(TOKEN_ENV)
        .with_context(|| format!("missing store API token; set {TOKEN_ENV}"))?;

    let mut store = StoreSettings::new(endpoint, token);
    store.batch_size = args.batch_size;

    let fetch = FetchSettings {
        pacing: Duration::from_millis(args.pacing_ms),
        ..FetchSettings::default()
    };
    let retry = RetrySettings {
        max_attempts: args.max_retries,
        ..RetrySettings::default()
    };

    Ok(SyncConfig {
        registry: RegistrySettings::default(),
        store,
        fetch,
        resolver: ResolverSettings::default(),
        retry,
    })
}
