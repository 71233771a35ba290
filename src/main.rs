//! CLI entry point for paperfetch.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use paperfetch_core::config::FetchConfig;
use paperfetch_core::report::write_reports;
use paperfetch_core::{DownloadEngine, ProviderRegistry, load_ris};
use tracing::{debug, error, info, warn};

mod cli;
mod progress;

use cli::Args;

/// Every DOI was saved.
const EXIT_SUCCESS: u8 = 0;
/// At least one DOI failed.
const EXIT_PARTIAL: u8 = 1;
/// Usage, config, or setup error.
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    if args.list_providers {
        for name in ProviderRegistry::with_builtins().names() {
            println!("{name}");
        }
        return ExitCode::from(EXIT_SUCCESS);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    init_tracing(&args, &config);
    debug!(?args, "CLI arguments parsed");

    match run(&args, config).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!(error = %format!("{err:#}"), "run aborted");
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn load_config(args: &Args) -> Result<FetchConfig> {
    let mut config = match &args.config {
        Some(path) => FetchConfig::load(path)?,
        None => FetchConfig::load_default()?,
    };
    args.apply_overrides(&mut config);
    config.validate().context("invalid command-line override")?;
    Ok(config)
}

// Priority: RUST_LOG env var > quiet flag > verbose flag > config file > info
fn init_tracing(args: &Args, config: &FetchConfig) {
    let default_level = args.default_log_level(config.log_level.as_deref());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(args: &Args, config: FetchConfig) -> Result<u8> {
    let ris_file = args
        .ris_file
        .as_deref()
        .context("no RIS file given")?;

    let parsed = load_ris(ris_file)
        .with_context(|| format!("cannot read bibliography {}", ris_file.display()))?;
    if parsed.entries.is_empty() {
        warn!(path = %ris_file.display(), "no DOIs found in bibliography");
    }

    let total = parsed.entries.len();
    let show_progress = progress::should_show_progress(io::stderr().is_terminal(), args.quiet);
    let bar = progress::batch_progress(total, show_progress);
    let engine = DownloadEngine::from_config(&config)
        .context("failed to set up download engine")?
        .with_progress(progress::progress_hook(bar.clone()));

    info!(
        total,
        providers = ?engine.provider_names(),
        output_dir = %config.output_dir.display(),
        "paperfetch starting"
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let outcome = engine
        .run_batch_interruptible(parsed.entries, Arc::clone(&interrupted))
        .await?;
    bar.finish_and_clear();

    if let Err(err) = write_reports(
        &config.output_dir,
        &config.report,
        &outcome.results,
        &outcome.summary,
    ) {
        warn!(error = %err, "failed to write reports");
    }

    let summary = &outcome.summary;
    info!(
        succeeded = summary.success_count,
        failed = summary.failed_count,
        total = summary.total,
        success_rate = summary.success_rate(),
        "Download complete"
    );
    if summary.interrupted {
        warn!("Interrupted. Identifiers not started are reported as failed.");
    }

    Ok(if summary.failed_count == 0 {
        EXIT_SUCCESS
    } else {
        EXIT_PARTIAL
    })
}
