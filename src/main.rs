//! CLI entry point for the puzzle solver.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use puzzle_core::config::{LogFormat, resolve_default_config_path};
use puzzle_core::{PuzzleRuntime, RequestContext, SolverConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod output;

use cli::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let config_path = args.config.clone().or_else(resolve_default_config_path);
    let mut config = SolverConfig::load(config_path.as_deref()).with_context(|| {
        match &config_path {
            Some(path) => format!("Failed to load config from '{}'", path.display()),
            None => "Failed to load config".to_string(),
        }
    })?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration after CLI overrides")?;

    init_tracing(&args, &config);
    debug!(?args, "CLI arguments parsed");
    info!(source = %config.source.full_url(), "Puzzle solver starting");

    let runtime = PuzzleRuntime::from_config(&config).context("Failed to build solver")?;
    run(&runtime, &args, &RequestContext::new()).await
}

/// Runs the selected command, then releases the session whatever the outcome.
async fn run(runtime: &PuzzleRuntime, args: &Args, ctx: &RequestContext) -> Result<ExitCode> {
    let outcome = if args.check {
        Ok(run_check(runtime, ctx).await)
    } else {
        run_solve(runtime, args, ctx).await
    };

    runtime.shutdown().await;
    outcome
}

fn apply_overrides(config: &mut SolverConfig, args: &Args) {
    if let Some(base_url) = &args.base_url {
        config.source.base_url.clone_from(base_url);
    }
    if let Some(concurrency) = args.concurrency {
        config.fetch.max_concurrency = usize::from(concurrency);
    }
    if let Some(max_attempts) = args.max_attempts {
        config.fetch.max_attempts = max_attempts;
    }
    if let Some(batch_size) = args.batch_size {
        config.discovery.initial_batch_size = batch_size;
    }
    if let Some(chunk_threshold) = args.chunk_threshold {
        config.assembly.chunk_threshold = chunk_threshold;
    }
}

// Priority: RUST_LOG env var > quiet flag > verbose flag > config level
fn init_tracing(args: &Args, config: &SolverConfig) {
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run_check(runtime: &PuzzleRuntime, ctx: &RequestContext) -> ExitCode {
    if runtime.repository().check_connectivity(ctx).await {
        println!("Fragment server reachable");
        ExitCode::SUCCESS
    } else {
        println!("Fragment server unreachable");
        ExitCode::FAILURE
    }
}

async fn run_solve(runtime: &PuzzleRuntime, args: &Args, ctx: &RequestContext) -> Result<ExitCode> {
    let spinner = (!args.quiet && !args.json && io::stderr().is_terminal()).then(|| {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Discovering fragments...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    });

    let result = runtime.solver().solve(args.chunk_threshold, ctx).await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if args.json {
        println!(
            "{}",
            output::render_json(&result).context("Failed to serialize result")?
        );
    } else {
        print!("{}", output::render_result(&result));
    }

    Ok(if result.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
