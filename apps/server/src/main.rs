//! Chaser Server - Standalone headless server for the Chaser sequencer.
//!
//! Loads the JSON runtime configuration, bootstraps the frame pipeline for
//! one environment, and runs until SIGINT/SIGTERM. Editing, HTTP, and the
//! browser simulator live in separate processes; this binary only drives
//! fixtures.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chaser_core::protocol_constants::DEBUG_ENV;
use chaser_core::{bootstrap_pipeline, load_runtime_config};
use clap::Parser;
use tokio::signal;

/// Chaser Server - Headless DMX lighting sequencer.
#[derive(Parser, Debug)]
#[command(name = "chaser-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding fixtures.json, environments.json, programs.json.
    #[arg(short = 'd', long, default_value = "data", env = "CHASER_DATA_DIR")]
    data_dir: PathBuf,

    /// Environment to render (defaults to the first configured one).
    #[arg(short, long, env = "CHASER_ENVIRONMENT")]
    environment: Option<String>,

    /// Program to load at startup.
    #[arg(short, long, env = "CHASER_PROGRAM")]
    program: Option<String>,

    /// Start playing the loaded program immediately.
    #[arg(long, requires = "program")]
    play: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "CHASER_LOG_LEVEL")]
    log_level: log::LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // CHASER_DEBUG=1 forces structured debug logs at all layers.
    let debug_forced = std::env::var(DEBUG_ENV).is_ok_and(|v| v == "1");
    env_logger::Builder::new()
        .filter_level(if debug_forced {
            log::LevelFilter::Debug
        } else {
            args.log_level
        })
        .format_timestamp_millis()
        .init();

    log::info!("Chaser Server v{}", env!("CARGO_PKG_VERSION"));

    let config = load_runtime_config(&args.data_dir)
        .with_context(|| format!("Failed to load configuration from {}", args.data_dir.display()))?;

    let pipeline = bootstrap_pipeline(Arc::new(config), args.environment.as_deref())
        .await
        .context("Failed to bootstrap pipeline")?;

    if let Some(program_id) = &args.program {
        let Some(program) = pipeline.programs.get(program_id) else {
            bail!("Program '{program_id}' not found in the program store");
        };
        pipeline.sequencer.set_spm(f64::from(program.spm));
        pipeline.sequencer.set_program(program, false, false);
        if args.play {
            pipeline.sequencer.play();
            log::info!("Playing program '{program_id}'");
        } else {
            log::info!("Loaded program '{program_id}' (paused)");
        }
    }

    log::info!(
        "Rendering environment '{}' — Ctrl+C to stop",
        pipeline.environment_id
    );

    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");
    pipeline.shutdown();
    // Give the QoS-0 offline publishes a moment to leave the socket.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
