//! Process entry point and lifecycle supervisor.
//!
//! Init failures abort before the loop starts (exit 1). Once running, an
//! INT/TERM signal cancels the sampler, which drains the buffer into the
//! sink; a hard 30-second deadline bounds the whole shutdown.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use uuid::Uuid;

use mnemosyne_watcher::buffer::{BufferConfig, EventBuffer};
use mnemosyne_watcher::cli::Cli;
use mnemosyne_watcher::db::Database;
use mnemosyne_watcher::sampler::{Sampler, SamplerConfig, SamplerController};
use mnemosyne_watcher::sink::{EventSink, RedisStreamSink};
use mnemosyne_watcher::VERSION;

/// Namespace prefix for the remote event stream.
const STREAM_NAMESPACE: &str = "mnemosyne";

/// Hard upper bound on graceful shutdown.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    info!("Mnemosyne Core Watcher v{VERSION} starting...");

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("Failed to start: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let sink = open_sink(&cli).await?;

    let (buffer, flush_rx) = EventBuffer::new(BufferConfig {
        high_water_mark: cli.buffer,
        flush_timeout: cli.flush,
    });

    let session_id = Uuid::new_v4().to_string();
    let config = SamplerConfig {
        tick_interval: cli.tick,
        idle_threshold: cli.idle,
        ..SamplerConfig::default()
    };

    let sampler = Sampler::new(config, session_id, buffer, sink);
    let mut controller = SamplerController::start(sampler, flush_rx);

    info!("Watcher started. Press Ctrl+C to stop gracefully.");

    let finished_early = tokio::select! {
        result = controller.handle_mut() => Some(result),
        _ = shutdown_signal() => None,
    };

    if let Some(result) = finished_early {
        // The sampler task ended without a signal (panic or drain error).
        return Ok(match result {
            Ok(Ok(())) => {
                info!("Sampler stopped normally");
                ExitCode::SUCCESS
            }
            Ok(Err(err)) => {
                error!("Sampler stopped with error: {err:#}");
                ExitCode::FAILURE
            }
            Err(join_err) => {
                error!("Sampler task aborted: {join_err}");
                ExitCode::FAILURE
            }
        });
    }

    info!("Shutdown signal received, initiating graceful shutdown...");
    controller.request_stop();

    match tokio::time::timeout(SHUTDOWN_DEADLINE, controller.join()).await {
        Ok(Ok(())) => {
            info!("Shutdown completed successfully");
            Ok(ExitCode::SUCCESS)
        }
        Ok(Err(err)) => {
            error!("Shutdown completed with error: {err:#}");
            Ok(ExitCode::FAILURE)
        }
        Err(_) => {
            error!(
                "Shutdown deadline of {}s exceeded, forcing exit",
                SHUTDOWN_DEADLINE.as_secs()
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Selects and opens the persistence sink. Static per invocation: a
/// configured Redis address wins, otherwise the embedded database.
async fn open_sink(cli: &Cli) -> Result<EventSink> {
    match cli.redis.as_deref() {
        Some(addr) if !addr.is_empty() => {
            let stream = RedisStreamSink::connect(addr, STREAM_NAMESPACE)
                .await
                .with_context(|| format!("failed to connect to redis at {addr}"))?;
            info!("Redis connected: {addr} (stream {})", stream.stream_name());
            Ok(EventSink::RedisStream(stream))
        }
        _ => {
            let db = Database::new(cli.db.clone()).context("failed to initialize database")?;
            Ok(EventSink::Sqlite(db))
        }
    }
}

/// Resolves when the process receives Ctrl+C, or SIGTERM on Unix hosts.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(err) => {
                error!("SIGTERM handler failed: {err}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Ctrl+C handler failed: {err}");
        }
    }
}
