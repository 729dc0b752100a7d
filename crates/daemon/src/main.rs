// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Steward agent daemon (stewardd)
//!
//! Executes remotely authored documents against the local machine:
//! recovers persisted document state, polls for associations and
//! commands, and reports status back to the control plane.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use steward_core::SystemClock;
use steward_daemon::config::{AgentConfig, ConfigError};
use steward_daemon::lifecycle::{Daemon, LifecycleError};
use steward_daemon::source::{LoggingReplySink, NullMessageSource};
use steward_engine::OsShutdown;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};

const EXIT_USAGE: u8 = 2;
const EXIT_IDENTITY: u8 = 253;
const EXIT_FAILURE: u8 = 255;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path: Option<PathBuf> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("stewardd {}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            "--help" | "-h" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--config" => match iter.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("error: --config requires a path");
                    return ExitCode::from(EXIT_USAGE);
                }
            },
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: stewardd [--config PATH]");
                return ExitCode::from(EXIT_USAGE);
            }
        }
    }

    let config = match config_path {
        Some(path) => match AgentConfig::load(&path) {
            Ok(config) => config,
            Err(e @ ConfigError::Parse { .. }) => {
                eprintln!("error: {e}");
                return ExitCode::from(EXIT_USAGE);
            }
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(EXIT_FAILURE);
            }
        },
        None => AgentConfig::default(),
    };

    run_agent(config)
}

#[tokio::main]
async fn run_agent(config: AgentConfig) -> ExitCode {
    let log_path = config.data_store_root.join("logs").join("steward.log");
    rotate_log_if_needed(&log_path);
    let _log_guard = match setup_logging(&log_path) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: file logging unavailable: {e}");
            None
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "starting agent");

    let daemon = match Daemon::build(
        config,
        SystemClock,
        Arc::new(LoggingReplySink),
        Arc::new(NullMessageSource),
        Arc::new(OsShutdown),
    ) {
        Ok(daemon) => daemon,
        Err(LifecycleError::Identity(e)) => {
            error!(error = %e, "agent identity load failed");
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_IDENTITY);
        }
        Err(LifecycleError::LockFailed(path)) => {
            eprintln!("stewardd is already running (lock: {})", path.display());
            return ExitCode::from(EXIT_FAILURE);
        }
        Err(e) => {
            error!(error = %e, "failed to start agent");
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    if let Err(e) = daemon.start() {
        error!(error = %e, "startup recovery failed");
        eprintln!("error: {e}");
        return ExitCode::from(EXIT_FAILURE);
    }

    let shutdown = Arc::new(Notify::new());
    spawn_signal_handler(Arc::clone(&shutdown));

    daemon.run(shutdown).await;
    daemon.shutdown().await;

    ExitCode::SUCCESS
}

fn print_help() {
    println!("stewardd {}", env!("CARGO_PKG_VERSION"));
    println!("Steward agent daemon - executes remotely authored documents on this host");
    println!();
    println!("USAGE:");
    println!("    stewardd [--config PATH]");
    println!();
    println!("OPTIONS:");
    println!("    --config PATH    Path to the JSON agent configuration");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
}

/// Forward SIGTERM/SIGINT into the shutdown notify.
fn spawn_signal_handler(shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGINT handler");
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
        shutdown.notify_one();
    });
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the agent log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `steward.log` → `steward.log.1` → `.2` → `.3`, deleting the
/// oldest. Best-effort: rotation failures never block startup.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    log_path: &std::path::Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = log_path
        .parent()
        .ok_or_else(|| std::io::Error::other("log path has no parent"))?;
    std::fs::create_dir_all(dir)?;
    let file_name = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("log path has no file name"))?;

    // Startup marker so operators can find where this boot begins
    {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        writeln!(
            file,
            "--- stewardd: starting (pid: {}) ---\n",
            std::process::id()
        )?;
    }

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
