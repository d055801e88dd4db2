use std::io::Write;
use std::process;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use keypipe::{Pipeline, PipelineConfig, PipelineExit, Shutdown, ShutdownMode, terminal};

/// Initialize tracing with KEYPIPE_LOG and LOG_FORMAT support.
///
/// Defaults to warn: stdout is an interactive raw-mode terminal and info lines
/// on stderr would interleave with the echo.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("KEYPIPE_LOG").as_deref() {
            Ok("trace") => "trace",
            Ok("debug") => "debug",
            Ok("info") => "info",
            Ok("error") => "error",
            _ => "warn",
        };
        EnvFilter::new(format!("keypipe={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

/// Turn SIGTERM or SIGHUP into a graceful shutdown.
///
/// # Panics
///
/// Panics if the signal handlers cannot be installed, which only happens when the
/// tokio runtime is misconfigured. That should fail fast at startup.
async fn watch_signals(shutdown: Shutdown) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut hangup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

    tokio::select! {
        _ = terminate.recv() => info!("Received SIGTERM, shutting down..."),
        _ = hangup.recv() => info!("Received SIGHUP, shutting down..."),
    }
    shutdown.trigger(ShutdownMode::Graceful);
}

async fn run() -> anyhow::Result<i32> {
    let config = PipelineConfig::from_env();
    let terminal = terminal::for_stdin();

    terminal
        .enable_raw()
        .context("failed to enable raw terminal mode")?;

    let pipeline = Pipeline::new(config, terminal.clone());
    tokio::spawn(watch_signals(pipeline.shutdown_handle()));

    let result = pipeline.run(tokio::io::stdin(), tokio::io::stdout()).await;

    match result {
        Ok(PipelineExit::Shutdown(mode)) => {
            // Graceful shutdown already restored the terminal; abrupt leaves it raw.
            let mut stdout = std::io::stdout();
            stdout.write_all(mode.notice().as_bytes())?;
            stdout.flush()?;
            Ok(0)
        }
        Ok(exit) => {
            if let Err(e) = terminal.restore() {
                error!(error = %e, "Failed to restore terminal mode");
            }
            eprintln!("keypipe: {}", describe(exit));
            Ok(exit.exit_code())
        }
        Err(e) => {
            if let Err(restore_err) = terminal.restore() {
                error!(error = %restore_err, "Failed to restore terminal mode");
            }
            Err(e.into())
        }
    }
}

fn describe(exit: PipelineExit) -> &'static str {
    match exit {
        PipelineExit::Shutdown(_) => "stopped",
        PipelineExit::InputClosed => "terminal input closed",
        PipelineExit::Cancelled => "cancelled",
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\rerror: {e:#}");
            1
        }
    };

    // Exit without waiting on the blocking stdin reader.
    process::exit(code);
}
