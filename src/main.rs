//! stq - Simple Task Queue
//!
//! Command line front end for durable named task queues.

mod cli;
mod commands;

use clap::Parser;
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use stq_config::{ConfigLoader, ConfigValidator, LogConfig};
use stq_queue::{QueueError, QueueRegistry, RegistryOptions};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(cli.config.as_deref())?;
    init_tracing(&config.log)?;

    for warning in ConfigValidator::validate(&config)?.into_result()? {
        warn!("Config {}: {}", warning.path, warning.message);
    }

    let root = cli.root.unwrap_or_else(|| config.storage.root_path());
    let registry = QueueRegistry::open(root, RegistryOptions::from_config(&config)?)?;
    for skipped in registry.quarantined() {
        warn!(queue = %skipped.name, "Queue unavailable: {}", skipped.reason);
    }

    let result = commands::handle_command(&registry, cli.command).await;
    // Stops running queues before exit.
    drop(registry);

    if let Err(e) = result {
        report_error(e.as_ref());
        std::process::exit(1);
    }
    Ok(())
}

/// Print a failure as one JSON line on stderr.
fn report_error(err: &(dyn std::error::Error + 'static)) {
    let kind = err.downcast_ref::<QueueError>().map(QueueError::kind);
    let report = serde_json::json!({
        "error": kind,
        "message": err.to_string(),
    });
    eprintln!("{report}");
}

/// Initialize tracing with console output and, when `log.dir` is set,
/// daily rolling log files.
fn init_tracing(log: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    // Console goes to stderr so command output on stdout stays parseable.
    let console = fmt::layer()
        .with_target(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);

    let file = match log.dir_path() {
        Some(log_dir) => {
            std::fs::create_dir_all(&log_dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("stq")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&log_dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Keep the writer alive for the program duration.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();

    Ok(())
}
