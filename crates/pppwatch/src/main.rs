mod cli;
mod commands;
mod error;
mod output;

use std::path::Path;
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use pppwatch_config::{Config, LogConfig};
use pppwatch_core::{Monitor, RouterOsConnector, SqliteRepository, TelegramNotifier};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Install the global subscriber. The returned guard flushes the log file
/// and must live until the process is done logging.
fn init_tracing(
    verbosity: u8,
    log: &LogConfig,
    daemon: bool,
) -> Result<Option<WorkerGuard>, CliError> {
    let default = match verbosity {
        0 if daemon => log.level.as_str(),
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default).map_err(|e| CliError::Validation {
            field: "log.level".into(),
            reason: e.to_string(),
        })?,
    };

    let stderr = if log.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    // Only the daemon writes a log file.
    let (file, guard) = match log.directory.as_deref() {
        Some(dir) if daemon => {
            std::fs::create_dir_all(dir)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "pppwatch.log"));
            let layer = if log.json {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .boxed()
            } else {
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed()
            };
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .init();
    Ok(guard)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Shell completions generation
        Command::Completions(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "pppwatch", &mut std::io::stdout());
            Ok(())
        }

        // Config commands must work even when the file is broken
        Command::Config(args) => {
            let _log = init_tracing(cli.global.verbose, &LogConfig::default(), false)?;
            commands::config_cmd::handle(args, &cli.global)
        }

        cmd => {
            let cfg = pppwatch_config::load_config(cli.global.config.as_deref())?;
            let daemon = matches!(cmd, Command::Run);
            let _log = init_tracing(cli.global.verbose, &cfg.log, daemon)?;

            let monitor = build_monitor(&cfg, &cli.global).await?;
            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &monitor, &cli.global).await;
            monitor.shutdown().await;
            result
        }
    }
}

/// Wire the monitor from the config file plus CLI overrides.
async fn build_monitor(cfg: &Config, global: &GlobalOpts) -> Result<Monitor, CliError> {
    let engine = cfg.engine_config()?;

    let mut cfg = cfg.clone();
    if let Some(ref database) = global.database {
        cfg.database.url = Some(database.clone());
    }
    let url = cfg.database_url();
    if let Some(file) = url.strip_prefix("sqlite://") {
        let file = file.split('?').next().unwrap_or(file);
        if let Some(parent) = Path::new(file).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    tracing::debug!(database = %url, "opening database");
    let repo = SqliteRepository::connect(&url).await?;

    let notifier =
        TelegramNotifier::new(cfg.telegram_api_base()?).map_err(|e| CliError::Validation {
            field: "telegram.api_base".into(),
            reason: e.to_string(),
        })?;

    Ok(
        Monitor::builder(Arc::new(repo), Arc::new(RouterOsConnector::new(&engine)))
            .config(engine)
            .notifier(Arc::new(notifier))
            .build(),
    )
}
