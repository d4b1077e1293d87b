//! csvrelay - relay CSV datasets to an FTP-over-TLS server

use anyhow::{Context, Result};
use chrono::NaiveTime;
use clap::{Parser, ValueEnum};
use csvrelay_common::logging::{init_logging, LogConfig, LogLevel};
use csvrelay_ingest::config::DEFAULT_CONFIG_PATH;
use csvrelay_ingest::fetch::Fetcher;
use csvrelay_ingest::ftp::{FtpConfig, FtpsConnector};
use csvrelay_ingest::pipeline::{FailurePolicy, Runner, RunnerSettings};
use csvrelay_ingest::scheduler::{parse_run_time, DailySchedule, DEFAULT_RUN_AT};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "csvrelay")]
#[command(author, version, about = "Download CSV datasets and relay them to an FTP-over-TLS server")]
struct Cli {
    /// `manual` runs once now, `schedule` runs every day at --at
    #[arg(value_enum, ignore_case = true)]
    mode: Mode,

    /// Source configuration file
    #[arg(short, long, env = "CSVRELAY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory for the temporary CSV files
    #[arg(long, env = "CSVRELAY_WORK_DIR", default_value = ".")]
    work_dir: PathBuf,

    /// Local time of the daily run (HH:MM)
    #[arg(long, env = "CSVRELAY_RUN_AT", default_value = DEFAULT_RUN_AT, value_parser = parse_run_time)]
    at: NaiveTime,

    /// What to do with the remaining sources when one fails
    #[arg(long, value_enum, default_value_t = FailurePolicy::Abort)]
    on_error: FailurePolicy,

    /// HTTP download timeout in seconds
    #[arg(long, default_value_t = 300)]
    fetch_timeout: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Manual,
    Schedule,
}

#[tokio::main]
async fn main() {
    // before parsing so .env values reach the clap env fallbacks
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("csvrelay")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            None
        },
    };

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %format!("{e:#}"), "csvrelay failed");
            1
        },
    };

    drop(guard);
    process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let ftp = FtpConfig::from_env()?;
    let fetcher = Fetcher::new(Duration::from_secs(cli.fetch_timeout))
        .context("Failed to build HTTP client")?;

    let settings = RunnerSettings {
        config_path: cli.config,
        work_dir: cli.work_dir,
        on_error: cli.on_error,
    };
    let runner = Runner::new(settings, fetcher, FtpsConnector::new(ftp));

    match cli.mode {
        Mode::Manual => {
            info!("Starting manual run");
            let report = runner.run().await?.into_result()?;
            info!(uploaded = report.uploaded.len(), "Manual run complete");
        },
        Mode::Schedule => {
            let runner = &runner;
            DailySchedule::new(cli.at)
                .run(
                    move || async move { runner.run().await?.into_result().map(|_| ()) },
                    shutdown_signal(),
                )
                .await;
        },
    }

    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_mode_is_case_insensitive() {
        let cli = Cli::try_parse_from(["csvrelay", "MANUAL"]).unwrap();
        assert_eq!(cli.mode, Mode::Manual);
        assert_eq!(cli.on_error, FailurePolicy::Abort);

        let cli = Cli::try_parse_from(["csvrelay", "Schedule", "--at", "06:15"]).unwrap();
        assert_eq!(cli.mode, Mode::Schedule);
        assert_eq!(cli.at, NaiveTime::from_hms_opt(6, 15, 0).unwrap());
    }

    #[test]
    fn test_invalid_and_missing_mode_rejected() {
        assert!(Cli::try_parse_from(["csvrelay"]).is_err());
        assert!(Cli::try_parse_from(["csvrelay", "weekly"]).is_err());
        assert!(Cli::try_parse_from(["csvrelay", "schedule", "--at", "7pm"]).is_err());
    }

    #[test]
    fn test_on_error_continue() {
        let cli = Cli::try_parse_from(["csvrelay", "manual", "--on-error", "continue"]).unwrap();
        assert_eq!(cli.on_error, FailurePolicy::Continue);
    }
}
