//! Hooklift apps - Entry Point
//!
//! Deploys the app in the current directory to Hooklift.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use lift_apps::app::options::DeployOptions;
use lift_apps::deploy::deploy;
use lift_apps::logs::{init_logging, LogLevel, LogOptions};
use lift_apps::storage::layout::StorageLayout;
use lift_apps::storage::settings::Settings;
use lift_apps::sync::http::HttpSyncClient;
use lift_apps::utils::version_info;

#[derive(Parser)]
#[command(name = "apps")]
#[command(about = "Deploy and manage your apps in Hooklift", long_about = None)]
#[command(version)]
struct Cli {
    /// Print debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploys an app
    Deploy(DeployArgs),
}

#[derive(Args)]
struct DeployArgs {
    /// Application name to use when running a command
    #[arg(short, long, value_name = "APPNAME")]
    app: Option<String>,

    /// Root of the app's sources
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Number of files uploaded at the same time
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Sync service URL
    #[arg(long, value_name = "URL")]
    sync_url: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = parse_cli();

    let settings = match load_settings().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let log_options = LogOptions {
        log_level: if cli.verbose {
            LogLevel::Debug
        } else {
            settings.log_level
        },
        json_format: cli.json_logs,
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }
    debug!("apps {}", version_info().render());

    match cli.command {
        Commands::Deploy(args) => run_deploy(args, settings, cli.verbose).await,
    }
}

/// CLI definition with the build's revision and date in `--version`
fn command() -> clap::Command {
    Cli::command().version(version_info().render())
}

fn parse_cli() -> Cli {
    Cli::from_arg_matches(&command().get_matches()).unwrap_or_else(|e| e.exit())
}

async fn load_settings() -> anyhow::Result<Settings> {
    let layout = StorageLayout::default();
    let settings = Settings::load(&layout.settings_file())
        .await
        .context("failed loading settings")?;
    Ok(settings)
}

async fn run_deploy(args: DeployArgs, settings: Settings, verbose: bool) -> ExitCode {
    let base_url = args.sync_url.unwrap_or(settings.sync.base_url);
    let client = match HttpSyncClient::new(
        &base_url,
        Duration::from_secs(settings.sync.connect_timeout_secs),
    ) {
        Ok(client) => {
            debug!("Using sync service at {}", client.base_url());
            client
        }
        Err(e) => {
            report_error("failed connecting to Hooklift Sync service", &e, verbose);
            return ExitCode::FAILURE;
        }
    };

    let mut options = DeployOptions::default()
        .with_sync_client(Arc::new(client))
        .with_upload_concurrency(args.concurrency.unwrap_or(settings.upload_concurrency));
    if let Some(app) = args.app {
        options = options.with_app(app);
    }
    if let Some(dir) = args.dir {
        options = options.with_app_dir(dir);
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    match deploy(options, cancel).await {
        Ok(report) => {
            info!(
                "Deployed app {} ({} files, {} bytes pushed, {} bytes of build output)",
                report.app_id, report.files_pushed, report.bytes_pushed, report.log_bytes
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_error("failed deploying app", &e, verbose);
            ExitCode::FAILURE
        }
    }
}

fn report_error(context: &str, err: &dyn std::error::Error, verbose: bool) {
    eprintln!("{} {}: {}", "error:".red().bold(), context, err);
    if verbose {
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        debug!("{:?}", err);
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Ctrl+C received, cancelling...");
        cancel.cancel();
    }
}
