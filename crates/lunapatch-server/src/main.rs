//! Installer entrypoint: local web server by default, headless subcommands otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lunapatch_core::{Config, OptionsRequest};
use lunapatch_installer::{BroadcastSink, InstallManager, JitterDelay, SystemSteps};
use tracing::info;

mod api_errors;
mod browser;
mod headless;
mod server;
mod socket;
#[path = "runtime_config.rs"]
mod runtime_config;
#[path = "shutdown_signal.rs"]
mod shutdown_signal;

use crate::runtime_config::{config_source, init_tracing, load_config};
use crate::server::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Scratch directory for the downloaded payload
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    /// Address the server binds to
    #[arg(long)]
    host: Option<String>,

    /// Port the server listens on
    #[arg(long)]
    port: Option<u16>,

    /// Do not open the installer page in a browser
    #[arg(long)]
    no_browser: bool,

    /// Validate configuration and exit
    #[arg(long, global = true)]
    check: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Serve the installer API and progress websocket (default)
    Serve,
    /// Install TidaLuna into TIDAL from a release archive
    Install {
        /// URL of the TidaLuna release zip
        #[arg(long)]
        download_url: String,
        /// TIDAL resources directory, skips detection
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Remove TidaLuna and restore the original app.asar
    Uninstall {
        /// TIDAL resources directory, skips detection
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Report where TIDAL is and whether TidaLuna is installed
    Status {
        /// TIDAL resources directory, skips detection
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args).context("load config")?;

    init_tracing(&config);
    info!(config_source = config_source(&args), "configuration loaded");
    if lunapatch_core::util::diagnostic_mode() {
        info!(
            limit = lunapatch_core::util::log_limit(),
            "diagnostic logging enabled (snippets capped; newlines stripped)"
        );
    }

    if args.check {
        info!("configuration loaded successfully");
        return Ok(());
    }

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Install { download_url, path } => {
            let request = with_path(OptionsRequest::install(download_url), path);
            headless::run(&config, request).await
        }
        Command::Uninstall { path } => {
            headless::run(&config, with_path(OptionsRequest::uninstall(), path)).await
        }
        Command::Status { path } => headless::status(&config, path.as_deref()),
    }
}

async fn serve(config: &Config) -> Result<()> {
    let sink = BroadcastSink::new();
    let runner = SystemSteps::from_config(&config.installer);
    let paths = runner.paths().clone();
    let delay = JitterDelay::from_millis(
        config.installer.step_delay_min_ms,
        config.installer.step_delay_max_ms,
    );
    let manager =
        InstallManager::new(Arc::new(sink.clone()), Arc::new(runner)).with_delay(Arc::new(delay));
    info!(?paths, "installer ready");
    server::serve(&config.server, AppState::new(manager, sink, paths)).await
}

fn with_path(request: OptionsRequest, path: Option<PathBuf>) -> OptionsRequest {
    match path {
        Some(path) => request.with_overwrite_path(path.display().to_string()),
        None => request,
    }
}
