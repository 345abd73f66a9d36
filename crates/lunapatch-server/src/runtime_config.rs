//! Configuration loading and tracing setup.
//!
//! Keeps environment handling and logging setup out of the main control flow.

use anyhow::{Context, Result};
use lunapatch_core::Config;
use tracing_subscriber::EnvFilter;

use super::Args;

pub(super) fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config.as_ref() {
        Some(path) => Config::load_from_path(path).context("read config from path")?,
        None => Config::load_default().context("read default config")?,
    };
    apply_overrides(&mut config, args);
    Ok(config)
}

/// Command-line flags win over whatever the config file says.
pub(super) fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(host) = args.host.as_ref() {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.no_browser {
        config.server.open_browser = false;
    }
    if let Some(dir) = args.work_dir.as_ref() {
        config.installer.work_dir = Some(dir.clone());
    }
}

pub(super) fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            config
                .general
                .log_level
                .clone()
                .unwrap_or_else(|| "info".to_string()),
        )
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub(super) fn config_source(args: &Args) -> &'static str {
    if args.config.is_some() {
        return "custom";
    }
    match Config::default_config_path() {
        Ok(path) if path.exists() => "default",
        _ => "builtin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    #[test]
    fn flags_override_config_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[server]\nport = 7000\nopen_browser = true\n[installer]\nstep_delay_min_ms = 5\nstep_delay_max_ms = 10\n",
        )
        .expect("config");

        let args = Args::try_parse_from([
            "lunapatch",
            "--config",
            path.to_str().expect("utf-8 path"),
            "--port",
            "7100",
            "--no-browser",
        ])
        .expect("args");
        let config = load_config(&args).expect("load");
        assert_eq!(config.server.port, 7100);
        assert!(!config.server.open_browser);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.installer.step_delay_max_ms, 10);
        assert_eq!(config_source(&args), "custom");
    }

    #[test]
    fn missing_custom_config_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("absent.toml");
        let args = Args::try_parse_from([
            "lunapatch",
            "--config",
            missing.to_str().expect("utf-8 path"),
        ])
        .expect("args");
        assert!(load_config(&args).is_err());
    }
}
