//! Configuration types and defaults for the installer.
//!
//! Keeps schema definitions in one place for easier auditing.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from config.toml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub server: ServerConfig,
    pub installer: InstallerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Open the frontend in the default browser once the listener is bound.
    pub open_browser: bool,
}

impl ServerConfig {
    pub const DEFAULT_PORT: u16 = 65530;

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.display_host(), self.port)
    }

    fn display_host(&self) -> &str {
        match self.host.as_str() {
            "127.0.0.1" | "0.0.0.0" | "::1" | "::" => "localhost",
            other => other,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: Self::DEFAULT_PORT,
            open_browser: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Scratch directory for the downloaded and extracted payload.
    pub work_dir: Option<PathBuf>,
    /// Resources directory used when a request carries no overwrite path.
    pub target_dir: Option<PathBuf>,
    pub download_timeout_secs: u64,
    /// Lower bound of the randomized pause between steps.
    pub step_delay_min_ms: u64,
    /// Upper bound of the randomized pause between steps.
    pub step_delay_max_ms: u64,
}

impl InstallerConfig {
    pub const WORK_DIR_NAME: &'static str = "TidaLunaInstaller";

    /// Work directory after applying the system temp fallback.
    pub fn effective_work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(Self::WORK_DIR_NAME))
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            target_dir: None,
            download_timeout_secs: 120,
            step_delay_min_ms: 500,
            step_delay_max_ms: 1500,
        }
    }
}
