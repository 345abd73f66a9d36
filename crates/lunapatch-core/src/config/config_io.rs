//! Configuration loading and path resolution.
//!
//! Focuses on I/O and filesystem-related helpers for config management.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::Config;

const CONFIG_DIR_NAME: &str = "lunapatch";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFailed(String),
    #[error("failed to parse config: {0}")]
    ParseFailed(String),
    #[error("missing $HOME, unable to resolve config directory")]
    MissingHome,
}

impl Config {
    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|err| ConfigError::ReadFailed(err.to_string()))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from the default config location, if present.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_config_path()?;
        if !path.exists() {
            let mut config = Self::default();
            config.apply_runtime_defaults();
            return Ok(config);
        }
        Self::load_from_path(&path)
    }

    /// Parse configuration text and normalize it.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            toml::from_str(contents).map_err(|err| ConfigError::ParseFailed(err.to_string()))?;
        config.apply_runtime_defaults();
        Ok(config)
    }

    /// Return the default config directory based on XDG, $HOME, or %APPDATA%.
    pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
        config_dir_from(
            env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            env::var_os("HOME").map(PathBuf::from),
            env::var_os("APPDATA").map(PathBuf::from),
        )
    }

    /// Return the default config file path.
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }
}

fn config_dir_from(
    xdg: Option<PathBuf>,
    home: Option<PathBuf>,
    appdata: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(xdg) = xdg.filter(|path| !path.as_os_str().is_empty()) {
        // Prefer the XDG base directory when it is explicitly configured.
        return Ok(xdg.join(CONFIG_DIR_NAME));
    }
    if let Some(home) = home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(home.join(".config").join(CONFIG_DIR_NAME));
    }
    // Windows has no $HOME by default.
    appdata
        .filter(|path| !path.as_os_str().is_empty())
        .map(|appdata| appdata.join(CONFIG_DIR_NAME))
        .ok_or(ConfigError::MissingHome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_section_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8123

            [installer]
            download_timeout_secs = 30
            "#,
        )
        .expect("parse");
        assert_eq!(config.server.port, 8123);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.server.open_browser);
        assert_eq!(config.installer.download_timeout_secs, 30);
        assert_eq!(config.installer.step_delay_min_ms, 500);
        assert_eq!(config.general.log_level, None);
    }

    #[test]
    fn malformed_config_reports_parse_failure() {
        let err = Config::from_toml("[server]\nport = \"nope\"").expect_err("must fail");
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[general]\nlog_level = \"debug\"\n").expect("write");
        let config = Config::load_from_path(&path).expect("load");
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));

        let missing = Config::load_from_path(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::ReadFailed(_))));
    }

    #[test]
    fn config_dir_prefers_xdg_then_home_then_appdata() {
        let xdg = Some(PathBuf::from("/xdg"));
        let home = Some(PathBuf::from("/home/user"));
        let appdata = Some(PathBuf::from("C:/Users/user/AppData/Roaming"));

        assert_eq!(
            config_dir_from(xdg, home.clone(), appdata.clone()).expect("xdg"),
            PathBuf::from("/xdg/lunapatch")
        );
        assert_eq!(
            config_dir_from(None, home, appdata.clone()).expect("home"),
            PathBuf::from("/home/user/.config/lunapatch")
        );
        assert_eq!(
            config_dir_from(None, None, appdata).expect("appdata"),
            PathBuf::from("C:/Users/user/AppData/Roaming/lunapatch")
        );
        assert!(matches!(
            config_dir_from(None, None, None),
            Err(ConfigError::MissingHome)
        ));
    }
}
