//! Run parameters, step identifiers, and progress event wire types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Requested installer action.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Install,
    Uninstall,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Install => "install",
            Action::Uninstall => "uninstall",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Action::Install => "Install",
            Action::Uninstall => "Uninstall",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = OptionsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "install" => Ok(Action::Install),
            "uninstall" => Ok(Action::Uninstall),
            "" => Err(OptionsError::MissingAction),
            other => Err(OptionsError::InvalidAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("no action provided")]
    MissingAction,
    #[error("invalid action provided: {0}")]
    InvalidAction(String),
    #[error("no download URL provided")]
    MissingDownloadUrl,
}

/// Unvalidated run parameters as they arrive from a transport.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsRequest {
    pub action: Option<String>,
    pub download_url: Option<String>,
    pub overwrite_path: Option<String>,
}

impl OptionsRequest {
    pub fn install(download_url: impl Into<String>) -> Self {
        Self {
            action: Some(Action::Install.as_str().to_string()),
            download_url: Some(download_url.into()),
            overwrite_path: None,
        }
    }

    pub fn uninstall() -> Self {
        Self {
            action: Some(Action::Uninstall.as_str().to_string()),
            download_url: None,
            overwrite_path: None,
        }
    }

    pub fn with_overwrite_path(mut self, path: impl Into<String>) -> Self {
        self.overwrite_path = Some(path.into());
        self
    }

    /// Check the request and produce immutable run options.
    ///
    /// The download URL is only kept for installs, and must be non-empty there.
    pub fn validate(self) -> Result<Options, OptionsError> {
        let action: Action = self
            .action
            .as_deref()
            .ok_or(OptionsError::MissingAction)?
            .parse()?;

        let download_url = non_empty(self.download_url);
        let download_url = match action {
            Action::Install => Some(download_url.ok_or(OptionsError::MissingDownloadUrl)?),
            Action::Uninstall => None,
        };

        Ok(Options {
            action,
            download_url,
            overwrite_path: non_empty(self.overwrite_path).map(PathBuf::from),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Validated run parameters, fixed for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite_path: Option<PathBuf>,
}

/// One stage of an install or uninstall plan.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Setup,
    KillProcess,
    UninstallExisting,
    Download,
    Extract,
    BackupOriginal,
    InstallPayload,
    RestoreOriginal,
    PostInstallSign,
}

impl Step {
    pub const ALL: [Step; 9] = [
        Step::Setup,
        Step::KillProcess,
        Step::UninstallExisting,
        Step::Download,
        Step::Extract,
        Step::BackupOriginal,
        Step::InstallPayload,
        Step::RestoreOriginal,
        Step::PostInstallSign,
    ];

    /// Stable identifier used on the wire and in logs.
    pub fn id(self) -> &'static str {
        match self {
            Step::Setup => "SETUP",
            Step::KillProcess => "KILL_PROCESS",
            Step::UninstallExisting => "UNINSTALL_EXISTING",
            Step::Download => "DOWNLOAD",
            Step::Extract => "EXTRACT",
            Step::BackupOriginal => "BACKUP_ORIGINAL",
            Step::InstallPayload => "INSTALL_PAYLOAD",
            Step::RestoreOriginal => "RESTORE_ORIGINAL",
            Step::PostInstallSign => "POST_INSTALL_SIGN",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Setup => "Check TIDAL installation",
            Step::KillProcess => "Stop TIDAL",
            Step::UninstallExisting => "Remove existing TidaLuna",
            Step::Download => "Download TidaLuna",
            Step::Extract => "Extract TidaLuna",
            Step::BackupOriginal => "Back up original app.asar",
            Step::InstallPayload => "Insert TidaLuna",
            Step::RestoreOriginal => "Restore original app.asar",
            Step::PostInstallSign => "Sign TIDAL",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Log line that is not tied to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallLog {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub is_error: bool,
}

/// Log line emitted by a step while it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepLog {
    pub step: Step,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub is_error: bool,
}

/// Plan announcement sent when a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallInfo {
    pub steps: Vec<Step>,
    pub current_step: Option<Step>,
    pub current_step_index: usize,
    pub action: Action,
}

/// Event pushed to observers; serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProgressEvent {
    InstallLog(InstallLog),
    StepLog(StepLog),
    StepUpdate(Step),
    InstallationStart(InstallInfo),
    InstallationComplete,
    InstallationError(String),
}

impl ProgressEvent {
    pub fn global_log(message: impl Into<String>) -> Self {
        Self::InstallLog(InstallLog {
            message: message.into(),
            error: None,
            is_error: false,
        })
    }

    pub fn global_error(message: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::InstallLog(InstallLog {
            message: message.into(),
            error: Some(error.to_string()),
            is_error: true,
        })
    }

    pub fn step_log(step: Step, message: impl Into<String>) -> Self {
        Self::StepLog(StepLog {
            step,
            message: message.into(),
            error: None,
            is_error: false,
        })
    }

    pub fn step_error(step: Step, message: impl Into<String>, error: impl fmt::Display) -> Self {
        Self::StepLog(StepLog {
            step,
            message: message.into(),
            error: Some(error.to_string()),
            is_error: true,
        })
    }

    /// True for the last event a run ever emits.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::InstallationComplete | ProgressEvent::InstallationError(_)
        )
    }

    pub fn is_error(&self) -> bool {
        match self {
            ProgressEvent::InstallLog(log) => log.is_error,
            ProgressEvent::StepLog(log) => log.is_error,
            ProgressEvent::InstallationError(_) => true,
            _ => false,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Read-only view of the engine state for pollers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub is_running: bool,
    pub options: Option<Options>,
    pub current_step: Option<Step>,
    pub current_step_index: usize,
    pub steps: Vec<Step>,
}
