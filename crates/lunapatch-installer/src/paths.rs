//! Filesystem layout helpers for the payload work directory and the target.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lunapatch_core::{InstallerConfig, Options, SystemResolver, TargetLayout, TargetResolver};

const PAYLOAD_FILE: &str = "payload.zip";
const PAYLOAD_PART_FILE: &str = "payload.zip.part";
const EXTRACT_DIR: &str = "extracted";

#[derive(Clone)]
pub struct InstallPaths {
    pub work_dir: PathBuf,
    pub payload_zip: PathBuf,
    pub payload_part: PathBuf,
    pub extract_dir: PathBuf,
    /// Used when a request carries no overwrite path, ahead of the resolver.
    pub configured_target: Option<PathBuf>,
    resolver: Arc<dyn TargetResolver>,
}

impl InstallPaths {
    pub fn new(work_dir: impl Into<PathBuf>, resolver: Arc<dyn TargetResolver>) -> Self {
        let work_dir = work_dir.into();
        Self {
            payload_zip: work_dir.join(PAYLOAD_FILE),
            payload_part: work_dir.join(PAYLOAD_PART_FILE),
            extract_dir: work_dir.join(EXTRACT_DIR),
            work_dir,
            configured_target: None,
            resolver,
        }
    }

    pub fn from_config(config: &InstallerConfig) -> Self {
        let mut paths = Self::new(config.effective_work_dir(), Arc::new(SystemResolver));
        paths.configured_target = config.target_dir.clone();
        paths
    }

    pub fn with_configured_target(mut self, target: Option<PathBuf>) -> Self {
        self.configured_target = target;
        self
    }

    /// Target resources directory for a run: overwrite path, then config, then resolver.
    pub fn target_dir(&self, options: &Options) -> Option<PathBuf> {
        self.target_dir_for(options.overwrite_path.as_deref())
    }

    pub fn target_dir_for(&self, overwrite: Option<&Path>) -> Option<PathBuf> {
        overwrite
            .map(Path::to_path_buf)
            .or_else(|| self.configured_target.clone())
            .or_else(|| self.resolver.resolve())
    }

    pub fn target_layout(&self, options: &Options) -> Option<TargetLayout> {
        self.target_dir(options).map(TargetLayout::new)
    }
}

impl fmt::Debug for InstallPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallPaths")
            .field("work_dir", &self.work_dir)
            .field("configured_target", &self.configured_target)
            .finish_non_exhaustive()
    }
}

pub fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Renders a path with the home directory collapsed to `$HOME` for logs.
pub fn format_with_home(path: &Path) -> String {
    if let Some(home) = home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            let mut rendered = PathBuf::from("$HOME");
            rendered.push(stripped);
            return rendered.display().to_string();
        }
    }
    path.display().to_string()
}
