//! Per-step execution context.
//!
//! Bundles everything a step may touch so step functions stay free of
//! engine state.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use lunapatch_core::{Options, Step, TargetLayout};

use crate::events::NotificationSink;
use crate::paths::{format_with_home, InstallPaths};

pub struct StepContext<'a> {
    pub step: Step,
    pub options: &'a Options,
    pub paths: &'a InstallPaths,
    pub sink: &'a dyn NotificationSink,
    pub download_timeout: Duration,
}

impl StepContext<'_> {
    /// Resources directory for this run, if any source resolves one.
    pub fn target_dir(&self) -> Option<PathBuf> {
        self.paths.target_dir(self.options)
    }

    pub fn target_layout(&self) -> Option<TargetLayout> {
        self.paths.target_layout(self.options)
    }

    /// Like `target_layout`, but a missing or unresolved directory is an error.
    pub fn require_target(&self) -> Result<TargetLayout> {
        let Some(layout) = self.target_layout() else {
            return Err(anyhow!("no TIDAL resources directory found").context("TIDAL is not installed"));
        };
        if !layout.resources_dir.is_dir() {
            return Err(anyhow!(
                "{} does not exist",
                format_with_home(&layout.resources_dir)
            )
            .context("TIDAL is not installed"));
        }
        Ok(layout)
    }
}
