//! Planning and dispatch for pipeline steps.
//!
//! Keeps the sequencing logic in one place so install and uninstall flows
//! stay predictable.

use std::time::Duration;

use anyhow::Result;
use lunapatch_core::{Action, InstallerConfig, Options, ProgressEvent, Step};
use tracing::warn;

use crate::events::NotificationSink;
use crate::paths::InstallPaths;

use super::{
    backup_original, download_payload, extract_payload, install_payload, kill_process,
    post_install_sign, restore_original, setup, uninstall_existing, StepContext,
};

pub fn build_plan(action: Action) -> Vec<Step> {
    match action {
        Action::Install => vec![
            Step::Setup,
            Step::KillProcess,
            Step::UninstallExisting,
            Step::Download,
            Step::Extract,
            Step::BackupOriginal,
            Step::InstallPayload,
            Step::PostInstallSign,
        ],
        Action::Uninstall => vec![
            Step::KillProcess,
            Step::UninstallExisting,
            Step::RestoreOriginal,
        ],
    }
}

/// Runs one step and reports its failure as a step-scoped error log.
pub fn run_step(step: Step, ctx: &StepContext) -> Result<()> {
    let result = match step {
        Step::Setup => setup(ctx),
        Step::KillProcess => kill_process(ctx),
        Step::UninstallExisting => uninstall_existing(ctx),
        Step::Download => download_payload(ctx),
        Step::Extract => extract_payload(ctx),
        Step::BackupOriginal => backup_original(ctx),
        Step::InstallPayload => install_payload(ctx),
        Step::RestoreOriginal => restore_original(ctx),
        Step::PostInstallSign => post_install_sign(ctx),
    };

    if let Err(err) = &result {
        let cause = err.root_cause().to_string();
        warn!(step = step.id(), error = %format!("{:#}", err), "step failed");
        ctx.sink
            .publish(ProgressEvent::step_error(step, err.to_string(), cause));
    }
    result
}

/// Executes a single step on behalf of the engine.
pub trait StepRunner: Send + Sync {
    fn run(&self, step: Step, options: &Options, sink: &dyn NotificationSink) -> Result<()>;
}

/// Production runner that touches the real filesystem, network, and processes.
#[derive(Debug, Clone)]
pub struct SystemSteps {
    paths: InstallPaths,
    download_timeout: Duration,
}

impl SystemSteps {
    pub fn new(paths: InstallPaths, download_timeout: Duration) -> Self {
        Self {
            paths,
            download_timeout,
        }
    }

    pub fn from_config(config: &InstallerConfig) -> Self {
        Self::new(
            InstallPaths::from_config(config),
            Duration::from_secs(config.download_timeout_secs),
        )
    }

    pub fn paths(&self) -> &InstallPaths {
        &self.paths
    }
}

impl StepRunner for SystemSteps {
    fn run(&self, step: Step, options: &Options, sink: &dyn NotificationSink) -> Result<()> {
        let ctx = StepContext {
            step,
            options,
            paths: &self.paths,
            sink,
            download_timeout: self.download_timeout,
        };
        run_step(step, &ctx)
    }
}
