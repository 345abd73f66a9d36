//! Terminal-only install, uninstall, and status commands.
//!
//! Drives the same engine as the server, printing one line per event.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use lunapatch_core::{Config, OptionsRequest, ProgressEvent, TargetLayout};
use lunapatch_installer::{
    format_with_home, BroadcastSink, InstallManager, InstallPaths, SystemSteps,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

pub(super) async fn run(config: &Config, request: OptionsRequest) -> Result<()> {
    let sink = BroadcastSink::new();
    let events = sink.subscribe();
    let runner = Arc::new(SystemSteps::from_config(&config.installer));
    let manager = InstallManager::new(Arc::new(sink), runner);
    let stdout = io::stdout();
    drive(&manager, events, request, &mut stdout.lock()).await
}

/// Sets options, plans, starts, and follows the run to its terminal event.
async fn drive(
    manager: &InstallManager,
    mut events: broadcast::Receiver<ProgressEvent>,
    request: OptionsRequest,
    out: &mut impl Write,
) -> Result<()> {
    manager.set_options(request)?;
    manager.generate_steps()?;
    manager.start()?;

    loop {
        match events.recv().await {
            Ok(event) => {
                writeln!(out, "{}", describe(&event)).context("write progress")?;
                match event {
                    ProgressEvent::InstallationComplete => return Ok(()),
                    ProgressEvent::InstallationError(reason) => return Err(anyhow!(reason)),
                    _ => {}
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "progress output fell behind; events dropped");
            }
            Err(RecvError::Closed) => bail!("event stream closed before the run finished"),
        }
    }
}

pub(super) fn status(config: &Config, path: Option<&Path>) -> Result<()> {
    let paths = InstallPaths::from_config(&config.installer);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match paths.target_dir_for(path) {
        Some(dir) => {
            let layout = TargetLayout::new(&dir);
            writeln!(out, "TIDAL resources: {}", format_with_home(&dir))?;
            let state = if layout.is_installed() {
                "installed"
            } else {
                "not installed"
            };
            writeln!(out, "TidaLuna: {}", state)?;
        }
        None => writeln!(out, "TIDAL installation not found")?,
    }
    Ok(())
}

fn describe(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::InstallLog(log) => with_error(&log.message, log.error.as_deref()),
        ProgressEvent::StepLog(log) => format!(
            "  [{}] {}",
            log.step.id(),
            with_error(&log.message, log.error.as_deref())
        ),
        ProgressEvent::StepUpdate(step) => format!("==> {}", step.label()),
        ProgressEvent::InstallationStart(info) => format!(
            "{} started ({} steps)",
            info.action.label(),
            info.steps.len()
        ),
        ProgressEvent::InstallationComplete => "Done.".to_string(),
        ProgressEvent::InstallationError(reason) => format!("Failed: {}", reason),
    }
}

fn with_error(message: &str, error: Option<&str>) -> String {
    match error {
        Some(error) if error != message => format!("{} ({})", message, error),
        _ => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunapatch_core::{Options, Step};
    use lunapatch_installer::{NotificationSink, StepRunner};

    struct Scripted {
        fail_on: Option<Step>,
    }

    impl StepRunner for Scripted {
        fn run(&self, step: Step, _options: &Options, sink: &dyn NotificationSink) -> Result<()> {
            sink.publish(ProgressEvent::step_log(step, "working"));
            if self.fail_on == Some(step) {
                bail!("scripted failure");
            }
            Ok(())
        }
    }

    fn manager(fail_on: Option<Step>) -> (InstallManager, broadcast::Receiver<ProgressEvent>) {
        let sink = BroadcastSink::new();
        let events = sink.subscribe();
        let manager = InstallManager::new(Arc::new(sink), Arc::new(Scripted { fail_on }));
        (manager, events)
    }

    #[tokio::test]
    async fn prints_every_event_until_complete() {
        let (manager, events) = manager(None);
        let mut out = Vec::new();
        drive(&manager, events, OptionsRequest::uninstall(), &mut out)
            .await
            .expect("run");

        let text = String::from_utf8(out).expect("utf-8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.first().copied(), Some("Options set successfully."));
        assert!(lines.contains(&"  [RESTORE_ORIGINAL] working"));
        assert_eq!(lines.last().copied(), Some("Done."));
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn failed_run_is_an_error() {
        let (manager, events) = manager(Some(Step::UninstallExisting));
        let mut out = Vec::new();
        let err = drive(&manager, events, OptionsRequest::uninstall(), &mut out)
            .await
            .expect_err("failure");
        assert!(err.to_string().contains("scripted failure"));
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn rejected_options_never_start() {
        let (manager, events) = manager(None);
        let mut out = Vec::new();
        let request = OptionsRequest {
            action: Some("install".to_string()),
            ..OptionsRequest::default()
        };
        assert!(drive(&manager, events, request, &mut out).await.is_err());
        assert!(out.is_empty());
        assert!(manager.steps().is_empty());
    }

    #[test]
    fn describe_folds_errors_into_one_line() {
        let line = describe(&ProgressEvent::step_error(
            Step::Download,
            "Error downloading TidaLuna",
            "HTTP 404",
        ));
        assert_eq!(line, "  [DOWNLOAD] Error downloading TidaLuna (HTTP 404)");
        assert_eq!(
            describe(&ProgressEvent::StepUpdate(Step::Extract)),
            format!("==> {}", Step::Extract.label())
        );
    }
}
