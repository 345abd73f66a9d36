//! Subprocess execution, step logging, and OS-specific process steps.

use std::env;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use anyhow::{anyhow, bail, Context, Result};
use lunapatch_core::util::log_snippet;
use lunapatch_core::ProgressEvent;
use tracing::{debug, warn};

use super::StepContext;

const MACOS_DEFAULT_BUNDLE: &str = "/Applications/TIDAL.app";

/// One process-stop invocation for a target OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillCommand {
    pub program: &'static str,
    pub args: Vec<&'static str>,
}

impl KillCommand {
    fn label(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SignPlan {
    Skip,
    Codesign(PathBuf),
}

pub fn log_line(ctx: &StepContext, line: impl Into<String>) {
    let line = line.into();
    debug!(step = ctx.step.id(), "{}", line);
    ctx.sink.publish(ProgressEvent::step_log(ctx.step, line));
}

/// Runs a command, streaming its output as step logs, and returns the exit status.
///
/// Only spawn or wait failures are errors here; callers judge the status.
pub fn run_command_status(ctx: &StepContext, label: &str, mut command: Command) -> Result<ExitStatus> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("command failed to start: {}", label))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    thread::scope(|scope| {
        if let Some(stream) = stdout {
            scope.spawn(|| read_stream(stream, ctx));
        }
        if let Some(stream) = stderr {
            scope.spawn(|| read_stream(stream, ctx));
        }
        child
            .wait()
            .with_context(|| format!("command failed to run: {}", label))
    })
}

pub fn run_command(ctx: &StepContext, label: &str, command: Command) -> Result<()> {
    let status = run_command_status(ctx, label, command)?;
    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("command failed: {} ({})", label, status))
    }
}

fn read_stream(stream: impl std::io::Read, ctx: &StepContext) {
    let reader = BufReader::new(stream);
    for line in reader.lines().map_while(Result::ok) {
        let line = log_snippet(&line.replace('\r', ""));
        if !line.is_empty() {
            log_line(ctx, line);
        }
    }
}

pub fn kill_process(ctx: &StepContext) -> Result<()> {
    let os = env::consts::OS;
    let Some(commands) = kill_commands(os) else {
        return Err(anyhow!("unsupported OS: {}", os).context("Unsupported operating system"));
    };

    log_line(ctx, "Stopping TIDAL");
    for kill in commands {
        let label = kill.label();
        let mut command = Command::new(kill.program);
        command.args(&kill.args);
        match run_command_status(ctx, &label, command) {
            Ok(status) if status.success() => {
                log_line(ctx, format!("Stopped processes with `{}`", label));
            }
            Ok(status) => {
                log_line(ctx, format!("No running process matched `{}` ({})", label, status));
            }
            Err(err) if is_not_found(&err) => {
                warn!(command = %label, "kill tool missing");
                log_line(ctx, format!("`{}` is not available, skipping", kill.program));
            }
            Err(err) => return Err(err.context("Error stopping TIDAL")),
        }
    }
    log_line(ctx, "TIDAL is not running");
    Ok(())
}

fn kill_commands(os: &str) -> Option<Vec<KillCommand>> {
    let commands = match os {
        "windows" => ["TIDAL.exe", "Tidal.exe", "tidal.exe", "Update.exe"]
            .into_iter()
            .map(|image| KillCommand {
                program: "taskkill",
                args: vec!["/IM", image, "/T", "/F"],
            })
            .collect(),
        "macos" => ["TIDAL", "Tidal"]
            .into_iter()
            .map(|name| KillCommand {
                program: "pkill",
                args: vec!["-x", name],
            })
            .collect(),
        "linux" => ["tidal-hifi", "tidal"]
            .into_iter()
            .map(|name| KillCommand {
                program: "pkill",
                args: vec!["-x", name],
            })
            .collect(),
        _ => return None,
    };
    Some(commands)
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .map(|io| io.kind() == ErrorKind::NotFound)
            .unwrap_or(false)
    })
}

pub fn post_install_sign(ctx: &StepContext) -> Result<()> {
    let os = env::consts::OS;
    let target = ctx.target_dir();
    match sign_plan(os, target.as_deref()) {
        Some(SignPlan::Skip) => {
            log_line(ctx, format!("No need to sign TIDAL on {}, skipping", os));
            Ok(())
        }
        Some(SignPlan::Codesign(bundle)) => {
            let bundle_display = bundle.display().to_string();
            log_line(ctx, format!("Signing {}", bundle_display));
            let mut command = Command::new("codesign");
            command.args(["--force", "--deep", "--sign", "-"]).arg(&bundle);
            run_command(ctx, &format!("codesign --force --deep --sign - {}", bundle_display), command)
                .context("Error signing TIDAL")?;
            log_line(ctx, "TIDAL signed successfully");
            Ok(())
        }
        None => bail!("Unsupported operating system: {}", os),
    }
}

fn sign_plan(os: &str, target: Option<&Path>) -> Option<SignPlan> {
    match os {
        "windows" | "linux" => Some(SignPlan::Skip),
        "macos" => {
            let bundle = target
                .and_then(enclosing_app_bundle)
                .unwrap_or_else(|| PathBuf::from(MACOS_DEFAULT_BUNDLE));
            Some(SignPlan::Codesign(bundle))
        }
        _ => None,
    }
}

fn enclosing_app_bundle(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|ancestor| {
            ancestor
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("app"))
                .unwrap_or(false)
        })
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use lunapatch_core::{FixedResolver, OptionsRequest, Step};

    use crate::events::RecordingSink;
    use crate::paths::InstallPaths;

    #[test]
    fn kill_commands_cover_supported_systems() {
        let windows = kill_commands("windows").expect("windows");
        assert_eq!(windows[0].label(), "taskkill /IM TIDAL.exe /T /F");
        assert_eq!(
            windows.iter().map(KillCommand::label).collect::<Vec<_>>(),
            vec![
                "taskkill /IM TIDAL.exe /T /F",
                "taskkill /IM Tidal.exe /T /F",
                "taskkill /IM tidal.exe /T /F",
                "taskkill /IM Update.exe /T /F",
            ]
        );
        assert_eq!(kill_commands("linux").expect("linux").len(), 2);
        assert!(kill_commands("macos").expect("macos")[0].args.contains(&"TIDAL"));
        assert!(kill_commands("freebsd").is_none());
    }

    #[test]
    fn sign_plan_finds_enclosing_bundle() {
        let target = Path::new("/Users/luna/Applications/TIDAL.app/Contents/Resources");
        assert_eq!(
            sign_plan("macos", Some(target)),
            Some(SignPlan::Codesign(PathBuf::from(
                "/Users/luna/Applications/TIDAL.app"
            )))
        );
        assert_eq!(
            sign_plan("macos", Some(Path::new("/opt/tidal/resources"))),
            Some(SignPlan::Codesign(PathBuf::from(MACOS_DEFAULT_BUNDLE)))
        );
        assert_eq!(sign_plan("linux", None), Some(SignPlan::Skip));
        assert_eq!(sign_plan("windows", None), Some(SignPlan::Skip));
        assert_eq!(sign_plan("haiku", None), None);
    }

    #[cfg(unix)]
    #[test]
    fn run_command_streams_output_as_step_logs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = InstallPaths::new(temp.path(), Arc::new(FixedResolver::not_found()));
        let options = OptionsRequest::uninstall().validate().expect("options");
        let sink = RecordingSink::new();
        let ctx = StepContext {
            step: Step::KillProcess,
            options: &options,
            paths: &paths,
            sink: &sink,
            download_timeout: Duration::from_secs(1),
        };

        let mut ok = Command::new("sh");
        ok.args(["-c", "echo hello"]);
        run_command(&ctx, "echo", ok).expect("echo runs");
        assert!(sink.events().contains(&ProgressEvent::step_log(Step::KillProcess, "hello")));

        let mut failing = Command::new("sh");
        failing.args(["-c", "exit 3"]);
        assert!(run_command(&ctx, "exit", failing).is_err());
    }

    #[test]
    fn missing_program_is_reported_as_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = InstallPaths::new(temp.path(), Arc::new(FixedResolver::not_found()));
        let options = OptionsRequest::uninstall().validate().expect("options");
        let sink = RecordingSink::new();
        let ctx = StepContext {
            step: Step::KillProcess,
            options: &options,
            paths: &paths,
            sink: &sink,
            download_timeout: Duration::from_secs(1),
        };

        let err = run_command_status(&ctx, "missing", Command::new("lunapatch-no-such-tool"))
            .expect_err("spawn fails");
        assert!(is_not_found(&err));
    }
}
