//! Opens the installer page in the user's default browser.

use std::env;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};

pub(super) fn open_url(url: &str) -> Result<()> {
    let mut command = browser_command(env::consts::OS, url)
        .ok_or_else(|| anyhow!("unsupported OS: {}", env::consts::OS))?;
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to open {}", url))?;
    Ok(())
}

fn browser_command(os: &str, url: &str) -> Option<Command> {
    let mut command = match os {
        "windows" => {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]);
            command
        }
        "macos" => Command::new("open"),
        "linux" | "freebsd" | "openbsd" | "netbsd" => Command::new("xdg-open"),
        _ => return None,
    };
    command.arg(url);
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_launcher_per_os() {
        let windows = browser_command("windows", "http://localhost:65530").expect("windows");
        assert_eq!(windows.get_program(), "cmd");
        let args: Vec<_> = windows.get_args().collect();
        assert_eq!(args.last().copied(), Some(std::ffi::OsStr::new("http://localhost:65530")));

        assert_eq!(
            browser_command("macos", "http://x").expect("macos").get_program(),
            "open"
        );
        assert_eq!(
            browser_command("linux", "http://x").expect("linux").get_program(),
            "xdg-open"
        );
        assert!(browser_command("plan9", "http://x").is_none());
    }
}
