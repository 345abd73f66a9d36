//! Precondition checks run before an install touches anything.

use std::fs;

use anyhow::{anyhow, Context, Result};

use crate::paths::format_with_home;

use super::{log_line, StepContext};

pub fn setup(ctx: &StepContext) -> Result<()> {
    let work_dir = &ctx.paths.work_dir;
    log_line(
        ctx,
        format!("Creating work directory {}", format_with_home(work_dir)),
    );
    fs::create_dir_all(work_dir).with_context(|| {
        format!(
            "failed to create work directory {}",
            format_with_home(work_dir)
        )
    })?;

    log_line(ctx, "Checking if TIDAL is installed");
    let layout = ctx.require_target()?;
    if !layout.has_packaged_asset() {
        return Err(anyhow!(
            "no .asar file in {}",
            format_with_home(&layout.resources_dir)
        )
        .context("TIDAL is not installed or the installation is corrupt"));
    }

    log_line(
        ctx,
        format!(
            "Found TIDAL resources at {}",
            format_with_home(&layout.resources_dir)
        ),
    );
    if layout.is_installed() {
        log_line(ctx, "TidaLuna is already installed and will be replaced");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use lunapatch_core::{FixedResolver, Options, OptionsRequest, Step, APP_ASAR};

    use crate::events::RecordingSink;
    use crate::paths::InstallPaths;

    fn options_for(target: &std::path::Path) -> Options {
        OptionsRequest::install("http://127.0.0.1/luna.zip")
            .with_overwrite_path(target.display().to_string())
            .validate()
            .expect("options")
    }

    #[test]
    fn setup_requires_packaged_asset() {
        let temp = tempfile::tempdir().expect("tempdir");
        let resources = temp.path().join("resources");
        fs::create_dir_all(&resources).expect("resources");
        let paths = InstallPaths::new(temp.path().join("work"), Arc::new(FixedResolver::not_found()));
        let options = options_for(&resources);
        let sink = RecordingSink::new();
        let ctx = StepContext {
            step: Step::Setup,
            options: &options,
            paths: &paths,
            sink: &sink,
            download_timeout: Duration::from_secs(1),
        };

        let err = setup(&ctx).expect_err("no asar");
        assert_eq!(
            err.to_string(),
            "TIDAL is not installed or the installation is corrupt"
        );
        assert!(paths.work_dir.is_dir());

        fs::write(resources.join(APP_ASAR), b"asar").expect("asar");
        setup(&ctx).expect("setup passes");
    }

    #[test]
    fn setup_fails_when_target_unresolved() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = InstallPaths::new(temp.path().join("work"), Arc::new(FixedResolver::not_found()));
        let options = OptionsRequest::install("http://127.0.0.1/luna.zip")
            .validate()
            .expect("options");
        let sink = RecordingSink::new();
        let ctx = StepContext {
            step: Step::Setup,
            options: &options,
            paths: &paths,
            sink: &sink,
            download_timeout: Duration::from_secs(1),
        };
        assert!(setup(&ctx).is_err());
    }
}
