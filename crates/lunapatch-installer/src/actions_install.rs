//! Insert and remove the payload's app directory.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use crate::paths::format_with_home;

use super::{log_line, StepContext};

pub fn install_payload(ctx: &StepContext) -> Result<()> {
    let layout = ctx.require_target()?;
    let extract_dir = &ctx.paths.extract_dir;
    if !extract_dir.is_dir() {
        return Err(anyhow!(
            "{} does not exist",
            format_with_home(extract_dir)
        )
        .context("Extracted TidaLuna files are missing"));
    }

    log_line(
        ctx,
        format!(
            "Copying TidaLuna into {}",
            format_with_home(&layout.plugin_dir)
        ),
    );
    copy_dir_recursive(extract_dir, &layout.plugin_dir).context("Error inserting TidaLuna")?;
    log_line(ctx, "TidaLuna files copied");

    log_line(ctx, "Cleaning up temporary files");
    clean_work_dir(ctx).context("Error cleaning up temporary files")?;
    log_line(ctx, "Temporary files cleaned up");
    Ok(())
}

pub fn uninstall_existing(ctx: &StepContext) -> Result<()> {
    let Some(layout) = ctx.target_layout() else {
        log_line(ctx, "TIDAL resources directory not found, nothing to remove");
        return Ok(());
    };

    if !layout.plugin_dir.exists() {
        log_line(ctx, "TidaLuna is not installed, skipping removal");
        return Ok(());
    }

    log_line(
        ctx,
        format!("Removing {}", format_with_home(&layout.plugin_dir)),
    );
    fs::remove_dir_all(&layout.plugin_dir)
        .with_context(|| format!("failed to remove {}", layout.plugin_dir.display()))
        .context("Error removing TidaLuna")?;
    log_line(ctx, "TidaLuna removed");
    Ok(())
}

/// Removes what the pipeline wrote into the work directory, then the
/// directory itself if nothing else lives there.
fn clean_work_dir(ctx: &StepContext) -> Result<()> {
    let paths = ctx.paths;
    for file in [&paths.payload_zip, &paths.payload_part] {
        if file.exists() {
            fs::remove_file(file).with_context(|| format!("failed to remove {}", file.display()))?;
        }
    }
    if paths.extract_dir.exists() {
        fs::remove_dir_all(&paths.extract_dir)
            .with_context(|| format!("failed to remove {}", paths.extract_dir.display()))?;
    }
    if fs::remove_dir(&paths.work_dir).is_err() {
        log_line(
            ctx,
            format!("Leaving {} in place", format_with_home(&paths.work_dir)),
        );
    }
    Ok(())
}

/// Recursively copies `src` into `dst`, overwriting existing files.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        bail!("source location is not a directory: {}", src.display());
    }
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let metadata = fs::metadata(&src_path)
            .with_context(|| format!("failed to stat {}", src_path.display()))?;
        if metadata.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
            continue;
        }
        fs::copy(&src_path, &dst_path).with_context(|| {
            format!(
                "failed to copy {} -> {}",
                src_path.display(),
                dst_path.display()
            )
        })?;
    }
    Ok(())
}
