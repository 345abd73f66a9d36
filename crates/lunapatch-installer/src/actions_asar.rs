//! Backup and restore of the packaged `app.asar`.
//!
//! `original.asar` is the only durable record that a payload is installed, so
//! both directions write through a temporary file and rename into place.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::paths::format_with_home;

use super::{log_line, StepContext};

pub fn backup_original(ctx: &StepContext) -> Result<()> {
    let layout = ctx.require_target()?;

    if layout.backup_asset.is_file() {
        log_line(ctx, "original.asar already exists, keeping the existing backup");
    } else if layout.live_asset.is_file() {
        log_line(ctx, "Backing up app.asar to original.asar");
        copy_into_place(&layout.live_asset, &layout.backup_asset)
            .context("Error backing up app.asar")?;
    } else {
        return Err(anyhow!(
            "neither app.asar nor original.asar found in {}",
            format_with_home(&layout.resources_dir)
        )
        .context("TIDAL installation is corrupt, please reinstall TIDAL"));
    }

    if layout.live_asset.exists() {
        fs::remove_file(&layout.live_asset)
            .with_context(|| format!("failed to remove {}", layout.live_asset.display()))
            .context("Error backing up app.asar")?;
        log_line(ctx, "Removed app.asar so TIDAL loads the app directory");
    }

    log_line(ctx, "Original app.asar backed up");
    Ok(())
}

pub fn restore_original(ctx: &StepContext) -> Result<()> {
    let Some(layout) = ctx.target_layout() else {
        log_line(ctx, "TIDAL resources directory not found, nothing to restore");
        return Ok(());
    };

    if !layout.backup_asset.is_file() {
        return Err(anyhow!(
            "original.asar not found in {}",
            format_with_home(&layout.resources_dir)
        )
        .context("Cannot restore app.asar, the backup is missing"));
    }

    log_line(ctx, "Restoring app.asar from original.asar");
    copy_into_place(&layout.backup_asset, &layout.live_asset)
        .context("Error restoring app.asar")?;
    fs::remove_file(&layout.backup_asset)
        .with_context(|| format!("failed to remove {}", layout.backup_asset.display()))
        .context("Error restoring app.asar")?;

    log_line(ctx, "Original app.asar restored");
    Ok(())
}

/// Copies `source` to `destination` through a sibling `.part` file.
fn copy_into_place(source: &Path, destination: &Path) -> Result<()> {
    let mut part_name = destination
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    part_name.push(".part");
    let part = destination.with_file_name(part_name);

    fs::copy(source, &part).with_context(|| {
        format!("failed to copy {} -> {}", source.display(), part.display())
    })?;
    if destination.exists() {
        fs::remove_file(destination)
            .with_context(|| format!("failed to replace {}", destination.display()))?;
    }
    fs::rename(&part, destination)
        .with_context(|| format!("failed to move {} into place", destination.display()))?;
    Ok(())
}
