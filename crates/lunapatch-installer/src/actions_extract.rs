//! Payload extraction with path and size guards.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use zip::ZipArchive;

use crate::paths::format_with_home;

use super::{log_line, StepContext};

/// Largest single entry accepted from a payload archive.
pub const MAX_ZIP_ENTRY_SIZE: u64 = 100 * 1024 * 1024;

pub fn extract_payload(ctx: &StepContext) -> Result<()> {
    let extract_dir = &ctx.paths.extract_dir;
    if extract_dir.exists() {
        log_line(
            ctx,
            format!("Cleaning {}", format_with_home(extract_dir)),
        );
        fs::remove_dir_all(extract_dir)
            .with_context(|| format!("failed to clean {}", extract_dir.display()))?;
    }
    fs::create_dir_all(extract_dir)
        .with_context(|| format!("failed to create {}", extract_dir.display()))?;

    log_line(ctx, "Extracting TidaLuna");
    let archive = File::open(&ctx.paths.payload_zip)
        .with_context(|| format!("failed to open {}", ctx.paths.payload_zip.display()))
        .context("Error extracting TidaLuna")?;
    let count = extract_archive(archive, extract_dir).context("Error extracting TidaLuna")?;

    log_line(
        ctx,
        format!(
            "TidaLuna extracted to {} ({} entries)",
            format_with_home(extract_dir),
            count
        ),
    );
    Ok(())
}

/// Unpacks every entry of `reader` under `destination`, returning the entry count.
pub fn extract_archive<R: Read + Seek>(reader: R, destination: &Path) -> Result<usize> {
    let mut archive = ZipArchive::new(reader).context("payload is not a valid ZIP archive")?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read archive entry {}", index))?;
        let name = entry.name().to_string();
        let Some(out_path) = safe_zip_join(destination, &name) else {
            bail!("archive entry escapes the extraction directory: {}", name);
        };
        if entry.size() > MAX_ZIP_ENTRY_SIZE {
            bail!(
                "archive entry {} is {} bytes, limit is {}",
                name,
                entry.size(),
                MAX_ZIP_ENTRY_SIZE
            );
        }

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("failed to create {}", out_path.display()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut out = File::create(&out_path)
            .with_context(|| format!("failed to create {}", out_path.display()))?;
        let copied = io::copy(&mut entry.by_ref().take(MAX_ZIP_ENTRY_SIZE + 1), &mut out)
            .with_context(|| format!("failed to extract {}", name))?;
        if copied > MAX_ZIP_ENTRY_SIZE {
            return Err(anyhow!("archive entry {} exceeds {} bytes", name, MAX_ZIP_ENTRY_SIZE));
        }
    }

    Ok(archive.len())
}

fn safe_zip_join(base: &Path, entry_name: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(entry_name).components() {
        match component {
            Component::Normal(segment) => relative.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(base.join(relative))
}
