//! TIDAL resource directory discovery and on-disk layout.
//!
//! Resolution never fails loudly: `None` is the only "not found" signal and
//! callers decide whether that matters for their step.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Live packaged asset Electron loads by default.
pub const APP_ASAR: &str = "app.asar";
/// Pristine copy of `app.asar`; its presence marks an installed payload.
pub const ORIGINAL_ASAR: &str = "original.asar";
/// Unpacked app directory Electron falls back to when `app.asar` is absent.
pub const PLUGIN_DIR: &str = "app";

const WINDOWS_VERSION_PREFIX: &str = "app-";
const FLATPAK_APP_ID: &str = "com.mastermindzh.tidal-hifi";

/// Paths derived from one TIDAL resources directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    pub resources_dir: PathBuf,
    pub live_asset: PathBuf,
    pub backup_asset: PathBuf,
    pub plugin_dir: PathBuf,
}

impl TargetLayout {
    pub fn new(resources_dir: impl Into<PathBuf>) -> Self {
        let resources_dir = resources_dir.into();
        Self {
            live_asset: resources_dir.join(APP_ASAR),
            backup_asset: resources_dir.join(ORIGINAL_ASAR),
            plugin_dir: resources_dir.join(PLUGIN_DIR),
            resources_dir,
        }
    }

    /// The backup asset is the durable install marker; in-memory state is not.
    pub fn is_installed(&self) -> bool {
        self.backup_asset.is_file()
    }

    /// True when the directory holds at least one packaged `*.asar` file.
    pub fn has_packaged_asset(&self) -> bool {
        let Ok(entries) = fs::read_dir(&self.resources_dir) else {
            return false;
        };
        entries.filter_map(Result::ok).any(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("asar"))
                .unwrap_or(false)
                && entry.path().is_file()
        })
    }
}

/// Locates the target application's resources directory.
pub trait TargetResolver: Send + Sync {
    fn resolve(&self) -> Option<PathBuf>;
}

/// Resolver backed by the well-known install locations of the current OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl TargetResolver for SystemResolver {
    fn resolve(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME").map(PathBuf::from);
        let resolved = match env::consts::OS {
            "windows" => env::var_os("LOCALAPPDATA")
                .map(PathBuf::from)
                .and_then(|local| latest_versioned_dir(&local.join("TIDAL"))),
            "macos" => first_resources_dir(&macos_candidates(home.as_deref())),
            "linux" => first_resources_dir(&linux_candidates(home.as_deref())),
            _ => None,
        };
        debug!(os = env::consts::OS, resolved = ?resolved, "resolved TIDAL resources");
        resolved
    }
}

/// Resolver that always answers with the same directory (or none).
#[derive(Debug, Clone, Default)]
pub struct FixedResolver(pub Option<PathBuf>);

impl FixedResolver {
    pub fn found(path: impl Into<PathBuf>) -> Self {
        Self(Some(path.into()))
    }

    pub fn not_found() -> Self {
        Self(None)
    }
}

impl TargetResolver for FixedResolver {
    fn resolve(&self) -> Option<PathBuf> {
        self.0.clone()
    }
}

/// A candidate counts only if it looks like an Electron resources directory.
pub fn is_resources_dir(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path.is_dir()
        && (path.join(APP_ASAR).is_file()
            || path.join(ORIGINAL_ASAR).is_file()
            || path.join(PLUGIN_DIR).is_dir())
}

/// Picks the lexicographically-last `app-*` directory under `base` whose
/// `resources` subdirectory qualifies.
pub fn latest_versioned_dir(base: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(base).ok()?;
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with(WINDOWS_VERSION_PREFIX))
        .collect();
    names.sort();

    names
        .into_iter()
        .rev()
        .map(|name| base.join(name).join("resources"))
        .find(|resources| is_resources_dir(resources))
}

fn first_resources_dir(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|candidate| is_resources_dir(candidate))
        .cloned()
}

fn macos_candidates(home: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("/Applications/TIDAL.app/Contents/Resources")];
    if let Some(home) = home {
        candidates.push(home.join("Applications/TIDAL.app/Contents/Resources"));
    }
    candidates
}

fn linux_candidates(home: Option<&Path>) -> Vec<PathBuf> {
    let flatpak_tail = |root: &Path, branch: &str| {
        root.join(FLATPAK_APP_ID)
            .join(branch)
            .join("active/files/lib/tidal-hifi/resources")
    };
    let system_flatpak = Path::new("/var/lib/flatpak/app");

    let mut candidates = vec![
        flatpak_tail(system_flatpak, "current"),
        flatpak_tail(system_flatpak, "x86_64/stable"),
        flatpak_tail(system_flatpak, "x86_64/beta"),
        PathBuf::from("/opt/tidal-hifi/resources"),
        PathBuf::from("/opt/TIDAL/resources"),
        PathBuf::from("/usr/lib/tidal-hifi/resources"),
        PathBuf::from("/usr/lib/TIDAL/resources"),
        PathBuf::from("/usr/share/tidal-hifi/resources"),
        PathBuf::from("/usr/share/TIDAL/resources"),
    ];
    if let Some(home) = home {
        let user_flatpak = home.join(".local/share/flatpak/app");
        candidates.push(flatpak_tail(&user_flatpak, "current"));
        candidates.push(flatpak_tail(&user_flatpak, "x86_64/stable"));
        candidates.push(flatpak_tail(&user_flatpak, "x86_64/beta"));
    }
    candidates
}
