//! Step implementations and shared exports for the pipeline.

#[path = "actions_asar.rs"]
mod actions_asar;
#[path = "actions_download.rs"]
mod actions_download;
#[path = "actions_extract.rs"]
mod actions_extract;
#[path = "actions_install.rs"]
mod actions_install;
#[path = "actions_plan.rs"]
mod actions_plan;
#[path = "actions_process.rs"]
mod actions_process;
#[path = "actions_setup.rs"]
mod actions_setup;
#[path = "actions_state.rs"]
mod actions_state;

pub use actions_download::validate_zip_bytes;
pub use actions_extract::{extract_archive, MAX_ZIP_ENTRY_SIZE};
pub use actions_install::copy_dir_recursive;
pub use actions_plan::{build_plan, run_step, StepRunner, SystemSteps};
pub use actions_state::StepContext;

pub(super) use actions_asar::{backup_original, restore_original};
pub(super) use actions_download::download_payload;
pub(super) use actions_extract::extract_payload;
pub(super) use actions_install::{install_payload, uninstall_existing};
pub(super) use actions_process::{kill_process, log_line, post_install_sign};
pub(super) use actions_setup::setup;
