//! TidaLuna install pipeline: engine, step implementations, and event sinks.

mod actions;
mod delay;
mod events;
mod manager;
mod paths;

#[cfg(test)]
mod test_support;

pub use actions::{
    build_plan, copy_dir_recursive, extract_archive, run_step, validate_zip_bytes, StepContext,
    StepRunner, SystemSteps, MAX_ZIP_ENTRY_SIZE,
};
pub use delay::{JitterDelay, NoDelay, StepDelay};
pub use events::{BroadcastSink, NotificationSink, RecordingSink};
pub use manager::{InstallManager, ManagerError};
pub use paths::{format_with_home, InstallPaths};
