//! Single-flight pipeline engine.
//!
//! One `InstallManager` owns the run state for a process. Rejected calls leave
//! the state untouched, publish a global error, and return the same error to
//! the caller. Runs execute on a worker thread; observers follow along through
//! the notification sink or by polling `snapshot`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use lunapatch_core::{
    InstallInfo, Options, OptionsError, OptionsRequest, ProgressEvent, RunSnapshot, Step,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::actions::{build_plan, StepRunner};
use crate::delay::{NoDelay, StepDelay};
use crate::events::NotificationSink;

const WORKER_NAME: &str = "lunapatch-run";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManagerError {
    #[error("Installation process is already running.")]
    AlreadyRunning,
    #[error("Invalid options: {0}")]
    InvalidOptions(#[from] OptionsError),
    #[error("Options are not set.")]
    OptionsMissing,
    #[error("Install steps are not generated or options missing.")]
    StepsMissing,
    #[error("Install steps do not match the current options; generate steps again.")]
    StaleSteps,
    #[error("Failed to start the installer worker: {0}")]
    Spawn(String),
}

#[derive(Debug, Default)]
struct RunState {
    is_running: bool,
    options: Option<Options>,
    steps: Vec<Step>,
    current_step_index: usize,
    current_step: Option<Step>,
}

impl RunState {
    fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            is_running: self.is_running,
            options: self.options.clone(),
            current_step: self.current_step,
            current_step_index: self.current_step_index,
            steps: self.steps.clone(),
        }
    }
}

#[derive(Clone)]
pub struct InstallManager {
    state: Arc<Mutex<RunState>>,
    sink: Arc<dyn NotificationSink>,
    runner: Arc<dyn StepRunner>,
    delay: Arc<dyn StepDelay>,
}

impl InstallManager {
    pub fn new(sink: Arc<dyn NotificationSink>, runner: Arc<dyn StepRunner>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RunState::default())),
            sink,
            runner,
            delay: Arc::new(NoDelay),
        }
    }

    pub fn with_delay(mut self, delay: Arc<dyn StepDelay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_options(&self, request: OptionsRequest) -> Result<Options, ManagerError> {
        let mut state = self.lock();
        if state.is_running {
            return Err(self.reject(ManagerError::AlreadyRunning, "setOptions"));
        }
        let options = request
            .validate()
            .map_err(|err| self.reject(err.into(), "setOptions"))?;

        info!(action = %options.action, "options accepted");
        state.options = Some(options.clone());
        self.sink
            .publish(ProgressEvent::global_log("Options set successfully."));
        Ok(options)
    }

    pub fn generate_steps(&self) -> Result<Vec<Step>, ManagerError> {
        let mut state = self.lock();
        if state.is_running {
            return Err(self.reject(ManagerError::AlreadyRunning, "generateSteps"));
        }
        let Some(options) = state.options.as_ref() else {
            return Err(self.reject(ManagerError::OptionsMissing, "generateSteps"));
        };

        let steps = build_plan(options.action);
        state.current_step_index = 0;
        state.current_step = steps.first().copied();
        state.steps = steps.clone();
        self.sink
            .publish(ProgressEvent::global_log("Install steps generated successfully."));
        Ok(steps)
    }

    /// Starts the generated plan on a worker thread and returns immediately.
    pub fn start(&self) -> Result<(), ManagerError> {
        let mut state = self.lock();
        if state.is_running {
            return Err(self.reject(ManagerError::AlreadyRunning, "start"));
        }
        let options = match state.options.clone() {
            Some(options) if !state.steps.is_empty() => options,
            _ => return Err(self.reject(ManagerError::StepsMissing, "start")),
        };
        if state.steps != build_plan(options.action) {
            return Err(self.reject(ManagerError::StaleSteps, "start"));
        }

        let steps = state.steps.clone();
        // A plan may be started again after a finished or failed run.
        state.current_step_index = 0;
        state.current_step = steps.first().copied();
        state.is_running = true;
        info!(action = %options.action, steps = steps.len(), "installation started");
        self.sink
            .publish(ProgressEvent::InstallationStart(InstallInfo {
                steps: steps.clone(),
                current_step: state.current_step,
                current_step_index: state.current_step_index,
                action: options.action,
            }));
        self.sink
            .publish(ProgressEvent::global_log("Installation process started."));
        drop(state);

        let worker = self.clone();
        let spawned = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || worker.execute(&options, &steps));
        if let Err(err) = spawned {
            return Err(self.abort_start(err.to_string()));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.lock().snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running
    }

    pub fn current_step(&self) -> Option<Step> {
        self.lock().current_step
    }

    pub fn current_step_index(&self) -> usize {
        self.lock().current_step_index
    }

    pub fn steps(&self) -> Vec<Step> {
        self.lock().steps.clone()
    }

    pub fn options(&self) -> Option<Options> {
        self.lock().options.clone()
    }

    fn execute(&self, options: &Options, steps: &[Step]) {
        for (index, step) in steps.iter().copied().enumerate() {
            {
                let mut state = self.lock();
                state.current_step_index = index;
                state.current_step = Some(step);
                self.sink.publish(ProgressEvent::StepUpdate(step));
            }
            info!(step = step.id(), index, "running step");

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.runner.run(step, options, self.sink.as_ref())
            }));
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(format!("{} step failed: {}", step.id(), err)),
                Err(payload) => Some(format!(
                    "{} step panicked: {}",
                    step.id(),
                    panic_message(payload.as_ref())
                )),
            };
            if failure.is_some() {
                self.finish(failure);
                return;
            }

            if index + 1 < steps.len() {
                self.delay.pause();
            }
        }
        self.finish(None);
    }

    /// Clears the running flag and publishes the terminal event under the lock,
    /// so a snapshot taken after the event never reports a live run.
    fn finish(&self, failure: Option<String>) {
        let mut state = self.lock();
        state.is_running = false;
        match failure {
            None => {
                state.current_step_index = state.steps.len();
                info!("installation completed");
                self.sink.publish(ProgressEvent::global_log(
                    "Installation process completed successfully.",
                ));
                self.sink.publish(ProgressEvent::InstallationComplete);
            }
            Some(reason) => {
                error!(reason = %reason, "installation failed");
                self.sink.publish(ProgressEvent::InstallationError(reason));
            }
        }
    }

    /// Reports a worker that never started; the terminal event goes out last.
    fn abort_start(&self, reason: String) -> ManagerError {
        let err = self.reject(ManagerError::Spawn(reason), "start");
        self.finish(Some(err.to_string()));
        err
    }

    fn reject(&self, err: ManagerError, origin: &str) -> ManagerError {
        warn!(origin, error = %err, "request rejected");
        self.sink.publish(ProgressEvent::global_error(
            err.to_string(),
            format!("InstallManager::{}", origin),
        ));
        err
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
