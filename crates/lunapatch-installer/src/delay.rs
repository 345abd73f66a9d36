//! Pause strategies applied between steps so progress stays readable.

use std::thread;
use std::time::Duration;

use rand::Rng;

pub trait StepDelay: Send + Sync {
    fn pause(&self);
}

/// Sleeps for a uniformly random duration inside `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct JitterDelay {
    min: Duration,
    max: Duration,
}

impl JitterDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

impl StepDelay for JitterDelay {
    fn pause(&self) {
        thread::sleep(self.sample());
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl StepDelay for NoDelay {
    fn pause(&self) {}
}
