//! Time source
//!
//! Scheduling and plugin estimations read the current time through
//! [`TimeProvider`] so tests can drive the engine on a virtual clock.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Supplies the current time
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually stepped clock for tests and simulations
#[derive(Debug)]
pub struct VirtualClock {
    start: DateTime<Utc>,
    current: Mutex<DateTime<Utc>>,
}

impl VirtualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward by `delta`
    pub fn step(&self, delta: TimeDelta) -> Result<()> {
        if delta <= TimeDelta::zero() {
            return Err(Error::InvalidTimeStep(format!(
                "{}s is not a positive step",
                delta.num_seconds()
            )));
        }
        *self.current.lock() += delta;
        Ok(())
    }

    /// Return to the start instant
    pub fn reset(&self) {
        *self.current.lock() = self.start;
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }
}

impl TimeProvider for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}
