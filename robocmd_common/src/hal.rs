//! Robot-side collaborators consumed by the scheduler.
//!
//! The scheduler never talks to hardware. It only needs two answers each
//! tick, and both come through the traits in this module:
//!
//! - [`Clock`]: a monotonic timestamp in seconds, used for command
//!   timeouts and `time_since_initialized`.
//! - [`RobotState`]: whether the robot is currently disabled, used to
//!   auto-cancel commands that may not run while disabled.
//!
//! Implementations must be cheap and non-blocking: both are polled from
//! inside `Scheduler::run()`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic time source in seconds.
pub trait Clock: Send + Sync {
    /// Current timestamp [s]. Must never go backwards.
    fn now(&self) -> f64;
}

/// Driver-station view of the robot mode.
pub trait RobotState: Send + Sync {
    /// True while the robot is disabled.
    fn is_disabled(&self) -> bool;

    /// True while the robot is enabled.
    fn is_enabled(&self) -> bool {
        !self.is_disabled()
    }
}

/// Wall-clock backed monotonic clock, zeroed at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose zero is "now".
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually advanced clock for simulation and tests.
///
/// Stores the time as `f64` bits so it can be shared behind an `Arc`
/// and advanced from the test body while the scheduler holds a handle.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    /// Create a clock at `t = 0`.
    pub const fn new() -> Self {
        Self {
            bits: AtomicU64::new(0),
        }
    }

    /// Jump to an absolute time [s]. Earlier times are ignored.
    pub fn set(&self, seconds: f64) {
        if seconds >= self.now() {
            self.bits.store(seconds.to_bits(), Ordering::Release);
        }
    }

    /// Advance by `seconds` (negative values are ignored).
    pub fn advance(&self, seconds: f64) {
        if seconds > 0.0 {
            self.set(self.now() + seconds);
        }
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Robot state toggled in software (simulation, tests, practice bench).
#[derive(Debug)]
pub struct SimRobotState {
    disabled: AtomicBool,
}

impl SimRobotState {
    /// Start enabled.
    pub const fn enabled() -> Self {
        Self {
            disabled: AtomicBool::new(false),
        }
    }

    /// Start disabled.
    pub const fn disabled() -> Self {
        Self {
            disabled: AtomicBool::new(true),
        }
    }

    /// Flip the disabled flag.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }
}

impl Default for SimRobotState {
    fn default() -> Self {
        Self::enabled()
    }
}

impl RobotState for SimRobotState {
    #[inline]
    fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }
}
