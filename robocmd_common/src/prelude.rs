//! Prelude module for common re-exports.
//!
//! ```rust
//! use robocmd_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, LogLevel, RobocmdConfig, RobotLoopConfig, SchedulerConfig,
    SharedConfig, DEFAULT_PERIOD_MS,
};

// ─── Collaborators ──────────────────────────────────────────────────
pub use crate::hal::{Clock, ManualClock, MonotonicClock, RobotState, SimRobotState};

// ─── Telemetry ──────────────────────────────────────────────────────
pub use crate::telemetry::{MemoryTable, TableValue, TelemetrySink};
