//! # robocmd Scheduler
//!
//! Cooperative, requirement-arbitrating command scheduler for robot control
//! loops. Commands declare the subsystems they need; the scheduler runs at
//! most one command per subsystem, interrupts conflicting work when allowed,
//! and falls back to each subsystem's default command when it goes idle.
//!
//! # Module Structure
//!
//! - [`command`] - Command handles, hooks, conditionals, stock commands
//! - [`group`] - Sequential / parallel command groups
//! - [`subsystem`] - Subsystems and default commands
//! - [`scheduler`] - Command store, active set and the tick algorithm
//! - [`button`] - Edge-triggered button bindings
//! - [`error`] - Error taxonomy and the non-fatal reporter
//! - [`robot_loop`] - Fixed-period loop driving the scheduler
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use robocmd_common::prelude::*;
//! use robocmd_scheduler::prelude::*;
//!
//! let clock = Arc::new(ManualClock::new());
//! let mut sched = Scheduler::new(
//!     &SchedulerConfig::default(),
//!     clock.clone(),
//!     Arc::new(SimRobotState::enabled()),
//! );
//! let elevator = sched.register_subsystem("Elevator");
//! let raise = sched.create_wait("Raise", 0.5).unwrap();
//! sched.requires(raise, elevator).unwrap();
//!
//! sched.start(raise).unwrap();
//! sched.run();
//! assert_eq!(sched.current_command(elevator), Some(raise));
//! ```

pub mod button;
pub mod command;
pub mod error;
pub mod group;
pub mod robot_loop;
pub mod scheduler;
pub mod subsystem;
mod telemetry;

/// Common re-exports.
pub mod prelude {
    pub use crate::button::{ButtonAction, Trigger};
    pub use crate::command::builder::CommandBuilder;
    pub use crate::command::builtin::{
        InstantCommand, PrintCommand, TimedCommand, WaitCommand, WaitUntilCommand,
    };
    pub use crate::command::{
        Command, CommandContext, CommandFlags, CommandId, NO_TIMEOUT, Noop, Runnable,
    };
    pub use crate::error::{CommandError, ErrorKind, ErrorReporter};
    pub use crate::group::{CommandGroup, EntryState, GroupEntry};
    pub use crate::robot_loop::{CycleStats, RobotLoop};
    pub use crate::scheduler::{AdditionHandle, Scheduler};
    pub use crate::subsystem::{Passive, Subsystem, SubsystemBehavior, SubsystemId};
}
