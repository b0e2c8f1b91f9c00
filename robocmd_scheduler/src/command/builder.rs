//! Fluent construction of commands.
//!
//! ```rust
//! use std::sync::Arc;
//! use robocmd_common::prelude::*;
//! use robocmd_scheduler::prelude::*;
//!
//! let mut sched = Scheduler::new(
//!     &SchedulerConfig::default(),
//!     Arc::new(ManualClock::new()),
//!     Arc::new(SimRobotState::enabled()),
//! );
//! let drive = sched.register_subsystem("Drivetrain");
//! let id = sched
//!     .new_command("HoldPosition", WaitCommand)
//!     .requires(drive)
//!     .timeout(2.5)
//!     .interruptible(false)
//!     .finish()
//!     .unwrap();
//! assert_eq!(sched.command(id).unwrap().timeout(), Some(2.5));
//! ```

use super::{CommandId, Runnable};
use crate::error::CommandError;
use crate::scheduler::Scheduler;
use crate::subsystem::SubsystemId;

/// Builder returned by [`Scheduler::new_command`].
///
/// The command exists as soon as the builder does; each setter forwards to
/// the matching scheduler call and the first failure is returned by
/// [`finish`](Self::finish).
#[must_use = "call finish() to obtain the command id"]
pub struct CommandBuilder<'a> {
    scheduler: &'a mut Scheduler,
    id: CommandId,
    error: Option<CommandError>,
}

impl Scheduler {
    /// Start building a command with user hooks.
    pub fn new_command(&mut self, name: impl Into<String>, hooks: impl Runnable + 'static) -> CommandBuilder<'_> {
        let id = self.create_command(name, hooks);
        CommandBuilder {
            scheduler: self,
            id,
            error: None,
        }
    }
}

impl CommandBuilder<'_> {
    fn apply(mut self, f: impl FnOnce(&mut Scheduler, CommandId) -> Result<(), CommandError>) -> Self {
        if self.error.is_none()
            && let Err(err) = f(&mut *self.scheduler, self.id)
        {
            self.error = Some(err);
        }
        self
    }

    /// Require `subsystem`.
    pub fn requires(self, subsystem: SubsystemId) -> Self {
        self.apply(|sched, id| sched.requires(id, subsystem))
    }

    /// Set the timeout in seconds.
    pub fn timeout(self, seconds: f64) -> Self {
        self.apply(|sched, id| sched.set_timeout(id, seconds))
    }

    /// Set whether the command can be displaced.
    pub fn interruptible(self, interruptible: bool) -> Self {
        self.apply(|sched, id| sched.set_interruptible(id, interruptible))
    }

    /// Set whether the command keeps running while disabled.
    pub fn run_when_disabled(self, run: bool) -> Self {
        self.apply(|sched, id| sched.set_run_when_disabled(id, run))
    }

    /// Finish building.
    pub fn finish(self) -> Result<CommandId, CommandError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.id),
        }
    }
}
