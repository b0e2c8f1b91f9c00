//! Error taxonomy and the non-fatal error reporter.
//!
//! Nothing in the scheduler unwinds. Every illegal call is turned into a
//! [`CommandError`], handed to the scheduler's [`ErrorReporter`] (structured
//! `tracing` warning + last-error slot), and the call becomes a no-op.
//! Setters also return the error so callers that care can inspect it.

use thiserror::Error;
use tracing::warn;

use crate::command::CommandId;
use crate::subsystem::SubsystemId;

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Requirement, timeout or membership change after the command was locked.
    LockedMutation,
    /// Starting/canceling a grouped command directly, nesting a command twice, etc.
    IllegalTopology,
    /// Command handle does not refer to a live command.
    UnknownCommand,
    /// Subsystem handle does not refer to a registered subsystem.
    UnknownSubsystem,
    /// Negative timeout (other than the "no timeout" sentinel).
    OutOfRange,
    /// Command start attempted from inside an admission's cancellation cascade.
    Reentrancy,
    /// Default command does not require its subsystem.
    MissingRequirement,
}

/// Errors raised by scheduler, command, group and subsystem operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// Mutation after lock.
    #[error("{command}: can not {action} after being started or being added to a command group")]
    LockedMutation {
        /// Offending command.
        command: CommandId,
        /// What was attempted.
        action: &'static str,
    },

    /// Illegal use of group topology.
    #[error("{command}: {reason}")]
    IllegalTopology {
        /// Offending command.
        command: CommandId,
        /// Why the call was rejected.
        reason: &'static str,
    },

    /// Unknown command handle.
    #[error("unknown command {0}")]
    UnknownCommand(CommandId),

    /// Unknown subsystem handle.
    #[error("unknown subsystem {0}")]
    UnknownSubsystem(SubsystemId),

    /// Negative timeout.
    #[error("{command}: timeout must not be negative, given {seconds}")]
    NegativeTimeout {
        /// Offending command (or group for entry timeouts).
        command: CommandId,
        /// Rejected value [s].
        seconds: f64,
    },

    /// Start from a cancel path.
    #[error("{command}: can not start a command from a cancel method")]
    Reentrancy {
        /// Command whose start was refused.
        command: CommandId,
    },

    /// Default command without the matching requirement.
    #[error("{command} does not require {subsystem}, it can not be its default command")]
    MissingRequirement {
        /// Rejected default command.
        command: CommandId,
        /// Subsystem it was offered to.
        subsystem: SubsystemId,
    },
}

impl CommandError {
    /// Classification of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            CommandError::LockedMutation { .. } => ErrorKind::LockedMutation,
            CommandError::IllegalTopology { .. } => ErrorKind::IllegalTopology,
            CommandError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            CommandError::UnknownSubsystem(_) => ErrorKind::UnknownSubsystem,
            CommandError::NegativeTimeout { .. } => ErrorKind::OutOfRange,
            CommandError::Reentrancy { .. } => ErrorKind::Reentrancy,
            CommandError::MissingRequirement { .. } => ErrorKind::MissingRequirement,
        }
    }

    /// Command the error is about, if any.
    pub const fn command(&self) -> Option<CommandId> {
        match self {
            CommandError::LockedMutation { command, .. }
            | CommandError::IllegalTopology { command, .. }
            | CommandError::NegativeTimeout { command, .. }
            | CommandError::Reentrancy { command }
            | CommandError::MissingRequirement { command, .. } => Some(*command),
            CommandError::UnknownCommand(command) => Some(*command),
            CommandError::UnknownSubsystem(_) => None,
        }
    }
}

/// Non-throwing error sink with a global "last error" slot.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    last: Option<CommandError>,
    count: u64,
}

impl ErrorReporter {
    /// Create an empty reporter.
    pub const fn new() -> Self {
        Self {
            last: None,
            count: 0,
        }
    }

    /// Record `err` and hand it back so the caller can return it.
    pub fn report(&mut self, err: CommandError) -> CommandError {
        warn!(
            kind = ?err.kind(),
            command = err.command().map(CommandId::raw),
            "{err}"
        );
        self.count += 1;
        self.last = Some(err.clone());
        err
    }

    /// Most recently reported error.
    #[inline]
    pub fn last_error(&self) -> Option<&CommandError> {
        self.last.as_ref()
    }

    /// Number of errors reported since creation or the last [`clear`](Self::clear).
    #[inline]
    pub const fn error_count(&self) -> u64 {
        self.count
    }

    /// Forget the last error and reset the count.
    pub fn clear(&mut self) {
        self.last = None;
        self.count = 0;
    }
}
