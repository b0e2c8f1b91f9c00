//! Commands: handles, flags, user hooks and the per-command record.
//!
//! A command is owned by the [`Scheduler`](crate::scheduler::Scheduler)'s
//! command store and addressed everywhere else by its [`CommandId`]. User
//! behavior lives behind the [`Runnable`] trait; framework behavior (groups,
//! conditionals, start/wait helpers) is selected by the command's kind.
//!
//! # Lifecycle
//!
//! ```text
//!  create ─► start() ─► queued ─► admitted (running) ─► initialize ─► execute…
//!                                     │                                 │
//!                                     └──── cancel / interrupt ◄────────┤
//!                                                                       ▼
//!                                                        end(interrupted) ─► completed
//! ```
//!
//! Requirement and timeout mutation is only legal until the command is
//! locked, which happens on its first start or when it joins a group.

pub mod builder;
pub mod builtin;
pub mod conditional;
mod lifecycle;

use bitflags::bitflags;
use std::fmt;

use crate::group::CommandGroup;
use crate::subsystem::SubsystemId;
use conditional::Conditional;

/// Timeout sentinel meaning "no timeout".
pub const NO_TIMEOUT: f64 = -1.0;

// ─── Handles ────────────────────────────────────────────────────────

/// Stable handle for a command in the scheduler's store.
///
/// Ids are never reused, not even after
/// [`Scheduler::reset_all`](crate::scheduler::Scheduler::reset_all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u32);

impl CommandId {
    /// Wrap a raw id (as published in telemetry).
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric id.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command #{}", self.0)
    }
}

// ─── Flags ──────────────────────────────────────────────────────────

bitflags! {
    /// Command state and option bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandFlags: u8 {
        /// May be displaced by a conflicting command.
        const INTERRUPTIBLE     = 0b0000_0001;
        /// Keeps running while the robot is disabled.
        const RUN_WHEN_DISABLED = 0b0000_0010;
        /// Requirements, timeout and membership are frozen.
        const LOCKED            = 0b0000_0100;
        /// `initialize` has run for the current activation.
        const INITIALIZED       = 0b0000_1000;
        /// Admitted and not yet removed.
        const RUNNING           = 0b0001_0000;
        /// Asked to stop; observed on the next run.
        const CANCELED          = 0b0010_0000;
        /// Last activation finished (normally or not).
        const COMPLETED         = 0b0100_0000;
    }
}

impl Default for CommandFlags {
    fn default() -> Self {
        CommandFlags::INTERRUPTIBLE
    }
}

// ─── User hooks ─────────────────────────────────────────────────────

/// User-supplied command behavior.
///
/// Every hook is optional except [`is_finished`](Runnable::is_finished).
/// Hooks receive a [`CommandContext`] carrying the command's own timing and
/// a way to request other commands to start.
pub trait Runnable {
    /// Called once per activation, on the first tick the command runs.
    fn initialize(&mut self, _ctx: &mut CommandContext<'_>) {}

    /// Called every tick the command runs, after `initialize` on the first.
    fn execute(&mut self, _ctx: &mut CommandContext<'_>) {}

    /// Polled after `execute`; `true` ends the activation.
    fn is_finished(&mut self, ctx: &CommandContext<'_>) -> bool;

    /// Called once when an initialized activation ends.
    ///
    /// `interrupted` is `true` when the command was canceled or displaced.
    fn end(&mut self, _interrupted: bool, _ctx: &mut CommandContext<'_>) {}
}

/// Hooks for commands whose behavior is entirely framework-defined.
#[derive(Debug, Default, Clone, Copy)]
pub struct Noop;

impl Runnable for Noop {
    fn is_finished(&mut self, _ctx: &CommandContext<'_>) -> bool {
        false
    }
}

/// View handed to [`Runnable`] hooks.
pub struct CommandContext<'a> {
    id: CommandId,
    name: &'a str,
    now: f64,
    start_time: Option<f64>,
    timeout: Option<f64>,
    start_requests: Vec<CommandId>,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(
        id: CommandId,
        name: &'a str,
        now: f64,
        start_time: Option<f64>,
        timeout: Option<f64>,
    ) -> Self {
        Self {
            id,
            name,
            now,
            start_time,
            timeout,
            start_requests: Vec::new(),
        }
    }

    /// Handle of the running command.
    #[inline]
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Name of the running command.
    #[inline]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Current clock reading [s].
    #[inline]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Seconds since this activation initialized, `0.0` before that.
    pub fn time_since_initialized(&self) -> f64 {
        self.start_time.map_or(0.0, |start| self.now - start)
    }

    /// Configured timeout [s], if any.
    #[inline]
    pub fn timeout(&self) -> Option<f64> {
        self.timeout
    }

    /// `true` once a configured timeout has elapsed.
    pub fn is_timed_out(&self) -> bool {
        self.timeout
            .is_some_and(|timeout| self.time_since_initialized() >= timeout)
    }

    /// Ask the scheduler to start `command` once this hook returns.
    ///
    /// Requests made while the scheduler is resolving an admission are
    /// refused with a reentrancy error.
    pub fn start(&mut self, command: CommandId) {
        self.start_requests.push(command);
    }

    pub(crate) fn into_start_requests(self) -> Vec<CommandId> {
        self.start_requests
    }
}

// ─── Record ─────────────────────────────────────────────────────────

/// Framework behavior selector.
pub(crate) enum CommandKind {
    /// Finishes when its hooks say so.
    Basic,
    /// Sequential/parallel composition.
    Group(CommandGroup),
    /// Chooses one of two commands at initialization.
    Conditional(Conditional),
    /// Starts another command, then finishes immediately.
    Start { target: CommandId },
    /// Finishes once its parent group has no parallel children left.
    WaitForChildren,
}

impl CommandKind {
    pub(crate) const fn label(&self) -> &'static str {
        match self {
            CommandKind::Basic => "basic",
            CommandKind::Group(_) => "group",
            CommandKind::Conditional(_) => "conditional",
            CommandKind::Start { .. } => "start",
            CommandKind::WaitForChildren => "wait-for-children",
        }
    }
}

/// A command in the scheduler's store.
pub struct Command {
    pub(crate) id: CommandId,
    pub(crate) name: String,
    pub(crate) timeout: Option<f64>,
    pub(crate) requirements: Vec<SubsystemId>,
    pub(crate) flags: CommandFlags,
    pub(crate) parent: Option<CommandId>,
    pub(crate) start_time: Option<f64>,
    pub(crate) hooks: Box<dyn Runnable>,
    pub(crate) kind: CommandKind,
}

impl Command {
    pub(crate) fn new(
        id: CommandId,
        name: String,
        hooks: Box<dyn Runnable>,
        kind: CommandKind,
    ) -> Self {
        Self {
            id,
            name,
            timeout: None,
            requirements: Vec::new(),
            flags: CommandFlags::default(),
            parent: None,
            start_time: None,
            hooks,
            kind,
        }
    }

    /// Handle of this command.
    #[inline]
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Display name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured timeout [s], if any.
    #[inline]
    pub fn timeout(&self) -> Option<f64> {
        self.timeout
    }

    /// Required subsystems, in the order they were added.
    #[inline]
    pub fn requirements(&self) -> &[SubsystemId] {
        &self.requirements
    }

    /// `true` if `subsystem` is among the requirements.
    pub fn does_require(&self, subsystem: SubsystemId) -> bool {
        self.requirements.contains(&subsystem)
    }

    /// Raw state/option bits.
    #[inline]
    pub fn flags(&self) -> CommandFlags {
        self.flags
    }

    /// Owning group, if this command is a group member.
    #[inline]
    pub fn group(&self) -> Option<CommandId> {
        self.parent
    }

    /// `true` when owned by a group.
    #[inline]
    pub fn is_parented(&self) -> bool {
        self.parent.is_some()
    }

    /// Admitted and not yet removed.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.flags.contains(CommandFlags::RUNNING)
    }

    /// Cancel requested and not yet observed.
    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.flags.contains(CommandFlags::CANCELED)
    }

    /// Last activation has ended.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.flags.contains(CommandFlags::COMPLETED)
    }

    /// `initialize` has run for the current activation.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.flags.contains(CommandFlags::INITIALIZED)
    }

    /// Requirements and timeout are frozen.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.flags.contains(CommandFlags::LOCKED)
    }

    /// The command's own interruptible flag.
    ///
    /// Groups additionally depend on their members; use
    /// [`Scheduler::is_interruptible`](crate::scheduler::Scheduler::is_interruptible)
    /// for the effective value.
    #[inline]
    pub fn own_interruptible(&self) -> bool {
        self.flags.contains(CommandFlags::INTERRUPTIBLE)
    }

    /// Keeps running while the robot is disabled.
    #[inline]
    pub fn will_run_when_disabled(&self) -> bool {
        self.flags.contains(CommandFlags::RUN_WHEN_DISABLED)
    }

    /// Seconds since this activation initialized, `0.0` before that.
    pub fn time_since_initialized(&self, now: f64) -> f64 {
        self.start_time.map_or(0.0, |start| now - start)
    }

    /// `true` once a configured timeout has elapsed.
    pub fn is_timed_out(&self, now: f64) -> bool {
        self.timeout
            .is_some_and(|timeout| self.time_since_initialized(now) >= timeout)
    }

    /// `true` for command groups.
    pub fn is_group(&self) -> bool {
        matches!(self.kind, CommandKind::Group(_))
    }

    pub(crate) fn lock(&mut self) {
        self.flags.insert(CommandFlags::LOCKED);
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind.label())
            .field("flags", &self.flags)
            .field("requirements", &self.requirements)
            .field("parent", &self.parent)
            .finish()
    }
}
