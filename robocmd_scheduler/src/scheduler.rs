//! The scheduler: command store, active set and the per-tick algorithm.
//!
//! One [`Scheduler`] value owns every command, subsystem and button binding
//! of a robot program. Callers drive it by invoking [`Scheduler::run`] once
//! per control period.
//!
//! # Tick
//!
//! 1. Poll button bindings (most recently registered first).
//! 2. Run every subsystem's `periodic` hook.
//! 3. Run each active command once; remove those that report done.
//! 4. Admit queued additions, displacing interruptible holders.
//! 5. Admit default commands for idle subsystems.
//! 6. Publish telemetry and apply dashboard cancel requests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use robocmd_common::config::SchedulerConfig;
use robocmd_common::hal::{Clock, RobotState};
use robocmd_common::telemetry::TelemetrySink;
use tracing::{debug, info, trace};

use crate::button::ButtonBinding;
use crate::command::{Command, CommandFlags, CommandId, CommandKind, NO_TIMEOUT, Runnable};
use crate::error::{CommandError, ErrorReporter};
use crate::subsystem::{Subsystem, SubsystemId};

/// Cloneable, thread-safe handle that queues commands for admission.
///
/// Equivalent to [`Scheduler::add_command`]: no lock or parent checks are
/// applied. Queued ids are deduplicated and admitted on the next tick.
#[derive(Debug, Clone)]
pub struct AdditionHandle {
    tx: Sender<CommandId>,
}

impl AdditionHandle {
    /// Queue `command`. Returns `false` once the scheduler has been dropped.
    pub fn add(&self, command: CommandId) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// Requirement-arbitrating cooperative command scheduler.
pub struct Scheduler {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) robot: Arc<dyn RobotState>,
    pub(crate) enabled: bool,
    pub(crate) commands: HashMap<CommandId, Command>,
    pub(crate) next_command_id: u32,
    pub(crate) subsystems: Vec<Subsystem>,
    pub(crate) next_subsystem_id: u32,
    /// Running top-level commands, iterated in creation order.
    pub(crate) active: BTreeSet<CommandId>,
    additions_tx: Sender<CommandId>,
    additions_rx: Receiver<CommandId>,
    pub(crate) buttons: Vec<ButtonBinding>,
    /// Set while an admission is canceling the holders of its requirements.
    pub(crate) adding: bool,
    pub(crate) running_changed: bool,
    pub(crate) errors: ErrorReporter,
    pub(crate) telemetry: Option<Box<dyn TelemetrySink>>,
    pub(crate) publish: bool,
    ticks: u64,
}

impl Scheduler {
    /// Create a scheduler reading time from `clock` and the disabled state
    /// from `robot`.
    pub fn new(config: &SchedulerConfig, clock: Arc<dyn Clock>, robot: Arc<dyn RobotState>) -> Self {
        let (additions_tx, additions_rx) = mpsc::channel();
        Self {
            clock,
            robot,
            enabled: config.enabled,
            commands: HashMap::new(),
            next_command_id: 1,
            subsystems: Vec::new(),
            next_subsystem_id: 1,
            active: BTreeSet::new(),
            additions_tx,
            additions_rx,
            buttons: Vec::new(),
            adding: false,
            running_changed: true,
            errors: ErrorReporter::new(),
            telemetry: None,
            publish: config.publish_telemetry,
            ticks: 0,
        }
    }

    /// Attach a telemetry sink. Everything registered so far is published.
    pub fn with_telemetry(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.telemetry = Some(Box::new(sink));
        self.publish_everything();
        self
    }

    // ─── Command store ──────────────────────────────────────────────

    /// Create a command with user hooks.
    pub fn create_command(&mut self, name: impl Into<String>, hooks: impl Runnable + 'static) -> CommandId {
        self.insert_command(name.into(), Box::new(hooks), CommandKind::Basic)
    }

    pub(crate) fn insert_command(
        &mut self,
        name: String,
        hooks: Box<dyn Runnable>,
        kind: CommandKind,
    ) -> CommandId {
        let id = CommandId::from_raw(self.next_command_id);
        self.next_command_id += 1;
        trace!(command = %name, id = id.raw(), kind = kind.label(), "created");
        self.commands.insert(id, Command::new(id, name, hooks, kind));
        self.publish_command(id);
        id
    }

    /// Command record, if `id` is live.
    pub fn command(&self, id: CommandId) -> Option<&Command> {
        self.commands.get(&id)
    }

    /// Number of commands in the store.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    /// Add `subsystem` to the requirements of `command`.
    ///
    /// Rejected once the command is locked.
    pub fn requires(&mut self, command: CommandId, subsystem: SubsystemId) -> Result<(), CommandError> {
        if self.subsystem(subsystem).is_none() {
            return Err(self.report(CommandError::UnknownSubsystem(subsystem)));
        }
        let Some(cmd) = self.commands.get_mut(&command) else {
            return Err(self.report(CommandError::UnknownCommand(command)));
        };
        if cmd.is_locked() {
            return Err(self.errors.report(CommandError::LockedMutation {
                command,
                action: "add new requirement",
            }));
        }
        if !cmd.requirements.contains(&subsystem) {
            cmd.requirements.push(subsystem);
        }
        Ok(())
    }

    /// Set the timeout of `command` in seconds; [`NO_TIMEOUT`] clears it.
    pub fn set_timeout(&mut self, command: CommandId, seconds: f64) -> Result<(), CommandError> {
        let Some(cmd) = self.commands.get_mut(&command) else {
            return Err(self.report(CommandError::UnknownCommand(command)));
        };
        if cmd.is_locked() {
            return Err(self.errors.report(CommandError::LockedMutation {
                command,
                action: "set timeout",
            }));
        }
        if seconds == NO_TIMEOUT {
            cmd.timeout = None;
        } else if seconds >= 0.0 {
            cmd.timeout = Some(seconds);
        } else {
            return Err(self.errors.report(CommandError::NegativeTimeout { command, seconds }));
        }
        Ok(())
    }

    /// Set whether `command` may be displaced by a conflicting command.
    pub fn set_interruptible(&mut self, command: CommandId, interruptible: bool) -> Result<(), CommandError> {
        self.set_option(command, CommandFlags::INTERRUPTIBLE, interruptible)
    }

    /// Set whether `command` keeps running while the robot is disabled.
    pub fn set_run_when_disabled(&mut self, command: CommandId, run: bool) -> Result<(), CommandError> {
        self.set_option(command, CommandFlags::RUN_WHEN_DISABLED, run)
    }

    fn set_option(&mut self, command: CommandId, flag: CommandFlags, value: bool) -> Result<(), CommandError> {
        let Some(cmd) = self.commands.get_mut(&command) else {
            return Err(self.report(CommandError::UnknownCommand(command)));
        };
        cmd.flags.set(flag, value);
        Ok(())
    }

    /// Effective interruptibility.
    ///
    /// A group is interruptible only if it and every member currently
    /// executing (its sequential step and its parallel children) are.
    pub fn is_interruptible(&self, command: CommandId) -> bool {
        let Some(cmd) = self.commands.get(&command) else {
            return false;
        };
        if !cmd.own_interruptible() {
            return false;
        }
        match &cmd.kind {
            CommandKind::Group(group) => group
                .executing_members()
                .all(|member| self.is_interruptible(member)),
            _ => true,
        }
    }

    /// `true` while `command` is running (admitted, or executing in a group).
    pub fn is_running(&self, command: CommandId) -> bool {
        self.commands.get(&command).is_some_and(Command::is_running)
    }

    /// Seconds since `command` initialized, `0.0` if it has not.
    pub fn time_since_initialized(&self, command: CommandId) -> f64 {
        let now = self.clock.now();
        self.commands
            .get(&command)
            .map_or(0.0, |cmd| cmd.time_since_initialized(now))
    }

    /// `true` once the timeout of `command` has elapsed.
    pub fn is_timed_out(&self, command: CommandId) -> bool {
        let now = self.clock.now();
        self.commands.get(&command).is_some_and(|cmd| cmd.is_timed_out(now))
    }

    // ─── Active set ─────────────────────────────────────────────────

    /// `true` if `command` is in the active set.
    pub fn is_active(&self, command: CommandId) -> bool {
        self.active.contains(&command)
    }

    /// Active commands in creation order.
    pub fn active_commands(&self) -> Vec<CommandId> {
        self.active.iter().copied().collect()
    }

    /// Queue `command` for admission on the next tick.
    ///
    /// Unlike [`start`](Self::start) this neither locks the command nor
    /// checks its group membership.
    pub fn add_command(&mut self, command: CommandId) -> Result<(), CommandError> {
        if !self.commands.contains_key(&command) {
            return Err(self.report(CommandError::UnknownCommand(command)));
        }
        self.enqueue(command);
        Ok(())
    }

    pub(crate) fn enqueue(&mut self, command: CommandId) {
        // The receiver lives in `self`; sending can not fail.
        let _ = self.additions_tx.send(command);
    }

    /// Handle for queuing additions from other threads.
    pub fn addition_handle(&self) -> AdditionHandle {
        AdditionHandle {
            tx: self.additions_tx.clone(),
        }
    }

    /// Remove `command` from the active set, releasing its requirements and
    /// running its end hook. A command that is not active is left alone.
    pub fn remove(&mut self, command: CommandId) -> Result<(), CommandError> {
        let Some(cmd) = self.commands.get(&command) else {
            return Err(self.report(CommandError::UnknownCommand(command)));
        };
        let requirements = cmd.requirements.clone();
        if !self.active.remove(&command) {
            return Ok(());
        }
        for subsystem in requirements {
            if let Some(sub) = self.subsystem_mut(subsystem)
                && sub.current_command == Some(command)
            {
                sub.set_current_command(None);
            }
        }
        self.removed(command);
        self.running_changed = true;
        Ok(())
    }

    /// Remove every active command.
    pub fn remove_all(&mut self) {
        while let Some(&command) = self.active.first() {
            if self.remove(command).is_err() {
                self.active.remove(&command);
            }
        }
    }

    /// Drop every command, subsystem, button binding and pending addition.
    ///
    /// Ids are not reused afterwards.
    pub fn reset_all(&mut self) {
        self.remove_all();
        self.subsystems.clear();
        self.buttons.clear();
        while self.additions_rx.try_recv().is_ok() {}
        self.commands.clear();
        self.running_changed = true;
        info!("scheduler reset");
    }

    // ─── Enable / errors / clock ────────────────────────────────────

    /// Enable or disable ticking. A disabled scheduler's `run` does nothing.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!(enabled, "scheduler enable changed");
        }
        self.enabled = enabled;
    }

    /// `true` when `run` performs work.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current clock reading [s].
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Number of ticks performed while enabled.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn report(&mut self, err: CommandError) -> CommandError {
        self.errors.report(err)
    }

    /// Most recently reported error.
    pub fn last_error(&self) -> Option<&CommandError> {
        self.errors.last_error()
    }

    /// Errors reported since creation or the last [`clear_errors`](Self::clear_errors).
    pub fn error_count(&self) -> u64 {
        self.errors.error_count()
    }

    /// Forget reported errors.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    // ─── Tick ───────────────────────────────────────────────────────

    /// Perform one scheduler tick.
    pub fn run(&mut self) {
        if !self.enabled {
            return;
        }
        self.ticks += 1;
        trace!(tick = self.ticks, active = self.active.len(), "tick");

        self.poll_buttons();

        for sub in &mut self.subsystems {
            sub.behavior.periodic();
        }

        let snapshot: Vec<CommandId> = self.active.iter().copied().collect();
        for command in snapshot {
            // A command displaced earlier in this loop is skipped.
            if !self.active.contains(&command) {
                continue;
            }
            if !self.run_command(command) {
                let _ = self.remove(command);
            }
        }

        let mut pending: Vec<CommandId> = Vec::new();
        while let Ok(command) = self.additions_rx.try_recv() {
            if !pending.contains(&command) {
                pending.push(command);
            }
        }
        for command in pending {
            self.process_command_addition(command);
        }

        let subsystems: Vec<SubsystemId> = self.subsystems.iter().map(|s| s.id).collect();
        for subsystem in subsystems {
            if self.current_command(subsystem).is_none()
                && let Some(default) = self.default_command(subsystem)
            {
                self.process_command_addition(default);
            }
            if self.subsystem(subsystem).is_some_and(|s| s.current_changed) {
                self.publish_subsystem(subsystem);
            }
            if let Some(sub) = self.subsystem_mut(subsystem) {
                sub.confirm_command();
            }
        }

        self.publish_scheduler();
        self.apply_dashboard_cancels();
    }

    /// Admit `command`, displacing the holders of its requirements.
    ///
    /// The whole admission is refused if any holder is not interruptible.
    pub(crate) fn process_command_addition(&mut self, command: CommandId) {
        if self.adding {
            self.report(CommandError::Reentrancy { command });
            return;
        }
        if self.active.contains(&command) {
            return;
        }
        let Some(cmd) = self.commands.get(&command) else {
            self.report(CommandError::UnknownCommand(command));
            return;
        };
        let requirements = cmd.requirements.clone();

        for &subsystem in &requirements {
            if let Some(holder) = self.current_command(subsystem)
                && !self.is_interruptible(holder)
            {
                debug!(
                    command = %self.display_name(command),
                    holder = %self.display_name(holder),
                    "admission refused, holder not interruptible"
                );
                return;
            }
        }

        self.adding = true;
        for &subsystem in &requirements {
            if let Some(holder) = self.current_command(subsystem) {
                debug!(
                    command = %self.display_name(command),
                    holder = %self.display_name(holder),
                    "interrupting holder"
                );
                self.cancel_internal(holder);
                let _ = self.remove(holder);
            }
            if let Some(sub) = self.subsystem_mut(subsystem) {
                sub.set_current_command(Some(command));
            }
        }
        self.adding = false;

        self.active.insert(command);
        self.start_running(command);
        self.running_changed = true;
        debug!(command = %self.display_name(command), "admitted");
    }

    pub(crate) fn display_name(&self, command: CommandId) -> &str {
        self.commands.get(&command).map_or("<unknown>", Command::name)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("enabled", &self.enabled)
            .field("commands", &self.commands.len())
            .field("subsystems", &self.subsystems.len())
            .field("active", &self.active)
            .field("buttons", &self.buttons.len())
            .field("ticks", &self.ticks)
            .finish()
    }
}
