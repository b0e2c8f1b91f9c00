//! Per-command state transitions driven by the scheduler and by groups.

use tracing::{debug, trace};

use super::{Command, CommandContext, CommandFlags, CommandId, CommandKind, Runnable};
use crate::error::CommandError;
use crate::scheduler::Scheduler;

impl Scheduler {
    /// Queue `command` for admission and lock its configuration.
    ///
    /// Rejected for group members and while an admission is canceling the
    /// holders of its requirements.
    pub fn start(&mut self, command: CommandId) -> Result<(), CommandError> {
        let Some(cmd) = self.commands.get_mut(&command) else {
            return Err(self.report(CommandError::UnknownCommand(command)));
        };
        cmd.lock();
        if cmd.is_parented() {
            return Err(self.errors.report(CommandError::IllegalTopology {
                command,
                reason: "can not start a command that is part of a command group",
            }));
        }
        if self.adding {
            return Err(self.errors.report(CommandError::Reentrancy { command }));
        }
        cmd.flags.remove(CommandFlags::COMPLETED);
        trace!(command = %cmd.name, "queued");
        self.enqueue(command);
        Ok(())
    }

    /// Ask a running top-level command to stop.
    ///
    /// The command observes the request on its next run and ends
    /// interrupted. Group members can only be canceled through their group.
    pub fn cancel(&mut self, command: CommandId) -> Result<(), CommandError> {
        let Some(cmd) = self.commands.get(&command) else {
            return Err(self.report(CommandError::UnknownCommand(command)));
        };
        if cmd.is_parented() {
            return Err(self.report(CommandError::IllegalTopology {
                command,
                reason: "can not cancel a command that is part of a command group",
            }));
        }
        self.cancel_internal(command);
        Ok(())
    }

    /// Mark `command` canceled if it is running. Conditionals forward the
    /// request to the command they chose.
    pub(crate) fn cancel_internal(&mut self, command: CommandId) {
        let Some(cmd) = self.commands.get_mut(&command) else {
            return;
        };
        if cmd.is_running() {
            cmd.flags.insert(CommandFlags::CANCELED);
        }
        let chosen = match &cmd.kind {
            CommandKind::Conditional(cond) => cond.chosen,
            _ => None,
        };
        if let Some(chosen) = chosen
            && self.is_running(chosen)
        {
            let _ = self.cancel(chosen);
        }
    }

    /// Transition into the running state ahead of the first run.
    pub(crate) fn start_running(&mut self, command: CommandId) {
        if let Some(cmd) = self.commands.get_mut(&command) {
            cmd.flags.insert(CommandFlags::RUNNING);
            cmd.flags.remove(CommandFlags::COMPLETED);
            cmd.start_time = None;
        }
        self.publish_command(command);
    }

    /// Run `command` once. Returns `false` when it should be removed.
    pub(crate) fn run_command(&mut self, command: CommandId) -> bool {
        let Some(cmd) = self.commands.get(&command) else {
            return false;
        };
        if !cmd.will_run_when_disabled() && !cmd.is_parented() && self.robot.is_disabled() {
            self.cancel_internal(command);
        }

        let Some(cmd) = self.commands.get_mut(&command) else {
            return false;
        };
        if cmd.is_canceled() {
            return false;
        }
        if !cmd.is_initialized() {
            cmd.flags.insert(CommandFlags::INITIALIZED);
            cmd.start_time = Some(self.clock.now());
            trace!(command = %cmd.name, "initialize");
            self.initialize_kind(command);
            self.with_hooks(command, |hooks, ctx| hooks.initialize(ctx));
        }
        self.execute_kind(command);
        self.with_hooks(command, |hooks, ctx| hooks.execute(ctx));
        !self.is_finished(command)
    }

    /// End the current activation of `command` and mark it completed.
    pub(crate) fn removed(&mut self, command: CommandId) {
        let Some(cmd) = self.commands.get(&command) else {
            return;
        };
        if cmd.is_initialized() {
            let interrupted = cmd.is_canceled();
            debug!(command = %cmd.name, interrupted, "ended");
            self.with_hooks(command, |hooks, ctx| hooks.end(interrupted, ctx));
            self.end_kind(command, interrupted);
        }
        if let Some(cmd) = self.commands.get_mut(&command) {
            cmd.flags
                .remove(CommandFlags::INITIALIZED | CommandFlags::CANCELED | CommandFlags::RUNNING);
            cmd.flags.insert(CommandFlags::COMPLETED);
        }
        self.publish_command(command);
    }

    /// Poll whether `command` is done. User hooks are always consulted;
    /// framework kinds add their own completion rule.
    fn is_finished(&mut self, command: CommandId) -> bool {
        let hooks_done = self
            .with_hooks(command, |hooks, ctx| hooks.is_finished(ctx))
            .unwrap_or(true);
        let Some(cmd) = self.commands.get(&command) else {
            return true;
        };
        match &cmd.kind {
            CommandKind::Basic => hooks_done,
            CommandKind::Group(group) => hooks_done || group.is_finished(),
            CommandKind::Conditional(cond) => {
                hooks_done
                    || cond
                        .chosen
                        .is_none_or(|chosen| self.commands.get(&chosen).is_none_or(Command::is_completed))
            }
            CommandKind::Start { .. } => true,
            CommandKind::WaitForChildren => {
                hooks_done || cmd.parent.is_none_or(|group| self.children_running(group) == 0)
            }
        }
    }

    fn initialize_kind(&mut self, command: CommandId) {
        let mut start_target = None;
        let mut conditional = false;
        match self.commands.get_mut(&command).map(|cmd| &mut cmd.kind) {
            Some(CommandKind::Group(group)) => group.reset_cursor(),
            Some(CommandKind::Start { target }) => start_target = Some(*target),
            Some(CommandKind::Conditional(_)) => conditional = true,
            _ => {}
        }
        if conditional {
            self.initialize_conditional(command);
        }
        if let Some(target) = start_target {
            let _ = self.start(target);
        }
    }

    fn execute_kind(&mut self, command: CommandId) {
        if self.commands.get(&command).is_some_and(Command::is_group) {
            self.execute_group(command);
        }
    }

    fn end_kind(&mut self, command: CommandId, interrupted: bool) {
        let (is_group, chosen) = match self.commands.get(&command).map(|cmd| &cmd.kind) {
            Some(CommandKind::Group(_)) => (true, None),
            Some(CommandKind::Conditional(cond)) => (false, cond.chosen),
            _ => (false, None),
        };
        if is_group {
            self.end_group(command);
        } else if interrupted
            && let Some(chosen) = chosen
            && self.is_running(chosen)
        {
            let _ = self.cancel(chosen);
        }
    }

    /// Invoke a user hook with a fresh context, then apply the start
    /// requests it made. Returns `None` for unknown commands.
    pub(crate) fn with_hooks<R>(
        &mut self,
        command: CommandId,
        f: impl FnOnce(&mut dyn Runnable, &mut CommandContext<'_>) -> R,
    ) -> Option<R> {
        let now = self.clock.now();
        let cmd = self.commands.get_mut(&command)?;
        let mut ctx = CommandContext::new(cmd.id, &cmd.name, now, cmd.start_time, cmd.timeout);
        let out = f(cmd.hooks.as_mut(), &mut ctx);
        for target in ctx.into_start_requests() {
            // Refusals are recorded by the reporter.
            let _ = self.start(target);
        }
        Some(out)
    }
}
