//! Stock commands.

use tracing::info;

use super::{CommandContext, CommandId, CommandKind, Noop, Runnable};
use crate::error::CommandError;
use crate::scheduler::Scheduler;

/// Does nothing until its timeout elapses.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaitCommand;

impl Runnable for WaitCommand {
    fn is_finished(&mut self, ctx: &CommandContext<'_>) -> bool {
        ctx.is_timed_out()
    }
}

/// Wraps other hooks and finishes when the command's timeout elapses.
#[derive(Debug, Default, Clone)]
pub struct TimedCommand<R> {
    inner: R,
}

impl<R: Runnable> TimedCommand<R> {
    /// Wrap `inner`; its own `is_finished` is ignored.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Runnable> Runnable for TimedCommand<R> {
    fn initialize(&mut self, ctx: &mut CommandContext<'_>) {
        self.inner.initialize(ctx);
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) {
        self.inner.execute(ctx);
    }

    fn is_finished(&mut self, ctx: &CommandContext<'_>) -> bool {
        ctx.is_timed_out()
    }

    fn end(&mut self, interrupted: bool, ctx: &mut CommandContext<'_>) {
        self.inner.end(interrupted, ctx);
    }
}

/// Runs a closure on initialization and finishes immediately.
pub struct InstantCommand<F> {
    action: F,
}

impl<F: FnMut(&mut CommandContext<'_>)> InstantCommand<F> {
    /// Wrap `action`.
    pub fn new(action: F) -> Self {
        Self { action }
    }
}

impl<F: FnMut(&mut CommandContext<'_>)> Runnable for InstantCommand<F> {
    fn initialize(&mut self, ctx: &mut CommandContext<'_>) {
        (self.action)(ctx);
    }

    fn is_finished(&mut self, _ctx: &CommandContext<'_>) -> bool {
        true
    }
}

/// Logs a message on initialization and finishes immediately.
#[derive(Debug, Clone)]
pub struct PrintCommand {
    message: String,
}

impl PrintCommand {
    /// Log `message` when run.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Runnable for PrintCommand {
    fn initialize(&mut self, ctx: &mut CommandContext<'_>) {
        info!(command = ctx.name(), "{}", self.message);
    }

    fn is_finished(&mut self, _ctx: &CommandContext<'_>) -> bool {
        true
    }
}

/// Finishes once the clock reaches an absolute time.
#[derive(Debug, Clone, Copy)]
pub struct WaitUntilCommand {
    time: f64,
}

impl WaitUntilCommand {
    /// Wait until the clock reads at least `time` seconds.
    pub fn new(time: f64) -> Self {
        Self { time }
    }
}

impl Runnable for WaitUntilCommand {
    fn is_finished(&mut self, ctx: &CommandContext<'_>) -> bool {
        ctx.now() >= self.time
    }
}

impl Scheduler {
    /// Command that waits `seconds`.
    pub fn create_wait(&mut self, name: impl Into<String>, seconds: f64) -> Result<CommandId, CommandError> {
        let id = self.create_command(name, WaitCommand);
        self.set_timeout(id, seconds)?;
        Ok(id)
    }

    /// Command that runs `hooks` for `seconds`.
    pub fn create_timed(
        &mut self,
        name: impl Into<String>,
        seconds: f64,
        hooks: impl Runnable + 'static,
    ) -> Result<CommandId, CommandError> {
        let id = self.create_command(name, TimedCommand::new(hooks));
        self.set_timeout(id, seconds)?;
        Ok(id)
    }

    /// Command that runs `action` once.
    pub fn create_instant(
        &mut self,
        name: impl Into<String>,
        action: impl FnMut(&mut CommandContext<'_>) + 'static,
    ) -> CommandId {
        self.create_command(name, InstantCommand::new(action))
    }

    /// Command that logs `message` once.
    pub fn create_print(&mut self, message: impl Into<String>) -> CommandId {
        let message = message.into();
        let name = format!("Print({message})");
        self.create_command(name, PrintCommand::new(message))
    }

    /// Command that waits until the clock reads `time`.
    pub fn create_wait_until(&mut self, name: impl Into<String>, time: f64) -> CommandId {
        self.create_command(name, WaitUntilCommand::new(time))
    }

    /// Command that starts `target` and finishes immediately.
    pub fn create_start_command(&mut self, target: CommandId) -> Result<CommandId, CommandError> {
        let Some(cmd) = self.commands.get(&target) else {
            return Err(self.report(CommandError::UnknownCommand(target)));
        };
        let name = format!("Start({})", cmd.name);
        Ok(self.insert_command(name, Box::new(Noop), CommandKind::Start { target }))
    }

    /// Command that finishes once its group has no parallel children left.
    ///
    /// Outside a group it finishes immediately.
    pub fn create_wait_for_children(&mut self, name: impl Into<String>) -> CommandId {
        self.insert_command(name.into(), Box::new(Noop), CommandKind::WaitForChildren)
    }
}
