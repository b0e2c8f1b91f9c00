//! Conditional commands: pick one of two commands when initialized.
//!
//! The conditional requires the union of both branches' requirements so it
//! displaces whatever either branch would conflict with. On initialization
//! the condition is evaluated, the chosen branch's requirements are cleared
//! (the conditional already holds them) and the branch is started as a
//! separate top-level command. The conditional finishes once the chosen
//! branch completes, or immediately if no branch was chosen.

use std::fmt;
use tracing::debug;

use super::{CommandId, CommandKind, Noop, Runnable};
use crate::error::CommandError;
use crate::scheduler::Scheduler;

/// Conditional body stored in the command record.
pub struct Conditional {
    pub(crate) on_true: CommandId,
    pub(crate) on_false: Option<CommandId>,
    condition: Box<dyn FnMut() -> bool>,
    pub(crate) chosen: Option<CommandId>,
}

impl fmt::Debug for Conditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conditional")
            .field("on_true", &self.on_true)
            .field("on_false", &self.on_false)
            .field("chosen", &self.chosen)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a conditional choosing `on_true` when `condition` holds and
    /// `on_false` (possibly nothing) otherwise.
    pub fn create_conditional(
        &mut self,
        name: impl Into<String>,
        on_true: CommandId,
        on_false: Option<CommandId>,
        condition: impl FnMut() -> bool + 'static,
    ) -> Result<CommandId, CommandError> {
        self.create_conditional_with(name, on_true, on_false, condition, Noop)
    }

    /// Like [`create_conditional`](Self::create_conditional), with hooks
    /// that run alongside the choice.
    pub fn create_conditional_with(
        &mut self,
        name: impl Into<String>,
        on_true: CommandId,
        on_false: Option<CommandId>,
        condition: impl FnMut() -> bool + 'static,
        hooks: impl Runnable + 'static,
    ) -> Result<CommandId, CommandError> {
        let mut requirements = Vec::new();
        for branch in std::iter::once(on_true).chain(on_false) {
            let Some(cmd) = self.commands.get(&branch) else {
                return Err(self.report(CommandError::UnknownCommand(branch)));
            };
            for subsystem in &cmd.requirements {
                if !requirements.contains(subsystem) {
                    requirements.push(*subsystem);
                }
            }
        }

        let id = self.insert_command(
            name.into(),
            Box::new(hooks),
            CommandKind::Conditional(Conditional {
                on_true,
                on_false,
                condition: Box::new(condition),
                chosen: None,
            }),
        );
        if let Some(cmd) = self.commands.get_mut(&id) {
            cmd.requirements = requirements;
        }
        Ok(id)
    }

    /// Branch chosen by the most recent initialization of `conditional`.
    pub fn chosen_command(&self, conditional: CommandId) -> Option<CommandId> {
        match &self.commands.get(&conditional)?.kind {
            CommandKind::Conditional(cond) => cond.chosen,
            _ => None,
        }
    }

    pub(crate) fn initialize_conditional(&mut self, conditional: CommandId) {
        let chosen = match self.commands.get_mut(&conditional).map(|cmd| &mut cmd.kind) {
            Some(CommandKind::Conditional(cond)) => {
                cond.chosen = if (cond.condition)() {
                    Some(cond.on_true)
                } else {
                    cond.on_false
                };
                cond.chosen
            }
            _ => None,
        };
        let Some(chosen) = chosen else {
            debug!(command = %self.display_name(conditional), "condition chose nothing");
            return;
        };
        if let Some(cmd) = self.commands.get_mut(&chosen) {
            cmd.requirements.clear();
        }
        debug!(
            command = %self.display_name(conditional),
            chosen = %self.display_name(chosen),
            "condition chose branch"
        );
        let _ = self.start(chosen);
    }
}
