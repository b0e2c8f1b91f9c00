//! Subsystems: exclusive resources that commands require.
//!
//! A subsystem records which command currently holds it and, optionally, a
//! default command that the scheduler admits whenever the subsystem is idle.
//! The default can be assigned eagerly through
//! [`Scheduler::set_default_command`] or lazily through
//! [`SubsystemBehavior::init_default_command`], which runs once on first
//! query.

use std::fmt;
use tracing::debug;

use crate::command::CommandId;
use crate::error::CommandError;
use crate::scheduler::Scheduler;

/// Stable handle for a registered subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubsystemId(u32);

impl SubsystemId {
    /// Wrap a raw id.
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

impl fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subsystem #{}", self.0)
    }
}

/// User hooks for a subsystem.
pub trait SubsystemBehavior {
    /// Lazily provide a default command. Called at most once.
    fn init_default_command(&mut self) -> Option<CommandId> {
        None
    }

    /// Called once per scheduler tick, before commands run.
    fn periodic(&mut self) {}
}

/// Behavior for subsystems that need no hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passive;

impl SubsystemBehavior for Passive {}

/// A registered subsystem.
pub struct Subsystem {
    pub(crate) id: SubsystemId,
    pub(crate) name: String,
    pub(crate) current_command: Option<CommandId>,
    pub(crate) current_changed: bool,
    pub(crate) default_command: Option<CommandId>,
    pub(crate) default_initialized: bool,
    pub(crate) behavior: Box<dyn SubsystemBehavior>,
}

impl Subsystem {
    pub(crate) fn new(id: SubsystemId, name: String, behavior: Box<dyn SubsystemBehavior>) -> Self {
        Self {
            id,
            name,
            current_command: None,
            current_changed: true,
            default_command: None,
            default_initialized: false,
            behavior,
        }
    }

    /// Handle of this subsystem.
    #[inline]
    pub fn id(&self) -> SubsystemId {
        self.id
    }

    /// Display name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command currently holding this subsystem.
    #[inline]
    pub fn current_command(&self) -> Option<CommandId> {
        self.current_command
    }

    /// Default command as assigned so far (no lazy initialization).
    #[inline]
    pub fn assigned_default(&self) -> Option<CommandId> {
        self.default_command
    }

    pub(crate) fn set_current_command(&mut self, command: Option<CommandId>) {
        self.current_command = command;
        self.current_changed = true;
    }

    /// Clear the "current command changed" flag.
    pub(crate) fn confirm_command(&mut self) {
        self.current_changed = false;
    }
}

impl fmt::Debug for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subsystem")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("current_command", &self.current_command)
            .field("default_command", &self.default_command)
            .finish()
    }
}

// ─── Scheduler-side operations ──────────────────────────────────────

impl Scheduler {
    /// Register a subsystem without hooks.
    pub fn register_subsystem(&mut self, name: impl Into<String>) -> SubsystemId {
        self.register_subsystem_with(name, Passive)
    }

    /// Register a subsystem with custom hooks.
    pub fn register_subsystem_with(
        &mut self,
        name: impl Into<String>,
        behavior: impl SubsystemBehavior + 'static,
    ) -> SubsystemId {
        let id = SubsystemId(self.next_subsystem_id);
        self.next_subsystem_id += 1;
        let name = name.into();
        debug!(subsystem = %name, id = id.0, "registered subsystem");
        self.subsystems.push(Subsystem::new(id, name, Box::new(behavior)));
        self.publish_subsystem(id);
        id
    }

    /// Registered subsystem, if any.
    pub fn subsystem(&self, id: SubsystemId) -> Option<&Subsystem> {
        self.subsystems.iter().find(|s| s.id == id)
    }

    pub(crate) fn subsystem_mut(&mut self, id: SubsystemId) -> Option<&mut Subsystem> {
        self.subsystems.iter_mut().find(|s| s.id == id)
    }

    /// Every registered subsystem, in registration order.
    pub fn subsystems(&self) -> impl Iterator<Item = &Subsystem> {
        self.subsystems.iter()
    }

    /// Command currently holding `subsystem`.
    pub fn current_command(&self, subsystem: SubsystemId) -> Option<CommandId> {
        self.subsystem(subsystem)?.current_command
    }

    /// Name of the command currently holding `subsystem`, or `""`.
    pub fn current_command_name(&self, subsystem: SubsystemId) -> &str {
        self.current_command(subsystem)
            .and_then(|id| self.command(id))
            .map_or("", |cmd| cmd.name())
    }

    /// Assign or clear (`None`) the default command of `subsystem`.
    ///
    /// The command must require `subsystem`; otherwise the call is rejected
    /// and the previous default stays in place.
    pub fn set_default_command(
        &mut self,
        subsystem: SubsystemId,
        command: Option<CommandId>,
    ) -> Result<(), CommandError> {
        if self.subsystem(subsystem).is_none() {
            return Err(self.report(CommandError::UnknownSubsystem(subsystem)));
        }
        if let Some(id) = command {
            let Some(cmd) = self.command(id) else {
                return Err(self.report(CommandError::UnknownCommand(id)));
            };
            if !cmd.does_require(subsystem) {
                return Err(self.report(CommandError::MissingRequirement {
                    command: id,
                    subsystem,
                }));
            }
        }
        if let Some(sub) = self.subsystem_mut(subsystem) {
            sub.default_command = command;
        }
        self.publish_subsystem(subsystem);
        Ok(())
    }

    /// Default command of `subsystem`, running the lazy hook on first query.
    pub fn default_command(&mut self, subsystem: SubsystemId) -> Option<CommandId> {
        let sub = self.subsystem_mut(subsystem)?;
        if !sub.default_initialized {
            sub.default_initialized = true;
            if let Some(default) = sub.behavior.init_default_command() {
                // Rejections are reported; the subsystem simply keeps no default.
                let _ = self.set_default_command(subsystem, Some(default));
            }
        }
        self.subsystem(subsystem)?.default_command
    }

    /// Name of the default command of `subsystem`, or `""`.
    pub fn default_command_name(&mut self, subsystem: SubsystemId) -> String {
        self.default_command(subsystem)
            .and_then(|id| self.command(id))
            .map_or_else(String::new, |cmd| cmd.name().to_string())
    }
}
