//! Command groups: sequential and parallel composition.
//!
//! A group walks its entries with a cursor. Sequential entries run one at a
//! time; when the current one finishes the cursor advances and the next
//! entry starts in the same tick. Parallel entries are forked into the
//! group's child list and run alongside the sequence until they finish or a
//! later entry needs one of their subsystems. Peer entries are handed to the
//! scheduler as independent top-level commands.
//!
//! The group finishes when the cursor has passed the last entry and no
//! parallel children remain.

use tracing::debug;

use crate::command::{CommandId, CommandKind, NO_TIMEOUT, Noop};
use crate::error::CommandError;
use crate::scheduler::Scheduler;

/// How a group entry is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Blocks the sequence until it finishes.
    InSequence,
    /// Runs in parallel, owned by the group.
    BranchChild,
    /// Runs in parallel as an independent top-level command.
    BranchPeer,
}

/// A member of a group, with its optional per-entry timeout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupEntry {
    /// Member command.
    pub command: CommandId,
    /// Execution mode.
    pub state: EntryState,
    /// Entry timeout [s], measured from the member's initialization.
    pub timeout: Option<f64>,
}

/// Group body stored in the command record.
#[derive(Debug, Default)]
pub struct CommandGroup {
    entries: Vec<GroupEntry>,
    cursor: Option<usize>,
    children: Vec<GroupEntry>,
}

impl CommandGroup {
    /// Entries in insertion order.
    pub fn entries(&self) -> &[GroupEntry] {
        &self.entries
    }

    /// Parallel children still running.
    pub fn children(&self) -> &[GroupEntry] {
        &self.children
    }

    pub(crate) fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor >= self.entries.len()) && self.children.is_empty()
    }

    fn current(&self) -> Option<GroupEntry> {
        self.cursor.and_then(|cursor| self.entries.get(cursor).copied())
    }

    fn advance(&mut self) {
        self.cursor = Some(self.cursor.map_or(0, |cursor| cursor + 1));
    }

    /// Members whose interruptibility gates the group's.
    pub(crate) fn executing_members(&self) -> impl Iterator<Item = CommandId> + '_ {
        self.current()
            .map(|entry| entry.command)
            .into_iter()
            .chain(self.children.iter().map(|entry| entry.command))
    }
}

impl GroupEntry {
    /// A timed-out entry has a timeout and a member that initialized at
    /// least that long ago.
    fn is_timed_out(&self, elapsed: f64) -> bool {
        match self.timeout {
            Some(timeout) => elapsed != 0.0 && elapsed >= timeout,
            None => false,
        }
    }
}

// ─── Building ───────────────────────────────────────────────────────

impl Scheduler {
    /// Create an empty command group.
    pub fn create_group(&mut self, name: impl Into<String>) -> CommandId {
        self.insert_command(name.into(), Box::new(Noop), CommandKind::Group(CommandGroup::default()))
    }

    /// Append `command` as a sequential step.
    pub fn add_sequential(&mut self, group: CommandId, command: CommandId) -> Result<(), CommandError> {
        self.add_entry(group, command, EntryState::InSequence, NO_TIMEOUT)
    }

    /// Append `command` as a sequential step that is canceled after
    /// `timeout` seconds.
    pub fn add_sequential_with_timeout(
        &mut self,
        group: CommandId,
        command: CommandId,
        timeout: f64,
    ) -> Result<(), CommandError> {
        self.add_entry(group, command, EntryState::InSequence, timeout)
    }

    /// Append `command` as a parallel child.
    pub fn add_parallel(&mut self, group: CommandId, command: CommandId) -> Result<(), CommandError> {
        self.add_entry(group, command, EntryState::BranchChild, NO_TIMEOUT)
    }

    /// Append `command` as a parallel child that is canceled after
    /// `timeout` seconds.
    pub fn add_parallel_with_timeout(
        &mut self,
        group: CommandId,
        command: CommandId,
        timeout: f64,
    ) -> Result<(), CommandError> {
        self.add_entry(group, command, EntryState::BranchChild, timeout)
    }

    /// Append `command` as a peer: when reached it is started as an
    /// independent top-level command and the sequence moves on.
    ///
    /// Peers are not owned by the group and do not contribute requirements.
    pub fn add_peer(&mut self, group: CommandId, command: CommandId) -> Result<(), CommandError> {
        self.add_entry(group, command, EntryState::BranchPeer, NO_TIMEOUT)
    }

    fn add_entry(
        &mut self,
        group: CommandId,
        command: CommandId,
        state: EntryState,
        timeout: f64,
    ) -> Result<(), CommandError> {
        let Some(group_cmd) = self.commands.get(&group) else {
            return Err(self.report(CommandError::UnknownCommand(group)));
        };
        if !group_cmd.is_group() {
            return Err(self.report(CommandError::IllegalTopology {
                command: group,
                reason: "is not a command group",
            }));
        }
        if group_cmd.is_locked() {
            return Err(self.report(CommandError::LockedMutation {
                command: group,
                action: "add new command to command group",
            }));
        }
        let Some(member) = self.commands.get(&command) else {
            return Err(self.report(CommandError::UnknownCommand(command)));
        };
        if command == group {
            return Err(self.report(CommandError::IllegalTopology {
                command,
                reason: "can not add a command group to itself",
            }));
        }
        if member.is_parented() {
            return Err(self.report(CommandError::IllegalTopology {
                command,
                reason: "can not give command to a command group after already being put in a command group",
            }));
        }
        let timeout = if timeout == NO_TIMEOUT {
            None
        } else if timeout >= 0.0 {
            Some(timeout)
        } else {
            return Err(self.report(CommandError::NegativeTimeout {
                command: group,
                seconds: timeout,
            }));
        };
        let requirements = member.requirements.clone();

        if let Some(member) = self.commands.get_mut(&command) {
            member.lock();
            if state != EntryState::BranchPeer {
                member.parent = Some(group);
            }
        }
        if let Some(group_cmd) = self.commands.get_mut(&group) {
            if state != EntryState::BranchPeer {
                for subsystem in requirements {
                    if !group_cmd.requirements.contains(&subsystem) {
                        group_cmd.requirements.push(subsystem);
                    }
                }
            }
            if let CommandKind::Group(body) = &mut group_cmd.kind {
                body.entries.push(GroupEntry {
                    command,
                    state,
                    timeout,
                });
            }
        }
        self.publish_command(command);
        Ok(())
    }

    /// Group body of `group`, if it is a group.
    pub fn group(&self, group: CommandId) -> Option<&CommandGroup> {
        match &self.commands.get(&group)?.kind {
            CommandKind::Group(body) => Some(body),
            _ => None,
        }
    }

    fn group_mut(&mut self, group: CommandId) -> Option<&mut CommandGroup> {
        match &mut self.commands.get_mut(&group)?.kind {
            CommandKind::Group(body) => Some(body),
            _ => None,
        }
    }

    /// Number of parallel children of `group` still running.
    pub fn children_running(&self, group: CommandId) -> usize {
        self.group(group).map_or(0, |body| body.children.len())
    }

    // ─── Execution ──────────────────────────────────────────────────

    fn entry_timed_out(&self, entry: &GroupEntry) -> bool {
        entry.is_timed_out(self.time_since_initialized(entry.command))
    }

    /// One group tick: advance the sequence, then run parallel children.
    pub(crate) fn execute_group(&mut self, group: CommandId) {
        let mut first_run = false;
        if let Some(body) = self.group_mut(group)
            && body.cursor.is_none()
        {
            body.advance();
            first_run = true;
        }

        loop {
            let Some(entry) = self.group(group).and_then(CommandGroup::current) else {
                break;
            };
            match entry.state {
                EntryState::InSequence => {
                    if first_run {
                        self.start_running(entry.command);
                        self.cancel_conflicts(group, entry.command);
                    }
                    if self.entry_timed_out(&entry) {
                        self.cancel_internal(entry.command);
                    }
                    if self.run_command(entry.command) {
                        break;
                    }
                    self.removed(entry.command);
                    if let Some(body) = self.group_mut(group) {
                        body.advance();
                    }
                    first_run = true;
                }
                EntryState::BranchPeer => {
                    if let Some(body) = self.group_mut(group) {
                        body.advance();
                    }
                    // Peers are not parented, so a plain start is legal.
                    let _ = self.start(entry.command);
                }
                EntryState::BranchChild => {
                    if let Some(body) = self.group_mut(group) {
                        body.advance();
                    }
                    self.cancel_conflicts(group, entry.command);
                    self.start_running(entry.command);
                    if let Some(body) = self.group_mut(group) {
                        body.children.push(entry);
                    }
                }
            }
        }

        let children = self.group(group).map(|body| body.children.clone()).unwrap_or_default();
        let mut finished = Vec::new();
        for entry in children {
            if self.entry_timed_out(&entry) {
                self.cancel_internal(entry.command);
            }
            if !self.run_command(entry.command) {
                self.removed(entry.command);
                finished.push(entry.command);
            }
        }
        if !finished.is_empty()
            && let Some(body) = self.group_mut(group)
        {
            body.children.retain(|entry| !finished.contains(&entry.command));
        }
    }

    /// Cancel and remove parallel children of `group` that share a
    /// subsystem with `command`.
    fn cancel_conflicts(&mut self, group: CommandId, command: CommandId) {
        let Some(requirements) = self.command(command).map(|cmd| cmd.requirements.clone()) else {
            return;
        };
        let conflicting: Vec<CommandId> = self
            .group(group)
            .map(|body| {
                body.children
                    .iter()
                    .map(|entry| entry.command)
                    .filter(|child| {
                        self.command(*child)
                            .is_some_and(|c| c.requirements.iter().any(|r| requirements.contains(r)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        for child in conflicting {
            debug!(
                group = %self.display_name(group),
                child = %self.display_name(child),
                "canceling conflicting child"
            );
            self.cancel_internal(child);
            self.removed(child);
            if let Some(body) = self.group_mut(group) {
                body.children.retain(|entry| entry.command != child);
            }
        }
    }

    /// Tear down `group`: the current sequential step and every parallel
    /// child end interrupted.
    pub(crate) fn end_group(&mut self, group: CommandId) {
        let Some(body) = self.group(group) else {
            return;
        };
        let current = body
            .current()
            .filter(|entry| entry.state == EntryState::InSequence)
            .map(|entry| entry.command);
        let children: Vec<CommandId> = body.children.iter().map(|entry| entry.command).collect();

        if let Some(current) = current {
            self.cancel_internal(current);
            self.removed(current);
        }
        for child in children {
            self.cancel_internal(child);
            self.removed(child);
        }
        if let Some(body) = self.group_mut(group) {
            body.children.clear();
        }
    }
}
