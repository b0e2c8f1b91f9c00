//! Dashboard publishing for the scheduler, its subsystems and commands.
//!
//! Keys:
//!
//! | Key                          | Value                          |
//! |------------------------------|--------------------------------|
//! | `Scheduler/Names`            | names of active commands       |
//! | `Scheduler/Ids`              | ids of active commands         |
//! | `<subsystem>/.hasDefault`    | default command assigned       |
//! | `<subsystem>/.default`       | default command name or `""`   |
//! | `<subsystem>/.hasCommand`    | subsystem currently held       |
//! | `<subsystem>/.command`       | holder name or `""`            |
//! | `Commands/<id>/name`         | command name                   |
//! | `Commands/<id>/running`      | running flag                   |
//! | `Commands/<id>/isParented`   | group membership               |
//!
//! Scheduler lists are rewritten only when the active set changed.

use robocmd_common::telemetry::TableValue;

use crate::command::CommandId;
use crate::scheduler::Scheduler;
use crate::subsystem::SubsystemId;

impl Scheduler {
    fn put(&mut self, key: &str, value: TableValue) {
        if !self.publish {
            return;
        }
        if let Some(sink) = self.telemetry.as_mut() {
            sink.put(key, value);
        }
    }

    fn publishing(&self) -> bool {
        self.publish && self.telemetry.is_some()
    }

    pub(crate) fn publish_command(&mut self, command: CommandId) {
        if !self.publishing() {
            return;
        }
        let Some(cmd) = self.commands.get(&command) else {
            return;
        };
        let prefix = format!("Commands/{}", command.raw());
        let name = TableValue::Text(cmd.name.clone());
        let running = TableValue::Bool(cmd.is_running());
        let parented = TableValue::Bool(cmd.is_parented());
        self.put(&format!("{prefix}/name"), name);
        self.put(&format!("{prefix}/running"), running);
        self.put(&format!("{prefix}/isParented"), parented);
    }

    pub(crate) fn publish_subsystem(&mut self, subsystem: SubsystemId) {
        if !self.publishing() {
            return;
        }
        let Some(sub) = self.subsystem(subsystem) else {
            return;
        };
        let name = sub.name.clone();
        let default = sub.default_command;
        let current = sub.current_command;
        let name_of = |id: Option<CommandId>| {
            id.and_then(|id| self.command(id))
                .map_or_else(String::new, |cmd| cmd.name().to_string())
        };
        let default_name = name_of(default);
        let current_name = name_of(current);

        self.put(&format!("{name}/.hasDefault"), TableValue::Bool(default.is_some()));
        self.put(&format!("{name}/.default"), TableValue::Text(default_name));
        self.put(&format!("{name}/.hasCommand"), TableValue::Bool(current.is_some()));
        self.put(&format!("{name}/.command"), TableValue::Text(current_name));
    }

    pub(crate) fn publish_scheduler(&mut self) {
        if self.running_changed && self.publishing() {
            let (names, ids): (Vec<String>, Vec<f64>) = self
                .active
                .iter()
                .map(|id| (self.display_name(*id).to_string(), f64::from(id.raw())))
                .unzip();
            self.put("Scheduler/Names", TableValue::TextArray(names));
            self.put("Scheduler/Ids", TableValue::NumberArray(ids));
        }
        self.running_changed = false;
    }

    pub(crate) fn publish_everything(&mut self) {
        let mut commands: Vec<CommandId> = self.commands.keys().copied().collect();
        commands.sort();
        for command in commands {
            self.publish_command(command);
        }
        let subsystems: Vec<SubsystemId> = self.subsystems.iter().map(|s| s.id).collect();
        for subsystem in subsystems {
            self.publish_subsystem(subsystem);
        }
        self.running_changed = true;
        self.publish_scheduler();
    }

    /// Cancel active commands the dashboard asked to stop.
    pub(crate) fn apply_dashboard_cancels(&mut self) {
        let Some(sink) = self.telemetry.as_mut() else {
            return;
        };
        for raw in sink.take_cancel_requests() {
            let command = CommandId::from_raw(raw);
            if self.active.contains(&command) {
                let _ = self.cancel(command);
            }
        }
    }
}
