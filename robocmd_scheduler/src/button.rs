//! Button bindings: edge-triggered command starts and cancels.
//!
//! A binding samples a [`Trigger`] once per tick and compares it with the
//! previous sample. The previous sample starts out as the trigger's value
//! at registration time, so a button already held when bound does not fire
//! a press edge.

use tracing::trace;

use crate::command::CommandId;
use crate::scheduler::Scheduler;

/// Boolean input polled once per tick.
pub trait Trigger {
    /// Current state.
    fn get(&mut self) -> bool;
}

impl<F: FnMut() -> bool> Trigger for F {
    fn get(&mut self) -> bool {
        self()
    }
}

/// What a binding does with its command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    /// Start on the press edge.
    WhenPressed,
    /// Start on the release edge.
    WhenReleased,
    /// Start every tick while held, cancel on release.
    WhileHeld,
    /// On the press edge, cancel if running, otherwise start.
    ToggleWhenPressed,
    /// Cancel on the press edge.
    CancelWhenPressed,
}

impl ButtonAction {
    /// Alias used by generic triggers: same as [`WhenPressed`](Self::WhenPressed).
    pub const WHEN_ACTIVE: Self = Self::WhenPressed;
    /// Alias used by generic triggers: same as [`WhenReleased`](Self::WhenReleased).
    pub const WHEN_INACTIVE: Self = Self::WhenReleased;
    /// Alias used by generic triggers: same as [`WhileHeld`](Self::WhileHeld).
    pub const WHILE_ACTIVE: Self = Self::WhileHeld;
    /// Alias used by generic triggers: same as [`ToggleWhenPressed`](Self::ToggleWhenPressed).
    pub const TOGGLE_WHEN_ACTIVE: Self = Self::ToggleWhenPressed;
    /// Alias used by generic triggers: same as [`CancelWhenPressed`](Self::CancelWhenPressed).
    pub const CANCEL_WHEN_ACTIVE: Self = Self::CancelWhenPressed;

    fn effect(self, pressed_last: bool, pressed: bool) -> Effect {
        let rising = pressed && !pressed_last;
        let falling = !pressed && pressed_last;
        match self {
            ButtonAction::WhenPressed if rising => Effect::Start,
            ButtonAction::WhenReleased if falling => Effect::Start,
            ButtonAction::WhileHeld if pressed => Effect::Start,
            ButtonAction::WhileHeld if falling => Effect::Cancel,
            ButtonAction::ToggleWhenPressed if rising => Effect::Toggle,
            ButtonAction::CancelWhenPressed if rising => Effect::Cancel,
            _ => Effect::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    None,
    Start,
    Cancel,
    Toggle,
}

/// A registered binding.
pub(crate) struct ButtonBinding {
    trigger: Box<dyn Trigger>,
    command: CommandId,
    action: ButtonAction,
    pressed_last: bool,
}

impl Scheduler {
    /// Bind `command` to `trigger` with `action`.
    pub fn add_button(&mut self, mut trigger: impl Trigger + 'static, action: ButtonAction, command: CommandId) {
        let pressed_last = trigger.get();
        self.buttons.push(ButtonBinding {
            trigger: Box::new(trigger),
            command,
            action,
            pressed_last,
        });
    }

    /// Start `command` on the press edge of `trigger`.
    pub fn when_pressed(&mut self, trigger: impl Trigger + 'static, command: CommandId) {
        self.add_button(trigger, ButtonAction::WhenPressed, command);
    }

    /// Start `command` on the release edge of `trigger`.
    pub fn when_released(&mut self, trigger: impl Trigger + 'static, command: CommandId) {
        self.add_button(trigger, ButtonAction::WhenReleased, command);
    }

    /// Keep `command` running while `trigger` is held.
    pub fn while_held(&mut self, trigger: impl Trigger + 'static, command: CommandId) {
        self.add_button(trigger, ButtonAction::WhileHeld, command);
    }

    /// Toggle `command` on each press of `trigger`.
    pub fn toggle_when_pressed(&mut self, trigger: impl Trigger + 'static, command: CommandId) {
        self.add_button(trigger, ButtonAction::ToggleWhenPressed, command);
    }

    /// Cancel `command` on the press edge of `trigger`.
    pub fn cancel_when_pressed(&mut self, trigger: impl Trigger + 'static, command: CommandId) {
        self.add_button(trigger, ButtonAction::CancelWhenPressed, command);
    }

    /// Number of registered bindings.
    pub fn button_count(&self) -> usize {
        self.buttons.len()
    }

    /// Sample every binding, newest first, and apply its effect.
    pub(crate) fn poll_buttons(&mut self) {
        for index in (0..self.buttons.len()).rev() {
            let Some(binding) = self.buttons.get_mut(index) else {
                continue;
            };
            let pressed = binding.trigger.get();
            let effect = binding.action.effect(binding.pressed_last, pressed);
            binding.pressed_last = pressed;
            let command = binding.command;

            // Errors (e.g. a grouped command) are reported and ignored.
            match effect {
                Effect::None => {}
                Effect::Start => {
                    let _ = self.start(command);
                }
                Effect::Cancel => {
                    let _ = self.cancel(command);
                }
                Effect::Toggle => {
                    if self.is_running(command) {
                        let _ = self.cancel(command);
                    } else {
                        let _ = self.start(command);
                    }
                }
            }
            if effect != Effect::None {
                trace!(command = %self.display_name(command), ?effect, "button fired");
            }
        }
    }
}
