//! Integration test: conditional commands choosing a branch at
//! initialization.

use std::cell::Cell;
use std::rc::Rc;

use robocmd_scheduler::prelude::*;

use super::mock::{MockCommand, SimRobot, assert_state};

struct Fixture {
    sim: SimRobot,
    subsystem: SubsystemId,
    on_true: (CommandId, MockCommand),
    on_false: (CommandId, MockCommand),
    command: (CommandId, MockCommand),
    command_null: (CommandId, MockCommand),
    condition: Rc<Cell<bool>>,
}

fn fixture() -> Fixture {
    let mut sim = SimRobot::new();
    let subsystem = sim.sched.register_subsystem("MockSubsystem");
    let on_true = sim.mock_requiring("OnTrue", subsystem);
    let on_false = sim.mock_requiring("OnFalse", subsystem);
    let condition = Rc::new(Cell::new(false));

    let mock = MockCommand::new();
    let flag = Rc::clone(&condition);
    let id = sim
        .sched
        .create_conditional_with("Conditional", on_true.0, Some(on_false.0), move || flag.get(), mock.clone())
        .unwrap();

    let null_mock = MockCommand::new();
    let null_id = sim
        .sched
        .create_conditional_with("ConditionalNull", on_true.0, None, || false, null_mock.clone())
        .unwrap();

    Fixture {
        sim,
        subsystem,
        on_true,
        on_false,
        command: (id, mock),
        command_null: (null_id, null_mock),
        condition,
    }
}

#[test]
fn on_true() {
    let mut f = fixture();
    f.condition.set(true);
    let (on_true, on_false, cond) = (&f.on_true.1, &f.on_false.1, &f.command.1);

    f.sim.sched.add_command(f.command.0).unwrap();
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 0, 0, 0, 0, 0);
    f.sim.run(); // admit the conditional
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(cond, 0, 0, 0, 0, 0);
    assert_eq!(f.sim.sched.current_command(f.subsystem), Some(f.command.0));
    f.sim.run(); // initialize it and choose the true branch
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 1, 1, 0, 0);
    assert_eq!(f.sim.sched.chosen_command(f.command.0), Some(f.on_true.0));
    f.sim.run();
    assert_state(on_true, 1, 1, 1, 0, 0);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 2, 2, 0, 0);
    f.sim.run();
    assert_state(on_true, 1, 2, 2, 0, 0);
    assert_state(cond, 1, 3, 3, 0, 0);
    on_true.set_has_finished(true);
    f.sim.run();
    assert_state(on_true, 1, 3, 3, 1, 0);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 4, 4, 1, 0);
    f.sim.run();
    assert_state(on_true, 1, 3, 3, 1, 0);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 4, 4, 1, 0);
    assert_eq!(f.sim.sched.current_command(f.subsystem), None);
}

#[test]
fn on_false() {
    let mut f = fixture();
    f.condition.set(false);
    let (on_true, on_false, cond) = (&f.on_true.1, &f.on_false.1, &f.command.1);

    f.sim.sched.add_command(f.command.0).unwrap();
    f.sim.run();
    assert_state(cond, 0, 0, 0, 0, 0);
    f.sim.run();
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 1, 1, 0, 0);
    f.sim.run();
    assert_state(on_false, 1, 1, 1, 0, 0);
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 2, 2, 0, 0);
    f.sim.run();
    assert_state(on_false, 1, 2, 2, 0, 0);
    assert_state(cond, 1, 3, 3, 0, 0);
    on_false.set_has_finished(true);
    f.sim.run();
    assert_state(on_false, 1, 3, 3, 1, 0);
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 4, 4, 1, 0);
    f.sim.run();
    assert_state(on_false, 1, 3, 3, 1, 0);
    assert_state(cond, 1, 4, 4, 1, 0);
}

#[test]
fn cancel_sub_command() {
    let mut f = fixture();
    f.condition.set(true);
    let (on_true, on_false, cond) = (&f.on_true.1, &f.on_false.1, &f.command.1);

    f.sim.sched.add_command(f.command.0).unwrap();
    f.sim.run_n(4);
    assert_state(on_true, 1, 2, 2, 0, 0);
    assert_state(cond, 1, 3, 3, 0, 0);

    f.sim.sched.cancel(f.on_true.0).unwrap();
    f.sim.run();
    assert_state(on_true, 1, 2, 2, 0, 1);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 4, 4, 1, 0);
    f.sim.run();
    assert_state(on_true, 1, 2, 2, 0, 1);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 4, 4, 1, 0);
}

#[test]
fn cancel_conditional_cancels_chosen_branch() {
    let mut f = fixture();
    f.condition.set(true);
    let (on_true, on_false, cond) = (&f.on_true.1, &f.on_false.1, &f.command.1);

    f.sim.sched.add_command(f.command.0).unwrap();
    f.sim.run_n(4);
    assert_state(on_true, 1, 2, 2, 0, 0);
    assert_state(cond, 1, 3, 3, 0, 0);

    f.sim.sched.cancel(f.command.0).unwrap();
    f.sim.run();
    assert_state(on_true, 1, 2, 2, 0, 1);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 3, 3, 0, 1);
    f.sim.run();
    assert_state(on_true, 1, 2, 2, 0, 1);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 3, 3, 0, 1);
}

#[test]
fn on_true_twice() {
    let mut f = fixture();
    f.condition.set(true);
    let (on_true, on_false, cond) = (&f.on_true.1, &f.on_false.1, &f.command.1);

    f.sim.sched.add_command(f.command.0).unwrap();
    f.sim.run_n(4);
    on_true.set_has_finished(true);
    f.sim.run();
    assert_state(on_true, 1, 3, 3, 1, 0);
    assert_state(cond, 1, 4, 4, 1, 0);
    f.sim.run();

    on_true.reset_counters();
    cond.reset_counters();
    f.sim.sched.add_command(f.command.0).unwrap();
    f.sim.sched.add_command(f.command.0).unwrap();
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(cond, 0, 0, 0, 0, 0);
    f.sim.run();
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(cond, 0, 0, 0, 0, 0);
    f.sim.run();
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 1, 1, 0, 0);
    f.sim.run();
    assert_state(on_true, 1, 1, 1, 0, 0);
    assert_state(cond, 1, 2, 2, 0, 0);
    f.sim.run();
    assert_state(on_true, 1, 2, 2, 0, 0);
    assert_state(cond, 1, 3, 3, 0, 0);
    on_true.set_has_finished(true);
    f.sim.run();
    assert_state(on_true, 1, 3, 3, 1, 0);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 4, 4, 1, 0);
    f.sim.run();
    assert_state(on_true, 1, 3, 3, 1, 0);
    assert_state(cond, 1, 4, 4, 1, 0);
}

#[test]
fn on_true_instant() {
    let mut f = fixture();
    f.condition.set(true);
    let (on_true, on_false, cond) = (&f.on_true.1, &f.on_false.1, &f.command.1);
    on_true.set_has_finished(true);

    f.sim.sched.add_command(f.command.0).unwrap();
    f.sim.run();
    assert_state(cond, 0, 0, 0, 0, 0);
    f.sim.run();
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 1, 1, 0, 0);
    f.sim.run();
    assert_state(on_true, 1, 1, 1, 1, 0);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 2, 2, 1, 0);
    f.sim.run();
    assert_state(on_true, 1, 1, 1, 1, 0);
    assert_state(cond, 1, 2, 2, 1, 0);
}

#[test]
fn starting_other_branch_interrupts_conditional() {
    let mut f = fixture();
    f.condition.set(true);
    let (on_true, on_false, cond) = (&f.on_true.1, &f.on_false.1, &f.command.1);

    f.sim.sched.add_command(f.command.0).unwrap();
    f.sim.run_n(4);
    assert_state(on_true, 1, 2, 2, 0, 0);
    assert_state(cond, 1, 3, 3, 0, 0);

    f.sim.sched.start(f.on_false.0).unwrap();
    f.sim.run();
    assert_state(on_true, 1, 3, 3, 0, 0);
    assert_state(on_false, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 4, 4, 0, 1);
    assert_eq!(f.sim.sched.current_command(f.subsystem), Some(f.on_false.0));
    f.sim.run();
    assert_state(on_true, 1, 3, 3, 0, 1);
    assert_state(on_false, 1, 1, 1, 0, 0);
    assert_state(cond, 1, 4, 4, 0, 1);
}

#[test]
fn on_false_without_branch_finishes_immediately() {
    let mut f = fixture();
    let (on_true, cond) = (&f.on_true.1, &f.command_null.1);

    f.sim.sched.add_command(f.command_null.0).unwrap();
    f.sim.run();
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(cond, 0, 0, 0, 0, 0);
    f.sim.run();
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 1, 1, 1, 0);
    assert_eq!(f.sim.sched.chosen_command(f.command_null.0), None);
    f.sim.run();
    assert_state(on_true, 0, 0, 0, 0, 0);
    assert_state(cond, 1, 1, 1, 1, 0);
}
