//! Integration test: sequential, parallel and peer group execution.
//!
//! Covers:
//! 1. Parallel children running alongside each other
//! 2. Sequential entries with per-entry timeouts
//! 3. Conflict cancellation when a later entry needs a child's subsystem
//! 4. Group interruptibility following its executing members
//! 5. Teardown of the current step and children on cancel

use robocmd_scheduler::prelude::*;

use super::mock::{SimRobot, assert_state};

#[test]
fn parallel_commands() {
    let mut sim = SimRobot::new();
    let (c1, mock1) = sim.mock("Command1");
    let (c2, mock2) = sim.mock("Command2");
    let group = sim.sched.create_group("Parallel");
    sim.sched.add_parallel(group, c1).unwrap();
    sim.sched.add_parallel(group, c2).unwrap();

    assert_state(&mock1, 0, 0, 0, 0, 0);
    assert_state(&mock2, 0, 0, 0, 0, 0);
    sim.sched.start(group).unwrap();
    assert_state(&mock1, 0, 0, 0, 0, 0);
    assert_state(&mock2, 0, 0, 0, 0, 0);
    sim.run();
    assert_state(&mock1, 0, 0, 0, 0, 0);
    assert_state(&mock2, 0, 0, 0, 0, 0);
    sim.run();
    assert_state(&mock1, 1, 1, 1, 0, 0);
    assert_state(&mock2, 1, 1, 1, 0, 0);
    assert_eq!(sim.sched.children_running(group), 2);
    sim.run();
    assert_state(&mock1, 1, 2, 2, 0, 0);
    assert_state(&mock2, 1, 2, 2, 0, 0);
    mock1.set_has_finished(true);
    sim.run();
    assert_state(&mock1, 1, 3, 3, 1, 0);
    assert_state(&mock2, 1, 3, 3, 0, 0);
    sim.run();
    assert_state(&mock1, 1, 3, 3, 1, 0);
    assert_state(&mock2, 1, 4, 4, 0, 0);
    mock2.set_has_finished(true);
    sim.run();
    assert_state(&mock1, 1, 3, 3, 1, 0);
    assert_state(&mock2, 1, 5, 5, 1, 0);

    assert!(!sim.sched.is_active(group));
    assert!(sim.sched.command(group).unwrap().is_completed());
}

#[test]
fn three_commands_on_one_subsystem() {
    let mut sim = SimRobot::new();
    let subsystem = sim.sched.register_subsystem("Three Command Test Subsystem");
    let (c1, mock1) = sim.mock_requiring("Command1", subsystem);
    let (c2, mock2) = sim.mock_requiring("Command2", subsystem);
    let (c3, mock3) = sim.mock_requiring("Command3", subsystem);

    let group = sim.sched.create_group("Sequence");
    sim.sched.add_sequential_with_timeout(group, c1, 1.0).unwrap();
    sim.sched.add_sequential_with_timeout(group, c2, 2.0).unwrap();
    sim.sched.add_sequential(group, c3).unwrap();

    sim.sched.start(group).unwrap();
    assert_state(&mock1, 0, 0, 0, 0, 0);
    sim.run();
    assert_state(&mock1, 0, 0, 0, 0, 0);
    assert_state(&mock2, 0, 0, 0, 0, 0);
    assert_state(&mock3, 0, 0, 0, 0, 0);
    assert_eq!(sim.sched.current_command(subsystem), Some(group));

    sim.run();
    assert_state(&mock1, 1, 1, 1, 0, 0);
    assert_state(&mock2, 0, 0, 0, 0, 0);
    assert_state(&mock3, 0, 0, 0, 0, 0);
    sim.clock.advance(1.0); // command 1 timeout

    sim.run();
    assert_state(&mock1, 1, 1, 1, 0, 1);
    assert_state(&mock2, 1, 1, 1, 0, 0);
    assert_state(&mock3, 0, 0, 0, 0, 0);

    sim.run();
    assert_state(&mock1, 1, 1, 1, 0, 1);
    assert_state(&mock2, 1, 2, 2, 0, 0);
    assert_state(&mock3, 0, 0, 0, 0, 0);
    sim.clock.advance(2.0); // command 2 timeout

    sim.run();
    assert_state(&mock1, 1, 1, 1, 0, 1);
    assert_state(&mock2, 1, 2, 2, 0, 1);
    assert_state(&mock3, 1, 1, 1, 0, 0);

    sim.run();
    assert_state(&mock3, 1, 2, 2, 0, 0);
    mock3.set_has_finished(true);
    assert_state(&mock3, 1, 2, 2, 0, 0);

    sim.run();
    assert_state(&mock1, 1, 1, 1, 0, 1);
    assert_state(&mock2, 1, 2, 2, 0, 1);
    assert_state(&mock3, 1, 3, 3, 1, 0);

    sim.run();
    assert_state(&mock1, 1, 1, 1, 0, 1);
    assert_state(&mock2, 1, 2, 2, 0, 1);
    assert_state(&mock3, 1, 3, 3, 1, 0);
    assert_eq!(sim.sched.current_command(subsystem), None);
}

#[test]
fn later_entry_cancels_conflicting_child() {
    let mut sim = SimRobot::new();
    let t = sim.sched.register_subsystem("T");
    let (a, mock_a) = sim.mock("A");
    let (b, mock_b) = sim.mock_requiring("B", t);
    let (d, mock_d) = sim.mock("D");
    let (c, mock_c) = sim.mock_requiring("C", t);

    let group = sim.sched.create_group("Auto");
    sim.sched.add_sequential(group, a).unwrap();
    sim.sched.add_parallel(group, b).unwrap();
    sim.sched.add_sequential(group, d).unwrap();
    sim.sched.add_sequential(group, c).unwrap();

    sim.sched.start(group).unwrap();
    sim.run_n(2);
    assert_state(&mock_a, 1, 1, 1, 0, 0);
    assert_state(&mock_b, 0, 0, 0, 0, 0);

    mock_a.set_has_finished(true);
    sim.run();
    assert_state(&mock_a, 1, 2, 2, 1, 0);
    assert_state(&mock_b, 1, 1, 1, 0, 0);
    assert_state(&mock_d, 1, 1, 1, 0, 0);
    assert!(sim.sched.is_running(b));

    mock_d.set_has_finished(true);
    sim.run();
    assert_state(&mock_d, 1, 2, 2, 1, 0);
    assert_state(&mock_b, 1, 1, 1, 0, 1);
    assert_state(&mock_c, 1, 1, 1, 0, 0);
    assert!(!sim.sched.is_running(b));
    assert_eq!(sim.sched.children_running(group), 0);
}

#[test]
fn group_is_as_interruptible_as_its_executing_members() {
    let mut sim = SimRobot::new();
    let s = sim.sched.register_subsystem("S");
    let (x, mock_x) = sim.mock_requiring("X", s);
    sim.sched.set_interruptible(x, false).unwrap();
    let (y, mock_y) = sim.mock_requiring("Y", s);
    let group = sim.sched.create_group("Guarded");
    sim.sched.add_sequential(group, x).unwrap();
    sim.sched.add_sequential(group, y).unwrap();
    let (intruder, mock_n) = sim.mock_requiring("Intruder", s);

    sim.sched.start(group).unwrap();
    sim.run_n(2);
    assert!(!sim.sched.is_interruptible(group));

    sim.sched.start(intruder).unwrap();
    sim.run();
    assert_eq!(sim.sched.current_command(s), Some(group));
    assert_state(&mock_n, 0, 0, 0, 0, 0);

    mock_x.set_has_finished(true);
    sim.sched.start(intruder).unwrap();
    sim.run();
    assert_state(&mock_x, 1, 3, 3, 1, 0);
    assert_state(&mock_y, 1, 1, 1, 0, 1);
    assert_eq!(sim.sched.current_command(s), Some(intruder));
    assert!(!sim.sched.is_active(group));
    sim.run();
    assert_state(&mock_n, 1, 1, 1, 0, 0);
}

#[test]
fn wait_for_children_blocks_the_sequence() {
    let mut sim = SimRobot::new();
    let (p, mock_p) = sim.mock("Parallel");
    let wait = sim.sched.create_wait_for_children("WaitForChildren");
    let (z, mock_z) = sim.mock("After");
    let group = sim.sched.create_group("Auto");
    sim.sched.add_parallel(group, p).unwrap();
    sim.sched.add_sequential(group, wait).unwrap();
    sim.sched.add_sequential(group, z).unwrap();

    sim.sched.start(group).unwrap();
    sim.run_n(3);
    assert_state(&mock_p, 1, 2, 2, 0, 0);
    assert!(sim.sched.is_running(wait));

    mock_p.set_has_finished(true);
    sim.run();
    assert_state(&mock_p, 1, 3, 3, 1, 0);
    assert_state(&mock_z, 0, 0, 0, 0, 0);

    sim.run();
    assert!(!sim.sched.is_running(wait));
    assert_state(&mock_z, 1, 1, 1, 0, 0);
}

#[test]
fn parallel_child_timeout() {
    let mut sim = SimRobot::new();
    let (p, mock_p) = sim.mock("Slow");
    let wait = sim.sched.create_wait_for_children("WaitForChildren");
    let group = sim.sched.create_group("Auto");
    sim.sched.add_parallel_with_timeout(group, p, 1.0).unwrap();
    sim.sched.add_sequential(group, wait).unwrap();

    sim.sched.start(group).unwrap();
    sim.run_n(2);
    assert_state(&mock_p, 1, 1, 1, 0, 0);
    sim.clock.advance(1.0);
    sim.run();
    assert_state(&mock_p, 1, 1, 1, 0, 1);
    assert!(sim.sched.is_active(group));
    sim.run();
    assert!(!sim.sched.is_active(group));
}

#[test]
fn peers_run_as_top_level_commands() {
    let mut sim = SimRobot::new();
    let group = sim.sched.create_group("Auto");
    let (q, mock_q) = sim.mock("Peer");
    let (r, mock_r) = sim.mock("Step");
    sim.sched.add_peer(group, q).unwrap();
    sim.sched.add_sequential(group, r).unwrap();

    sim.sched.start(group).unwrap();
    sim.run_n(2);
    assert!(sim.sched.is_active(q));
    assert_state(&mock_r, 1, 1, 1, 0, 0);
    assert_state(&mock_q, 0, 0, 0, 0, 0);
    sim.run();
    assert_state(&mock_q, 1, 1, 1, 0, 0);

    sim.sched.cancel(group).unwrap();
    sim.run();
    assert!(!sim.sched.is_active(group));
    assert_state(&mock_r, 1, 2, 2, 0, 1);
    assert_state(&mock_q, 1, 2, 2, 0, 0);
    assert!(sim.sched.is_active(q));
}

#[test]
fn canceled_group_interrupts_step_and_children() {
    let mut sim = SimRobot::new();
    let s = sim.sched.register_subsystem("S");
    let (b, mock_b) = sim.mock("Branch");
    let (a, mock_a) = sim.mock_requiring("Step", s);
    let group = sim.sched.create_group("Auto");
    sim.sched.add_parallel(group, b).unwrap();
    sim.sched.add_sequential(group, a).unwrap();

    sim.sched.start(group).unwrap();
    sim.run_n(2);
    assert_state(&mock_a, 1, 1, 1, 0, 0);
    assert_state(&mock_b, 1, 1, 1, 0, 0);

    sim.sched.cancel(group).unwrap();
    sim.run();
    assert_state(&mock_a, 1, 1, 1, 0, 1);
    assert_state(&mock_b, 1, 1, 1, 0, 1);
    assert_eq!(sim.sched.current_command(s), None);
    assert!(!sim.sched.is_running(a));
    assert!(!sim.sched.is_running(b));
}

#[test]
fn nested_groups_advance_through_inner_sequence() {
    let mut sim = SimRobot::new();
    let (a, mock_a) = sim.mock("Inner");
    let (c, mock_c) = sim.mock("Outer");
    let inner = sim.sched.create_group("InnerGroup");
    sim.sched.add_sequential(inner, a).unwrap();
    let outer = sim.sched.create_group("OuterGroup");
    sim.sched.add_sequential(outer, inner).unwrap();
    sim.sched.add_sequential(outer, c).unwrap();

    sim.sched.start(outer).unwrap();
    sim.run_n(2);
    assert_state(&mock_a, 1, 1, 1, 0, 0);
    assert_state(&mock_c, 0, 0, 0, 0, 0);

    mock_a.set_has_finished(true);
    sim.run();
    assert_state(&mock_a, 1, 2, 2, 1, 0);
    assert_state(&mock_c, 1, 1, 1, 0, 0);
    assert!(sim.sched.command(inner).unwrap().is_completed());
}

#[test]
fn members_can_not_be_started_directly() {
    let mut sim = SimRobot::new();
    let (a, _) = sim.mock("Member");
    let group = sim.sched.create_group("Auto");
    sim.sched.add_sequential(group, a).unwrap();

    let err = sim.sched.start(a).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalTopology);
    assert_eq!(sim.sched.command(a).unwrap().group(), Some(group));
    sim.run();
    assert!(!sim.sched.is_active(a));
}
