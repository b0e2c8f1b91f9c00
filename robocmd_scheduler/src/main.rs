//! # robocmd Runner
//!
//! Drives a small simulated robot (drivetrain + elevator) through the
//! command scheduler at a fixed period: a default teleop command on the
//! drivetrain, an autonomous routine built from a command group, and a
//! simulated operator button.
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults (20 ms period, until Ctrl-C)
//! robocmd
//!
//! # Load configuration, stop after 500 ticks
//! robocmd --config robocmd.toml --ticks 500
//!
//! # Verbose JSON logging
//! robocmd -v --json
//! ```

use clap::Parser;
use robocmd_common::config::{ConfigError, ConfigLoader, RobocmdConfig};
use robocmd_common::hal::{MonotonicClock, SimRobotState};
use robocmd_common::telemetry::MemoryTable;
use robocmd_scheduler::prelude::*;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{Level, debug, error, info};
use tracing_subscriber::EnvFilter;

/// robocmd - command scheduler runner
#[derive(Parser, Debug)]
#[command(name = "robocmd")]
#[command(version)]
#[command(about = "Runs a simulated robot through the command scheduler")]
#[command(long_about = None)]
struct Args {
    /// Path to configuration file (robocmd.toml). Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop after this many ticks (overrides robot_loop.max_ticks).
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // The subscriber's level comes from the file, so load errors go to stderr.
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("robocmd: {e}");
            process::exit(1);
        }
    };
    setup_tracing(&args, &config);

    info!(
        "robocmd v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    if let Err(e) = run(&config) {
        error!("robocmd failed: {e}");
        process::exit(1);
    }
}

/// Load `--config` (or defaults), apply command-line overrides and validate.
fn load_config(args: &Args) -> Result<RobocmdConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => RobocmdConfig::load(path)?,
        None => RobocmdConfig::default(),
    };
    if let Some(ticks) = args.ticks {
        config.robot_loop.max_ticks = ticks;
    }
    config.validate()?;
    Ok(config)
}

fn run(config: &RobocmdConfig) -> Result<(), Box<dyn std::error::Error>> {
    let robot = Arc::new(SimRobotState::enabled());
    let table = MemoryTable::new();
    let mut sched = Scheduler::new(
        &config.scheduler,
        Arc::new(MonotonicClock::new()),
        robot.clone(),
    )
    .with_telemetry(table.clone());

    let demo = build_robot(&mut sched)?;
    sched.start(demo.autonomous)?;

    let mut robot_loop = RobotLoop::new(&config.robot_loop);
    let running = robot_loop.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    let stats = robot_loop
        .run_with(&mut sched, |sched, tick| {
            // The simulated operator taps the score button a few seconds in.
            demo.score_button.store(tick % 250 == 150, Ordering::Relaxed);
            if tick == 1000 {
                info!("simulated disable");
                robot.set_disabled(true);
            }
            if tick == 1050 {
                info!("simulated enable");
                robot.set_disabled(false);
                let _ = sched.start(demo.autonomous);
            }
        })
        .clone();

    debug!("telemetry: {}", table.snapshot_json()?);
    info!(
        ticks = stats.tick_count,
        avg_tick_ns = stats.avg_tick_ns(),
        overruns = stats.overruns,
        errors = sched.error_count(),
        "robocmd shutdown complete"
    );
    Ok(())
}

/// Handles the tick callback needs.
struct Demo {
    autonomous: CommandId,
    score_button: Arc<std::sync::atomic::AtomicBool>,
}

/// Teleop hold: never finishes, interrupted by anything needing the drive.
struct HoldDrive;

impl Runnable for HoldDrive {
    fn initialize(&mut self, ctx: &mut CommandContext<'_>) {
        debug!(command = ctx.name(), "holding drivetrain");
    }

    fn is_finished(&mut self, _ctx: &CommandContext<'_>) -> bool {
        false
    }
}

/// Drives for the command's timeout, logging progress.
struct DriveForward {
    speed: f64,
}

impl Runnable for DriveForward {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) {
        debug!(
            command = ctx.name(),
            speed = self.speed,
            elapsed = ctx.time_since_initialized(),
            "driving"
        );
    }

    fn is_finished(&mut self, _ctx: &CommandContext<'_>) -> bool {
        false
    }

    fn end(&mut self, interrupted: bool, ctx: &mut CommandContext<'_>) {
        info!(command = ctx.name(), interrupted, "drive stopped");
    }
}

fn build_robot(sched: &mut Scheduler) -> Result<Demo, CommandError> {
    let drive = sched.register_subsystem("Drivetrain");
    let elevator = sched.register_subsystem("Elevator");

    let hold = sched.new_command("HoldDrive", HoldDrive).requires(drive).finish()?;
    sched.set_default_command(drive, Some(hold))?;

    let forward = sched.create_timed("DriveForward", 2.0, DriveForward { speed: 0.6 })?;
    sched.requires(forward, drive)?;
    let raise = sched.create_wait("RaiseElevator", 1.0)?;
    sched.requires(raise, elevator)?;

    let autonomous = sched.create_group("Autonomous");
    let announce = sched.create_print("autonomous started");
    let wait_children = sched.create_wait_for_children("WaitForElevator");
    let done = sched.create_print("autonomous finished");
    sched.add_sequential(autonomous, announce)?;
    sched.add_parallel(autonomous, raise)?;
    sched.add_sequential_with_timeout(autonomous, forward, 3.0)?;
    sched.add_sequential(autonomous, wait_children)?;
    sched.add_sequential(autonomous, done)?;

    let score = sched.create_wait("Score", 0.5)?;
    sched.requires(score, elevator)?;
    let score_button = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let pressed = Arc::clone(&score_button);
    sched.when_pressed(move || pressed.load(Ordering::Relaxed), score);

    Ok(Demo {
        autonomous,
        score_button,
    })
}

/// Setup tracing subscriber based on CLI arguments and configuration.
fn setup_tracing(args: &Args, config: &RobocmdConfig) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.shared.log_level.as_directive()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
