//! Fixed-period robot loop driving [`Scheduler::run`].
//!
//! Paces ticks with `thread::sleep`, measures each tick and counts
//! overruns (ticks that took longer than the period). Stops when the
//! running flag is cleared (e.g. from a Ctrl-C handler) or after the
//! configured number of ticks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use robocmd_common::config::RobotLoopConfig;
use tracing::{info, warn};

use crate::scheduler::Scheduler;

// ─── Tick Statistics ────────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total ticks executed.
    pub tick_count: u64,
    /// Last tick duration [ns].
    pub last_tick_ns: u64,
    /// Minimum tick duration [ns].
    pub min_tick_ns: u64,
    /// Maximum tick duration [ns].
    pub max_tick_ns: u64,
    /// Running sum for average computation.
    pub sum_tick_ns: u128,
    /// Ticks that exceeded the period.
    pub overruns: u64,
}

impl CycleStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            tick_count: 0,
            last_tick_ns: 0,
            min_tick_ns: u64::MAX,
            max_tick_ns: 0,
            sum_tick_ns: 0,
            overruns: 0,
        }
    }

    /// Record a tick duration.
    #[inline]
    pub fn record(&mut self, duration: Duration, period: Duration) {
        let ns = saturating_u64(duration.as_nanos());
        self.tick_count += 1;
        self.last_tick_ns = ns;
        self.min_tick_ns = self.min_tick_ns.min(ns);
        self.max_tick_ns = self.max_tick_ns.max(ns);
        self.sum_tick_ns += u128::from(ns);
        if duration > period {
            self.overruns += 1;
        }
    }

    /// Average tick time [ns] (0 if no ticks).
    #[inline]
    pub fn avg_tick_ns(&self) -> u64 {
        if self.tick_count == 0 {
            0
        } else {
            saturating_u64(self.sum_tick_ns / u128::from(self.tick_count))
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp a `Duration` reading to `u64`.
#[inline]
fn saturating_u64(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

// ─── Loop ───────────────────────────────────────────────────────────

/// Periodic driver for a scheduler.
#[derive(Debug)]
pub struct RobotLoop {
    period: Duration,
    max_ticks: u64,
    running: Arc<AtomicBool>,
    stats: CycleStats,
}

impl RobotLoop {
    /// Create a loop from configuration. `max_ticks == 0` means unbounded.
    pub fn new(config: &RobotLoopConfig) -> Self {
        Self {
            period: config.period(),
            max_ticks: config.max_ticks,
            running: Arc::new(AtomicBool::new(true)),
            stats: CycleStats::new(),
        }
    }

    /// Shared flag; storing `false` stops the loop after the current tick.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Statistics gathered so far.
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Run until stopped.
    pub fn run(&mut self, scheduler: &mut Scheduler) -> &CycleStats {
        self.run_with(scheduler, |_, _| {})
    }

    /// Run until stopped, calling `before_tick` with the tick number ahead
    /// of every scheduler tick.
    pub fn run_with(
        &mut self,
        scheduler: &mut Scheduler,
        mut before_tick: impl FnMut(&mut Scheduler, u64),
    ) -> &CycleStats {
        info!(
            period_ms = saturating_u64(self.period.as_millis()),
            max_ticks = self.max_ticks,
            "robot loop starting"
        );

        while self.running.load(Ordering::SeqCst) {
            if self.max_ticks != 0 && self.stats.tick_count >= self.max_ticks {
                break;
            }
            let tick_start = Instant::now();

            before_tick(scheduler, self.stats.tick_count);
            scheduler.run();

            let elapsed = tick_start.elapsed();
            self.stats.record(elapsed, self.period);
            if elapsed > self.period {
                let overruns = self.stats.overruns;
                if overruns <= 10 || overruns % 1000 == 0 {
                    warn!(
                        overruns,
                        tick_us = saturating_u64(elapsed.as_micros()),
                        period_us = saturating_u64(self.period.as_micros()),
                        "tick overrun"
                    );
                }
            } else {
                std::thread::sleep(self.period - elapsed);
            }
        }

        info!(
            ticks = self.stats.tick_count,
            avg_tick_ns = self.stats.avg_tick_ns(),
            max_tick_ns = self.stats.max_tick_ns,
            overruns = self.stats.overruns,
            "robot loop stopped"
        );
        &self.stats
    }
}
