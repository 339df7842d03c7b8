//! # Tick Loop
//!
//! Turns wall-clock time into fixed-size economy ticks:
//! ```text
//! poll():
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. MEASURE                                                          │
//! │    └─ elapsed since last poll → accumulator                         │
//! │                                                                     │
//! │ 2. BACKLOG                                                          │
//! │    └─ more than max_ticks_per_poll steps behind? credit the excess  │
//! │       through offline catch-up instead of spinning                  │
//! │                                                                     │
//! │ 3. TICK (while accumulator ≥ step)                                  │
//! │    ├─ session.tick(step)                                            │
//! │    ├─ forward drained events to the bus                             │
//! │    └─ record timing, warn on slow ticks                             │
//! │                                                                     │
//! │ 4. KEEP REMAINDER                                                   │
//! │    └─ sub-step leftover waits for the next poll                     │
//! │                                                                     │
//! │ 5. AUTOSAVE                                                         │
//! │    └─ every `autosave.every` of time fed in, if configured          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every tick has the same `dt`, so a session replayed from a save with the
//! same elapsed times produces the same state. A paused loop drops the time
//! fed to it: nothing accrues, nothing is credited as offline time.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use alembic_economy::EconomyResult;

use crate::events::EventSender;
use crate::persistence::save_session;
use crate::session::GameSession;

/// Highest tick rate the loop runs at.
pub const MAX_TICK_HZ: u32 = 60;

/// Target tick time at 60 Hz.
pub const TARGET_TICK_TIME: Duration = Duration::from_micros(16_666);

/// Tick time above which a warning is logged.
pub const MAX_TICK_TIME: Duration = Duration::from_millis(33);

/// Default running time between autosaves.
pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(10);

/// Where and how often the loop saves its session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutosaveConfig {
    /// Save file written on each autosave.
    pub path: PathBuf,
    /// Running time between saves; paused time does not count.
    pub every: Duration,
}

impl AutosaveConfig {
    /// Autosaves to `path` every [`AUTOSAVE_INTERVAL`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            every: AUTOSAVE_INTERVAL,
        }
    }
}

/// Configuration for the tick loop.
#[derive(Clone, Debug)]
pub struct TickLoopConfig {
    /// Ticks per second, clamped to `1..=MAX_TICK_HZ`.
    pub tick_hz: u32,
    /// Most ticks run by one poll; older backlog goes through offline catch-up.
    pub max_ticks_per_poll: u32,
    /// Log ticks slower than [`MAX_TICK_TIME`].
    pub slow_tick_warnings: bool,
    /// Periodic saves; `None` disables them.
    pub autosave: Option<AutosaveConfig>,
}

impl Default for TickLoopConfig {
    fn default() -> Self {
        Self {
            tick_hz: MAX_TICK_HZ,
            max_ticks_per_poll: 4 * MAX_TICK_HZ,
            slow_tick_warnings: true,
            autosave: None,
        }
    }
}

/// Timing for one tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    /// Tick number.
    pub tick: u64,
    /// Simulated seconds.
    pub dt_seconds: f64,
    /// Wall time spent in the tick, microseconds.
    pub elapsed_us: u64,
    /// Events forwarded to the bus.
    pub events_forwarded: usize,
    /// Tiers that overflowed.
    pub overflows: usize,
}

/// Fixed-timestep driver for one [`GameSession`].
pub struct TickLoop {
    config: TickLoopConfig,
    step: Duration,
    accumulator: Duration,
    last_poll: Instant,
    tick_count: u64,
    caught_up: Duration,
    paused: bool,
    since_save: Duration,
    autosaves: u64,
    stats: TickStatsAccumulator,
}

impl TickLoop {
    /// Creates a loop; the clock starts now.
    #[must_use]
    pub fn new(config: TickLoopConfig) -> Self {
        let hz = config.tick_hz.clamp(1, MAX_TICK_HZ);
        Self {
            step: Duration::from_nanos(1_000_000_000 / u64::from(hz)),
            config,
            accumulator: Duration::ZERO,
            last_poll: Instant::now(),
            tick_count: 0,
            caught_up: Duration::ZERO,
            paused: false,
            since_save: Duration::ZERO,
            autosaves: 0,
            stats: TickStatsAccumulator::new(),
        }
    }

    /// Simulated time per tick.
    #[inline]
    #[must_use]
    pub const fn step(&self) -> Duration {
        self.step
    }

    /// Ticks run so far.
    #[inline]
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Backlog credited through offline catch-up so far.
    #[must_use]
    pub const fn caught_up(&self) -> Duration {
        self.caught_up
    }

    /// Accumulated statistics.
    #[must_use]
    pub const fn stats(&self) -> &TickStatsAccumulator {
        &self.stats
    }

    /// Successful autosaves so far.
    #[must_use]
    pub const fn autosaves(&self) -> u64 {
        self.autosaves
    }

    /// Whether updates are suspended.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Suspends updates. Any partial step waiting in the loop is discarded.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.accumulator = Duration::ZERO;
            tracing::info!(tick = self.tick_count, "tick loop paused");
        }
    }

    /// Resumes updates; the clock restarts now, so the pause is not replayed.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.last_poll = Instant::now();
            tracing::info!(tick = self.tick_count, "tick loop resumed");
        }
    }

    /// Flips between paused and running; returns `true` if now paused.
    pub fn toggle_pause(&mut self) -> bool {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
        self.paused
    }

    /// Feeds `elapsed` wall time into the loop and runs the ticks it covers.
    ///
    /// Returns the number of ticks run; always `0` while paused.
    ///
    /// # Errors
    ///
    /// Propagates the first economy error; ticks already run stay applied.
    /// A failed autosave is logged, not returned.
    pub fn advance(&mut self, elapsed: Duration, session: &GameSession, events: &EventSender) -> EconomyResult<u32> {
        if self.paused {
            return Ok(0);
        }
        self.accumulator += elapsed;
        self.since_save += elapsed;

        let budget = self.step * self.config.max_ticks_per_poll;
        if self.accumulator > budget {
            let excess = self.accumulator - budget;
            self.accumulator = budget;
            let report = session.offline_catch_up(excess.as_secs_f64())?;
            self.caught_up += excess;
            tracing::info!(
                behind_ms = excess.as_millis() as u64,
                steps = report.steps,
                "tick loop behind, backlog credited as offline time"
            );
        }

        let mut ran = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            self.run_tick(session, events)?;
            ran += 1;
        }
        self.maybe_autosave(session);
        Ok(ran)
    }

    /// Measures time since the previous poll and advances by it.
    ///
    /// # Errors
    ///
    /// See [`TickLoop::advance`].
    pub fn poll(&mut self, session: &GameSession, events: &EventSender) -> EconomyResult<u32> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_poll);
        self.last_poll = now;
        self.advance(elapsed, session, events)
    }

    /// Polls until `running` is cleared, sleeping out the rest of each step.
    ///
    /// # Errors
    ///
    /// Stops at the first economy error.
    pub fn run(&mut self, session: &GameSession, events: &EventSender, running: &AtomicBool) -> EconomyResult<()> {
        self.last_poll = Instant::now();
        while running.load(Ordering::Acquire) {
            let started = Instant::now();
            self.poll(session, events)?;
            std::thread::sleep(self.step.saturating_sub(started.elapsed()));
        }
        tracing::info!(ticks = self.tick_count, "tick loop stopped");
        Ok(())
    }

    fn maybe_autosave(&mut self, session: &GameSession) {
        let Some(autosave) = &self.config.autosave else {
            return;
        };
        if self.since_save < autosave.every {
            return;
        }
        self.since_save = Duration::ZERO;
        match save_session(&autosave.path, session) {
            Ok(()) => self.autosaves += 1,
            Err(err) => tracing::warn!(%err, path = %autosave.path.display(), "autosave failed"),
        }
    }

    fn run_tick(&mut self, session: &GameSession, events: &EventSender) -> EconomyResult<TickStats> {
        let started = Instant::now();
        let report = session.tick(self.step.as_secs_f64())?;
        let forwarded = session.forward_events(events);
        let elapsed = started.elapsed();

        let stats = TickStats {
            tick: self.tick_count,
            dt_seconds: self.step.as_secs_f64(),
            elapsed_us: elapsed.as_micros() as u64,
            events_forwarded: forwarded,
            overflows: report.overflows.len(),
        };
        self.tick_count += 1;
        self.stats.record(stats);

        if self.config.slow_tick_warnings && elapsed > MAX_TICK_TIME {
            tracing::warn!(
                tick = stats.tick,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = TARGET_TICK_TIME.as_secs_f64() * 1000.0,
                "tick exceeded budget"
            );
        }
        Ok(stats)
    }
}

/// Accumulator for tick statistics.
#[derive(Clone, Debug)]
pub struct TickStatsAccumulator {
    /// Ticks recorded.
    pub ticks_recorded: u64,
    /// Sum of tick times.
    pub total_us_sum: u64,
    /// Fastest tick.
    pub min_tick_us: u64,
    /// Slowest tick.
    pub max_tick_us: u64,
    /// Ticks slower than [`TARGET_TICK_TIME`].
    pub ticks_over_budget: u64,
    /// Events forwarded across all ticks.
    pub events_forwarded: u64,
    /// Overflows across all ticks.
    pub overflows: u64,
}

impl TickStatsAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ticks_recorded: 0,
            total_us_sum: 0,
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            ticks_over_budget: 0,
            events_forwarded: 0,
            overflows: 0,
        }
    }

    /// Records one tick.
    pub fn record(&mut self, stats: TickStats) {
        self.ticks_recorded += 1;
        self.total_us_sum += stats.elapsed_us;
        self.min_tick_us = self.min_tick_us.min(stats.elapsed_us);
        self.max_tick_us = self.max_tick_us.max(stats.elapsed_us);
        self.events_forwarded += stats.events_forwarded as u64;
        self.overflows += stats.overflows as u64;

        if stats.elapsed_us > TARGET_TICK_TIME.as_micros() as u64 {
            self.ticks_over_budget += 1;
        }
    }

    /// Average tick time in milliseconds.
    #[must_use]
    pub fn avg_tick_ms(&self) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.ticks_recorded as f64) / 1000.0
    }

    /// Share of ticks over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        self.ticks_over_budget as f64 / self.ticks_recorded as f64
    }

    /// Logs a one-line summary.
    pub fn log_summary(&self) {
        tracing::info!(
            ticks = self.ticks_recorded,
            avg_ms = self.avg_tick_ms(),
            max_ms = self.max_tick_us as f64 / 1000.0,
            over_budget = self.ticks_over_budget,
            events = self.events_forwarded,
            overflows = self.overflows,
            "tick statistics"
        );
    }
}

impl Default for TickStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
