//! # Game Session
//!
//! **One game state, one lock.**
//!
//! A [`GameSession`] owns a [`Workshop`] and the [`SeededRandom`] its crafts
//! draw from, behind a single `parking_lot::Mutex`. The tick loop and the
//! command handlers can live on different threads; each call takes the lock
//! once, so a craft never observes half a tick.
//!
//! Sessions are independent: two sessions share nothing but the read-only
//! config `Arc`.

use std::fmt;
use std::sync::Arc;

use alembic_economy::{
    AdvanceReport, AlchemyEvent, BatchId, CraftReport, CraftRequest, EconomyConfig, EconomyResult, EquipmentId,
    ExperimentRequest, OfflineReport, OverflowEvent, RandomState, ScaledNumber, SeededRandom, Tier, Workshop,
    WorkshopState,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::events::EventSender;

// ============================================================================
// Persisted form
// ============================================================================

/// Everything a save file holds: the workshop and where its generator stands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Random generator position.
    pub rng: RandomState,
    /// Game state.
    pub workshop: WorkshopState,
}

// ============================================================================
// Snapshots
// ============================================================================

/// One tier as the presentation layer shows it.
#[derive(Clone, Debug, PartialEq)]
pub struct TierSnapshot {
    /// Which tier.
    pub tier: Tier,
    /// Current stock.
    pub amount: ScaledNumber,
    /// Storage cap.
    pub capacity: ScaledNumber,
    /// Stock formatted with the configured number policy.
    pub display: String,
}

/// Read-only summary of a session, taken under one lock.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    /// Every tier, lowest first.
    pub tiers: Vec<TierSnapshot>,
    /// Stored batches.
    pub batches: usize,
    /// Alchemist XP.
    pub xp: u64,
    /// Alchemist level.
    pub level: u32,
    /// Recipes known.
    pub recipes_known: usize,
    /// Successful crafts across all recipes.
    pub crafted: u64,
    /// Events waiting to be drained.
    pub pending_events: usize,
}

impl SessionSnapshot {
    /// Snapshot of one tier.
    #[must_use]
    pub fn tier(&self, tier: Tier) -> Option<&TierSnapshot> {
        self.tiers.iter().find(|t| t.tier == tier)
    }
}

impl fmt::Display for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "level {} ({} xp) | {} batches | {} recipes known | {} crafted",
            self.level, self.xp, self.batches, self.recipes_known, self.crafted
        )?;
        for tier in &self.tiers {
            writeln!(f, "  {:<12} {}", tier.tier.name(), tier.display)?;
        }
        Ok(())
    }
}

// ============================================================================
// Session
// ============================================================================

struct SessionInner {
    workshop: Workshop,
    rng: SeededRandom,
}

/// A workshop and its generator behind one lock.
pub struct GameSession {
    config: Arc<EconomyConfig>,
    seed: u64,
    inner: Mutex<SessionInner>,
}

impl GameSession {
    /// Starts a fresh game.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the config cannot build a workshop.
    pub fn new(config: Arc<EconomyConfig>, seed: u64) -> EconomyResult<Self> {
        let workshop = Workshop::new(Arc::clone(&config))?;
        tracing::info!(seed, "session started");
        Ok(Self {
            config,
            seed,
            inner: Mutex::new(SessionInner {
                workshop,
                rng: SeededRandom::new(seed),
            }),
        })
    }

    /// Resumes a saved game.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the saved workshop does not fit the config.
    pub fn from_state(config: Arc<EconomyConfig>, state: &SessionState) -> EconomyResult<Self> {
        let workshop = Workshop::from_state(Arc::clone(&config), &state.workshop)?;
        tracing::info!(seed = state.rng.seed, draws = state.rng.draws, "session resumed");
        Ok(Self {
            config,
            seed: state.rng.seed,
            inner: Mutex::new(SessionInner {
                workshop,
                rng: SeededRandom::from_state(state.rng),
            }),
        })
    }

    /// Shared config.
    #[must_use]
    pub fn config(&self) -> &Arc<EconomyConfig> {
        &self.config
    }

    /// Seed the generator started from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Throws the game away and starts over from the config and seed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the config cannot build a workshop.
    pub fn reset(&self) -> EconomyResult<()> {
        let workshop = Workshop::new(Arc::clone(&self.config))?;
        let mut inner = self.inner.lock();
        inner.workshop = workshop;
        inner.rng = SeededRandom::new(self.seed);
        tracing::info!(seed = self.seed, "session reset");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Advances the game by `dt` seconds.
    ///
    /// # Errors
    ///
    /// See [`Workshop::tick`].
    pub fn tick(&self, dt: f64) -> EconomyResult<AdvanceReport> {
        self.inner.lock().workshop.tick(dt)
    }

    /// Harvests one click worth of Smiles.
    ///
    /// # Errors
    ///
    /// See [`Workshop::click`].
    pub fn click(&self) -> EconomyResult<Option<OverflowEvent>> {
        self.inner.lock().workshop.click()
    }

    /// Credits time spent away.
    ///
    /// # Errors
    ///
    /// See [`Workshop::offline_catch_up`].
    pub fn offline_catch_up(&self, seconds: f64) -> EconomyResult<OfflineReport> {
        self.inner.lock().workshop.offline_catch_up(seconds)
    }

    /// Bottles tier stock as a batch.
    ///
    /// # Errors
    ///
    /// See [`Workshop::distill`].
    pub fn distill(&self, tier: Tier, amount: ScaledNumber) -> EconomyResult<BatchId> {
        self.inner.lock().workshop.distill(tier, amount)
    }

    /// Purifies a batch; returns its new purity.
    ///
    /// # Errors
    ///
    /// See [`Workshop::purify`].
    pub fn purify(&self, batch: BatchId, intensity: f64) -> EconomyResult<f64> {
        self.inner.lock().workshop.purify(batch, intensity)
    }

    /// Attempts a craft with the session's generator.
    ///
    /// # Errors
    ///
    /// See [`Workshop::craft`].
    pub fn craft(&self, request: &CraftRequest) -> EconomyResult<CraftReport> {
        let mut inner = self.inner.lock();
        let SessionInner { workshop, rng } = &mut *inner;
        workshop.craft(request, rng)
    }

    /// Mixes arbitrary batches with the session's generator.
    ///
    /// # Errors
    ///
    /// See [`Workshop::experiment`].
    pub fn experiment(&self, request: &ExperimentRequest) -> EconomyResult<CraftReport> {
        let mut inner = self.inner.lock();
        let SessionInner { workshop, rng } = &mut *inner;
        workshop.experiment(request, rng)
    }

    /// Repairs damaged equipment.
    ///
    /// # Errors
    ///
    /// See [`Workshop::repair_equipment`].
    pub fn repair_equipment(&self, id: EquipmentId) -> EconomyResult<bool> {
        self.inner.lock().workshop.repair_equipment(id)
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Removes and returns every pending event.
    pub fn drain_events(&self) -> Vec<AlchemyEvent> {
        self.inner.lock().workshop.drain_events()
    }

    /// Drains pending events into the bus; returns how many were delivered.
    pub fn forward_events(&self, sender: &EventSender) -> usize {
        let events = self.drain_events();
        sender.send_all(events)
    }

    /// Runs `f` against the workshop under the lock.
    pub fn with_workshop<T>(&self, f: impl FnOnce(&Workshop) -> T) -> T {
        f(&self.inner.lock().workshop)
    }

    /// Presentation summary.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        let workshop = &inner.workshop;
        SessionSnapshot {
            tiers: workshop
                .ledger()
                .tiers()
                .iter()
                .map(|tier| TierSnapshot {
                    tier: tier.tier(),
                    amount: tier.amount(),
                    capacity: tier.capacity(),
                    display: format!("{} / {}", workshop.format(tier.amount()), workshop.format(tier.capacity())),
                })
                .collect(),
            batches: workshop.ledger().cellar().len(),
            xp: workshop.xp(),
            level: workshop.alchemist_level(),
            recipes_known: workshop.book().discovered_count(),
            crafted: workshop.book().total_crafted(),
            pending_events: workshop.events().len(),
        }
    }

    /// Persisted form of the whole session.
    #[must_use]
    pub fn to_state(&self) -> SessionState {
        let inner = self.inner.lock();
        SessionState {
            rng: inner.rng.to_state(),
            workshop: inner.workshop.to_state(),
        }
    }
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession").field("seed", &self.seed).finish_non_exhaustive()
    }
}
