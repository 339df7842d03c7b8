//! # Workshop
//!
//! **One game state, one owner.**
//!
//! The workshop is the aggregate an external driver talks to: production
//! tiers and stored batches, recipe progress, the equipment rack, unlock
//! rules, the event queue, click power and alchemist XP. Every mutation goes
//! through one of its methods, and every method leaves events behind for the
//! presentation layer instead of calling out to it.
//!
//! ```text
//! driver ── tick(dt) ──┐
//! user ── click() ─────┤
//!       ── craft() ────┼──> Workshop ──> EventQueue ──> presentation
//!       ── distill() ──┘
//! ```
//!
//! The workshop is not thread-safe on its own; a host that drives ticks and
//! commands from different threads wraps it in a single lock.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::EconomyConfig;
use crate::equipment::{EquipmentId, EquipmentRack};
use crate::error::{EconomyError, EconomyResult};
use crate::events::{AlchemyEvent, EventQueue};
use crate::ledger::{AdvanceReport, LedgerState, OverflowEvent, ResourceLedger};
use crate::purity::BatchId;
use crate::random::RandomSource;
use crate::recipe::{RecipeBook, RecipeBookState, RecipeDefinition};
use crate::resolver::{CraftOutcome, CraftReport, CraftRequest, ExperimentRequest, RecipeResolver, Workbench};
use crate::scaled::ScaledNumber;
use crate::tier::{Tier, TierUpgrade};
use crate::unlocks::{Unlock, UnlockId, UnlockRule, UnlockTracker};

// ============================================================================
// Configuration
// ============================================================================

/// Clicks, offline progress and levelling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Smiles harvested per click.
    pub click_power: ScaledNumber,
    /// Longest offline window credited on return (seconds).
    pub max_offline_seconds: f64,
    /// Step used to replay an offline window (seconds).
    pub offline_step_seconds: f64,
    /// XP needed per alchemist level.
    pub xp_per_level: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            click_power: ScaledNumber::from_count(10),
            max_offline_seconds: 8.0 * 3600.0,
            offline_step_seconds: 60.0,
            xp_per_level: 100,
        }
    }
}

impl SessionConfig {
    /// Checks the offline window and level curve.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem.
    pub fn validate(&self) -> EconomyResult<()> {
        if !self.max_offline_seconds.is_finite() || self.max_offline_seconds < 0.0 {
            return Err(EconomyError::InvalidConfig(format!(
                "max offline seconds {}",
                self.max_offline_seconds
            )));
        }
        if !self.offline_step_seconds.is_finite() || self.offline_step_seconds <= 0.0 {
            return Err(EconomyError::InvalidConfig(format!(
                "offline step seconds {}",
                self.offline_step_seconds
            )));
        }
        if self.xp_per_level == 0 {
            return Err(EconomyError::InvalidConfig("xp per level is 0".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Reports and state
// ============================================================================

/// What an offline catch-up credited.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OfflineReport {
    /// Seconds the caller asked for.
    pub requested_seconds: f64,
    /// Seconds actually replayed, after the window cap.
    pub simulated_seconds: f64,
    /// Number of ticks replayed.
    pub steps: u32,
    /// Net amount landed per tier, tiers that gained nothing omitted.
    pub gains: Vec<(Tier, ScaledNumber)>,
    /// Overflows during the replay.
    pub overflows: usize,
}

/// Plain persisted form of a [`Workshop`]. Static content is not saved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkshopState {
    /// Alchemist XP.
    pub xp: u64,
    /// Smiles per click.
    pub click_power: ScaledNumber,
    /// Fired unlock rules.
    #[serde(default)]
    pub unlocked: Vec<UnlockId>,
    /// Tiers and stored batches.
    pub ledger: LedgerState,
    /// Recipe progress and synthesized recipes.
    #[serde(default)]
    pub recipes: RecipeBookState,
    /// Equipment condition and pending penalties.
    #[serde(default)]
    pub equipment: EquipmentRack,
}

// ============================================================================
// Workshop
// ============================================================================

/// The per-game-state aggregate.
#[derive(Clone, Debug)]
pub struct Workshop {
    config: Arc<EconomyConfig>,
    ledger: ResourceLedger,
    book: RecipeBook,
    rack: EquipmentRack,
    unlocks: UnlockTracker,
    events: EventQueue,
    click_power: ScaledNumber,
    xp: u64,
}

impl Workshop {
    /// Starts a fresh game from the config.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the tier table or equipment is inconsistent.
    pub fn new(config: Arc<EconomyConfig>) -> EconomyResult<Self> {
        let ledger = ResourceLedger::new(&config.tiers, config.purity)?;
        let book = RecipeBook::new(recipe_table(&config));
        let rack = EquipmentRack::new(config.equipment.clone())?;
        let unlocks = UnlockTracker::new(unlock_rules(&config));
        let click_power = config.session.click_power;
        Ok(Self {
            config,
            ledger,
            book,
            rack,
            unlocks,
            events: EventQueue::new(),
            click_power,
            xp: 0,
        })
    }

    /// Shared config.
    #[must_use]
    pub fn config(&self) -> &Arc<EconomyConfig> {
        &self.config
    }

    /// Tiers and stored batches.
    #[must_use]
    pub const fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Recipes and progress.
    #[must_use]
    pub const fn book(&self) -> &RecipeBook {
        &self.book
    }

    /// Equipment.
    #[must_use]
    pub const fn rack(&self) -> &EquipmentRack {
        &self.rack
    }

    /// Unlock progress.
    #[must_use]
    pub const fn unlocks(&self) -> &UnlockTracker {
        &self.unlocks
    }

    /// Events not yet drained.
    #[must_use]
    pub const fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Removes and returns every pending event.
    pub fn drain_events(&mut self) -> Vec<AlchemyEvent> {
        self.events.drain()
    }

    /// Smiles per click.
    #[must_use]
    pub const fn click_power(&self) -> ScaledNumber {
        self.click_power
    }

    /// Alchemist XP.
    #[must_use]
    pub const fn xp(&self) -> u64 {
        self.xp
    }

    /// Level derived from XP.
    #[must_use]
    pub fn alchemist_level(&self) -> u32 {
        level_for(self.xp, self.config.session.xp_per_level)
    }

    /// Formats a quantity with the configured number policy.
    #[must_use]
    pub fn format(&self, value: ScaledNumber) -> String {
        value.format_with(&self.config.numbers)
    }

    // ------------------------------------------------------------------------
    // Production
    // ------------------------------------------------------------------------

    /// Advances production and batch ageing by `dt` seconds, then checks unlocks.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if `dt` is negative or not finite.
    pub fn tick(&mut self, dt: f64) -> EconomyResult<AdvanceReport> {
        let report = self.ledger.advance(dt)?;
        self.ledger.decay_batches(dt)?;
        self.events
            .extend(report.overflows.iter().cloned().map(AlchemyEvent::Overflow));
        self.check_unlocks()?;
        Ok(report)
    }

    /// Harvests one click worth of Smiles.
    ///
    /// # Errors
    ///
    /// Only fails if an unlock upgrade it triggers is invalid.
    pub fn click(&mut self) -> EconomyResult<Option<OverflowEvent>> {
        let overflow = self.ledger.harvest(Tier::Smiles, self.click_power);
        if let Some(event) = &overflow {
            self.events.push(AlchemyEvent::Overflow(event.clone()));
        }
        self.check_unlocks()?;
        Ok(overflow)
    }

    /// Changes the Smiles harvested per click.
    pub fn set_click_power(&mut self, power: ScaledNumber) {
        self.click_power = power;
    }

    /// Replays an absence of `seconds`, capped at the configured window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if `seconds` is negative or not finite.
    pub fn offline_catch_up(&mut self, seconds: f64) -> EconomyResult<OfflineReport> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(EconomyError::magnitude(format_args!("offline seconds {seconds}")));
        }
        let window = seconds.min(self.config.session.max_offline_seconds);
        let step = self.config.session.offline_step_seconds;
        let mut gains = [ScaledNumber::ZERO; Tier::COUNT];
        let mut report = OfflineReport {
            requested_seconds: seconds,
            ..OfflineReport::default()
        };

        let mut remaining = window;
        while remaining > 0.0 {
            let dt = remaining.min(step);
            let advanced = self.tick(dt)?;
            for (tier, amount) in advanced.produced {
                gains[tier.index()] = gains[tier.index()] + amount;
            }
            report.overflows += advanced.overflows.len();
            report.simulated_seconds += dt;
            report.steps += 1;
            remaining -= dt;
        }
        report.gains = Tier::ALL
            .into_iter()
            .zip(gains)
            .filter(|(_, amount)| !amount.is_zero())
            .collect();

        tracing::info!(
            requested = seconds,
            simulated = report.simulated_seconds,
            steps = report.steps,
            overflows = report.overflows,
            "offline progress credited"
        );
        Ok(report)
    }

    /// Scales a tier's capacity and rate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` for bad multipliers.
    pub fn apply_upgrade(&mut self, tier: Tier, upgrade: TierUpgrade) -> EconomyResult<()> {
        self.ledger.apply_upgrade(tier, upgrade)
    }

    // ------------------------------------------------------------------------
    // Alchemy
    // ------------------------------------------------------------------------

    /// Bottles tier stock as a full-purity batch.
    ///
    /// # Errors
    ///
    /// See [`ResourceLedger::distill`].
    pub fn distill(&mut self, tier: Tier, amount: ScaledNumber) -> EconomyResult<BatchId> {
        self.ledger.distill(tier, amount)
    }

    /// Purifies a stored batch; returns its new purity.
    ///
    /// # Errors
    ///
    /// See [`ResourceLedger::purify`].
    pub fn purify(&mut self, batch: BatchId, intensity: f64) -> EconomyResult<f64> {
        self.ledger.purify(batch, intensity)
    }

    /// Attempts a craft on a discovered recipe.
    ///
    /// # Errors
    ///
    /// Validation errors from [`RecipeResolver::attempt_craft`]; nothing is
    /// mutated when one is returned.
    pub fn craft<R: RandomSource + ?Sized>(&mut self, request: &CraftRequest, rng: &mut R) -> EconomyResult<CraftReport> {
        let config = Arc::clone(&self.config);
        let resolver = RecipeResolver::new(&config.crafting);
        let report = resolver.attempt_craft(&mut self.workbench(), request, rng)?;
        self.record(&report)?;
        Ok(report)
    }

    /// Mixes arbitrary batches.
    ///
    /// # Errors
    ///
    /// Validation errors from [`RecipeResolver::experiment`]; nothing is
    /// mutated when one is returned.
    pub fn experiment<R: RandomSource + ?Sized>(
        &mut self,
        request: &ExperimentRequest,
        rng: &mut R,
    ) -> EconomyResult<CraftReport> {
        let config = Arc::clone(&self.config);
        let resolver = RecipeResolver::new(&config.crafting);
        let report = resolver.experiment(&mut self.workbench(), request, rng)?;
        self.record(&report)?;
        Ok(report)
    }

    /// Repairs damaged equipment; returns whether it was damaged.
    ///
    /// # Errors
    ///
    /// Returns `EquipmentNotFound` for an unknown id.
    pub fn repair_equipment(&mut self, id: EquipmentId) -> EconomyResult<bool> {
        let repaired = self.rack.repair(id)?;
        if repaired {
            tracing::info!(equipment = id, "equipment repaired");
            self.events.push(AlchemyEvent::EquipmentRepaired { equipment: id });
        }
        Ok(repaired)
    }

    /// Grants XP, queueing a level-up event when a level boundary is crossed.
    pub fn grant_xp(&mut self, amount: u64) {
        if amount == 0 {
            return;
        }
        let before = self.alchemist_level();
        self.xp = self.xp.saturating_add(amount);
        self.events.push(AlchemyEvent::BonusXp {
            amount,
            total: self.xp,
        });
        let after = self.alchemist_level();
        if after > before {
            tracing::info!(level = after, xp = self.xp, "alchemist levelled up");
            self.events.push(AlchemyEvent::LevelUp { level: after });
        }
    }

    fn workbench(&mut self) -> Workbench<'_> {
        let alchemist_level = self.alchemist_level();
        Workbench {
            ledger: &mut self.ledger,
            book: &mut self.book,
            rack: &mut self.rack,
            alchemist_level,
        }
    }

    /// Turns a resolved attempt into events and XP.
    fn record(&mut self, report: &CraftReport) -> EconomyResult<()> {
        self.events.push(AlchemyEvent::CraftResolved {
            recipe: report.recipe,
            outcome: report.outcome.clone(),
        });
        if let (true, Some(recipe)) = (report.newly_discovered, report.recipe) {
            self.events.push(AlchemyEvent::RecipeDiscovered { recipe });
        }
        match report.outcome {
            CraftOutcome::InterestingFailure {
                recipe,
                newly_synthesized: true,
            } => self.events.push(AlchemyEvent::RecipeSynthesized { recipe }),
            CraftOutcome::Catastrophic {
                batches_contaminated,
                equipment_damaged,
            } => {
                if batches_contaminated > 0 {
                    self.events.push(AlchemyEvent::BatchesContaminated {
                        count: batches_contaminated,
                    });
                }
                if let Some(equipment) = equipment_damaged {
                    tracing::warn!(equipment, "equipment damaged");
                    self.events.push(AlchemyEvent::EquipmentDamaged { equipment });
                }
            }
            _ => {}
        }
        self.grant_xp(report.xp_awarded);
        self.check_unlocks()
    }

    /// Fires pending unlocks and applies any tier upgrades they carry.
    fn check_unlocks(&mut self) -> EconomyResult<()> {
        let fired: Vec<Unlock> = self.unlocks.check(&self.ledger, &self.book, &mut self.events);
        for (tier, upgrade) in fired.iter().filter_map(Unlock::tier_upgrade) {
            self.ledger.apply_upgrade(tier, upgrade)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    /// Exports the plain record. Pending events are not part of the state.
    #[must_use]
    pub fn to_state(&self) -> WorkshopState {
        WorkshopState {
            xp: self.xp,
            click_power: self.click_power,
            unlocked: self.unlocks.to_state(),
            ledger: self.ledger.to_state(),
            recipes: self.book.to_state(),
            equipment: self.rack.clone(),
        }
    }

    /// Rebuilds a workshop from a saved record against the current config.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if any part of the record is inconsistent.
    pub fn from_state(config: Arc<EconomyConfig>, state: &WorkshopState) -> EconomyResult<Self> {
        let ledger = ResourceLedger::from_state(&state.ledger, config.purity)?;
        let book = RecipeBook::from_state(recipe_table(&config), &state.recipes)?;
        state
            .equipment
            .validate()
            .map_err(|e| EconomyError::InvalidState(e.to_string()))?;
        let unlocks = UnlockTracker::from_state(unlock_rules(&config), &state.unlocked)?;
        tracing::debug!(
            xp = state.xp,
            batches = ledger.cellar().len(),
            unlocked = state.unlocked.len(),
            "workshop restored"
        );
        Ok(Self {
            config,
            ledger,
            book,
            rack: state.equipment.clone(),
            unlocks,
            events: EventQueue::new(),
            click_power: state.click_power,
            xp: state.xp,
        })
    }
}

fn recipe_table(config: &EconomyConfig) -> Arc<[RecipeDefinition]> {
    config.recipes.clone().into()
}

fn unlock_rules(config: &EconomyConfig) -> Arc<[UnlockRule]> {
    config.unlocks.clone().into()
}

fn level_for(xp: u64, xp_per_level: u64) -> u32 {
    u32::try_from(xp / xp_per_level.max(1)).unwrap_or(u32::MAX)
}
