//! # Resource Ledger
//!
//! **Per-tier stock, storage caps, production, and the batch cellar.**
//!
//! `advance(dt)` makes one deterministic ascending pass over the tiers.
//! Smiles accrue `rate × dt`. Every higher tier produces in proportion to the
//! *start-of-tick* stock of the tier below:
//!
//! ```text
//! produced[n] = min(rate[n] × stock[n-1] × dt, stock[n-1] / ratio[n])
//! stock[n-1] -= produced[n] × ratio[n]
//! ```
//!
//! A unit produced this tick can never be spent again by the next tier up in
//! the same tick.
//!
//! ## Overflow
//!
//! Production past capacity is clamped. The discarded excess is not silent:
//! every stored batch of the tier's emotion takes an overflow contamination
//! with `severity = min(1, excess / capacity)`, and an [`OverflowEvent`] is
//! returned to the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};
use crate::purity::{Batch, BatchId, BatchState, Contamination, Emotion, PurityConfig, PurityTracker, MAX_PURITY};
use crate::scaled::ScaledNumber;
use crate::tier::{ResourceTier, ResourceTierState, Tier, TierDefinition, TierUpgrade};

/// Storage overflow on one tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverflowEvent {
    /// Tier that hit its cap.
    pub tier: Tier,
    /// Amount discarded by the clamp.
    pub excess: ScaledNumber,
    /// `min(1, excess / capacity)`.
    pub severity: f64,
    /// Batches of the tier's emotion that were contaminated.
    pub batches_affected: usize,
}

/// What one `advance` call did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdvanceReport {
    /// Amount that landed in each tier (only tiers that produced).
    pub produced: Vec<(Tier, ScaledNumber)>,
    /// Overflows, in tier order.
    pub overflows: Vec<OverflowEvent>,
}

/// Stored batches, each on a numbered shelf.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cellar {
    batches: BTreeMap<BatchId, Batch>,
    next_id: BatchId,
}

impl Cellar {
    /// Creates an empty cellar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new batch and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if `purity` is outside `[0, 100]`.
    pub fn store(
        &mut self,
        emotion: Emotion,
        amount: ScaledNumber,
        purity: f64,
        shelf: u32,
    ) -> EconomyResult<BatchId> {
        let id = self.next_id;
        let batch = Batch::new(id, emotion, amount, purity, shelf)?;
        self.batches.insert(id, batch);
        self.next_id += 1;
        Ok(id)
    }

    /// Looks up a batch.
    #[must_use]
    pub fn get(&self, id: BatchId) -> Option<&Batch> {
        self.batches.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: BatchId) -> Option<&mut Batch> {
        self.batches.get_mut(&id)
    }

    /// Removes a batch entirely (sale, disposal).
    pub fn remove(&mut self, id: BatchId) -> Option<Batch> {
        self.batches.remove(&id)
    }

    /// All batches in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Batch> {
        self.batches.values()
    }

    /// Number of stored batches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether the cellar is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total stored amount of one emotion.
    #[must_use]
    pub fn total_of(&self, emotion: Emotion) -> ScaledNumber {
        self.batches
            .values()
            .filter(|b| b.emotion() == emotion)
            .map(Batch::amount)
            .sum()
    }

    /// Ids of batches within `radius` shelves of `shelf`.
    #[must_use]
    pub fn ids_near(&self, shelf: u32, radius: u32) -> Vec<BatchId> {
        self.batches
            .values()
            .filter(|b| b.shelf().abs_diff(shelf) <= radius)
            .map(Batch::id)
            .collect()
    }

    /// Takes `amount` out of a batch, dropping the batch once it is empty.
    ///
    /// # Errors
    ///
    /// Returns `BatchNotFound` or `InsufficientIngredients`; the batch is untouched on error.
    pub fn consume(&mut self, id: BatchId, amount: ScaledNumber) -> EconomyResult<()> {
        let batch = self.batches.get_mut(&id).ok_or(EconomyError::BatchNotFound(id))?;
        if batch.amount() < amount {
            return Err(EconomyError::InsufficientIngredients {
                emotion: batch.emotion(),
                required: amount.to_string(),
                available: batch.amount().to_string(),
            });
        }
        batch.drain(amount);
        if batch.amount().is_zero() {
            self.batches.remove(&id);
        }
        Ok(())
    }

    /// Exports the plain record.
    #[must_use]
    pub fn to_state(&self) -> CellarState {
        CellarState {
            next_id: self.next_id,
            batches: self.batches.values().map(Batch::to_state).collect(),
        }
    }

    /// Rebuilds a cellar from its plain record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for duplicate ids, ids at or past `next_id`, or invalid batches.
    pub fn from_state(state: &CellarState) -> EconomyResult<Self> {
        let mut batches = BTreeMap::new();
        for record in &state.batches {
            if record.id >= state.next_id {
                return Err(EconomyError::InvalidState(format!(
                    "batch id {} not below next id {}",
                    record.id, state.next_id
                )));
            }
            if batches.insert(record.id, Batch::from_state(record)?).is_some() {
                return Err(EconomyError::InvalidState(format!("duplicate batch id {}", record.id)));
            }
        }
        Ok(Self {
            batches,
            next_id: state.next_id,
        })
    }
}

/// Plain persisted form of a [`Cellar`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellarState {
    /// Id the next stored batch receives.
    pub next_id: BatchId,
    /// Stored batches.
    #[serde(default)]
    pub batches: Vec<BatchState>,
}

/// Tier stock plus the batch cellar.
#[derive(Clone, Debug)]
pub struct ResourceLedger {
    tiers: Vec<ResourceTier>,
    cellar: Cellar,
    tracker: PurityTracker,
}

impl ResourceLedger {
    /// Builds a ledger from one definition per tier, in tier order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the table does not list each tier once in order.
    pub fn new(definitions: &[TierDefinition], purity: PurityConfig) -> EconomyResult<Self> {
        check_tier_order(definitions.iter().map(|d| d.tier))?;
        for definition in definitions {
            definition.validate()?;
        }
        Ok(Self {
            tiers: definitions.iter().map(ResourceTier::new).collect(),
            cellar: Cellar::new(),
            tracker: PurityTracker::new(purity),
        })
    }

    /// Live state of one tier.
    #[must_use]
    pub fn tier(&self, tier: Tier) -> &ResourceTier {
        &self.tiers[tier.index()]
    }

    /// All tiers in order.
    #[must_use]
    pub fn tiers(&self) -> &[ResourceTier] {
        &self.tiers
    }

    /// Stored batches.
    #[must_use]
    pub const fn cellar(&self) -> &Cellar {
        &self.cellar
    }

    pub(crate) fn cellar_mut(&mut self) -> &mut Cellar {
        &mut self.cellar
    }

    /// Purity rules in effect.
    #[must_use]
    pub const fn tracker(&self) -> &PurityTracker {
        &self.tracker
    }

    /// Accrues `dt` seconds of production across all tiers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if `dt` is negative or not finite.
    pub fn advance(&mut self, dt: f64) -> EconomyResult<AdvanceReport> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(EconomyError::magnitude(format_args!("dt {dt}")));
        }
        let mut report = AdvanceReport::default();
        if dt == 0.0 {
            return Ok(report);
        }
        let elapsed = ScaledNumber::from_native(dt)?;
        let snapshot: Vec<ScaledNumber> = self.tiers.iter().map(ResourceTier::amount).collect();

        for index in 0..self.tiers.len() {
            let mut produced = self.tiers[index].production_rate() * elapsed;
            if index > 0 {
                // rate is per unit of lower stock held at the start of the tick
                produced = produced * snapshot[index - 1];
                let ratio = self.tiers[index].conversion_ratio();
                let affordable = snapshot[index - 1].scale(ratio.recip())?;
                if produced > affordable {
                    produced = affordable;
                }
                let cost = produced.scale(ratio)?;
                self.tiers[index - 1].drain(cost);
            }
            if produced.is_zero() {
                continue;
            }
            let deposit = self.tiers[index].deposit(produced);
            let tier = self.tiers[index].tier();
            report.produced.push((tier, deposit.accepted));
            if !deposit.excess.is_zero() {
                report.overflows.push(self.punish_overflow(tier, deposit.excess));
            }
        }
        Ok(report)
    }

    /// Manually adds to a tier (clicks), with the same clamp and overflow penalty.
    pub fn harvest(&mut self, tier: Tier, amount: ScaledNumber) -> Option<OverflowEvent> {
        let deposit = self.tiers[tier.index()].deposit(amount);
        if deposit.excess.is_zero() {
            None
        } else {
            Some(self.punish_overflow(tier, deposit.excess))
        }
    }

    /// Moves `amount` of tier stock into a fresh batch at full purity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` for a zero amount and `InsufficientIngredients`
    /// if the tier holds less than `amount`.
    pub fn distill(&mut self, tier: Tier, amount: ScaledNumber) -> EconomyResult<BatchId> {
        if amount.is_zero() {
            return Err(EconomyError::magnitude("distill amount 0"));
        }
        let stock = &mut self.tiers[tier.index()];
        if stock.amount() < amount {
            return Err(EconomyError::InsufficientIngredients {
                emotion: tier.emotion(),
                required: amount.to_string(),
                available: stock.amount().to_string(),
            });
        }
        stock.withdraw(amount)?;
        let shelf = tier.index() as u32;
        self.cellar.store(tier.emotion(), amount, MAX_PURITY, shelf)
    }

    /// Takes `amount` out of a stored batch.
    ///
    /// # Errors
    ///
    /// See [`Cellar::consume`].
    pub fn consume(&mut self, batch: BatchId, amount: ScaledNumber) -> EconomyResult<()> {
        self.cellar.consume(batch, amount)
    }

    /// Ages every stored batch by `dt` seconds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if `dt` is negative or not finite.
    pub fn decay_batches(&mut self, dt: f64) -> EconomyResult<()> {
        for batch in self.cellar.batches.values_mut() {
            self.tracker.decay(batch, dt)?;
        }
        Ok(())
    }

    /// Purifies one batch.
    ///
    /// # Errors
    ///
    /// Returns `BatchNotFound` or `InvalidMagnitude` for a bad intensity.
    pub fn purify(&mut self, batch: BatchId, intensity: f64) -> EconomyResult<f64> {
        let batch = self.cellar.get_mut(batch).ok_or(EconomyError::BatchNotFound(batch))?;
        self.tracker.purify(batch, intensity)?;
        Ok(batch.purity())
    }

    /// Contaminates one batch.
    ///
    /// # Errors
    ///
    /// Returns `BatchNotFound` for an unknown id.
    pub fn contaminate(&mut self, batch: BatchId) -> EconomyResult<f64> {
        let batch = self.cellar.get_mut(batch).ok_or(EconomyError::BatchNotFound(batch))?;
        self.tracker.apply_contamination(batch, Contamination::Incident);
        Ok(batch.purity())
    }

    /// Contaminates every batch within `radius` shelves of `shelf`; returns how many.
    pub fn contaminate_near(&mut self, shelf: u32, radius: u32) -> usize {
        let mut affected = 0;
        for batch in self.cellar.batches.values_mut() {
            if batch.shelf().abs_diff(shelf) <= radius {
                self.tracker.apply_contamination(batch, Contamination::Incident);
                affected += 1;
            }
        }
        affected
    }

    /// Scales a tier's capacity and rate. The only capacity/rate mutator.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` for negative, non-finite or capacity-zeroing multipliers.
    pub fn apply_upgrade(&mut self, tier: Tier, upgrade: TierUpgrade) -> EconomyResult<()> {
        self.tiers[tier.index()].upgrade(upgrade)?;
        tracing::debug!(
            tier = %tier,
            capacity = %self.tiers[tier.index()].capacity(),
            rate = %self.tiers[tier.index()].production_rate(),
            "tier upgraded"
        );
        Ok(())
    }

    fn punish_overflow(&mut self, tier: Tier, excess: ScaledNumber) -> OverflowEvent {
        let capacity = self.tiers[tier.index()].capacity();
        let severity = excess.ratio(capacity).min(1.0);
        let emotion = tier.emotion();
        let mut batches_affected = 0;
        for batch in self.cellar.batches.values_mut().filter(|b| b.emotion() == emotion) {
            self.tracker
                .apply_contamination(batch, Contamination::Overflow { severity });
            batches_affected += 1;
        }
        tracing::warn!(
            tier = %tier,
            excess = %excess.format(2),
            severity,
            batches_affected,
            "storage overflow"
        );
        OverflowEvent {
            tier,
            excess,
            severity,
            batches_affected,
        }
    }

    /// Exports the plain record.
    #[must_use]
    pub fn to_state(&self) -> LedgerState {
        LedgerState {
            tiers: self.tiers.iter().map(ResourceTier::to_state).collect(),
            cellar: self.cellar.to_state(),
        }
    }

    /// Rebuilds a ledger from its plain record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if tiers are missing, out of order, or any record is invalid.
    pub fn from_state(state: &LedgerState, purity: PurityConfig) -> EconomyResult<Self> {
        check_tier_order(state.tiers.iter().map(|t| t.tier))
            .map_err(|e| EconomyError::InvalidState(e.to_string()))?;
        let tiers = state
            .tiers
            .iter()
            .map(ResourceTier::from_state)
            .collect::<EconomyResult<Vec<_>>>()?;
        Ok(Self {
            tiers,
            cellar: Cellar::from_state(&state.cellar)?,
            tracker: PurityTracker::new(purity),
        })
    }
}

/// Plain persisted form of a [`ResourceLedger`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    /// One record per tier, in order.
    pub tiers: Vec<ResourceTierState>,
    /// Stored batches.
    #[serde(default)]
    pub cellar: CellarState,
}

fn check_tier_order(tiers: impl ExactSizeIterator<Item = Tier>) -> EconomyResult<()> {
    if tiers.len() != Tier::COUNT {
        return Err(EconomyError::InvalidConfig(format!(
            "expected {} tiers, found {}",
            Tier::COUNT,
            tiers.len()
        )));
    }
    for (expected, found) in Tier::ALL.into_iter().zip(tiers) {
        if expected != found {
            return Err(EconomyError::InvalidConfig(format!(
                "tier {found} listed where {expected} was expected"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content;

    fn ledger() -> ResourceLedger {
        ResourceLedger::new(&content::default_tiers(), PurityConfig::default()).unwrap()
    }

    #[test]
    fn test_smiles_clamp_and_overflow() {
        let mut ledger = ledger();
        let report = ledger.advance(120.0).unwrap();
        assert_eq!(ledger.tier(Tier::Smiles).amount(), ScaledNumber::from_count(100));
        assert_eq!(report.overflows.len(), 1);
        assert_eq!(report.overflows[0].tier, Tier::Smiles);
        assert_eq!(report.overflows[0].excess, ScaledNumber::from_count(20));
        assert!((report.overflows[0].severity - 0.2).abs() < 1e-12);
        assert_eq!(report.overflows[0].batches_affected, 0);
    }

    #[test]
    fn test_single_tick_overflow_of_fifty() {
        let mut ledger = ledger();
        let report = ledger.advance(150.0).unwrap();
        assert_eq!(ledger.tier(Tier::Smiles).amount(), ScaledNumber::from_count(100));
        assert_eq!(report.overflows[0].excess, ScaledNumber::from_count(50));
    }

    #[test]
    fn test_zero_dt_is_noop_and_bad_dt_rejected() {
        let mut ledger = ledger();
        let before = ledger.to_state();
        assert_eq!(ledger.advance(0.0).unwrap(), AdvanceReport::default());
        assert_eq!(ledger.to_state(), before);
        assert!(ledger.advance(-1.0).is_err());
        assert!(ledger.advance(f64::INFINITY).is_err());
        assert_eq!(ledger.to_state(), before);
    }

    fn approx(value: ScaledNumber, expected: f64) -> bool {
        (value.to_f64() - expected).abs() < 1e-9
    }

    #[test]
    fn test_upper_tier_uses_start_of_tick_stock() {
        let mut ledger = ledger();
        // first tick: Smiles starts empty, so Sighs cannot produce
        ledger.advance(50.0).unwrap();
        assert_eq!(ledger.tier(Tier::Smiles).amount(), ScaledNumber::from_count(50));
        assert!(ledger.tier(Tier::Sighs).amount().is_zero());

        // second tick: 0.0025 x 50 Smiles held at the start x 10s
        ledger.advance(10.0).unwrap();
        assert!(approx(ledger.tier(Tier::Sighs).amount(), 1.25));
        // 50 + 10 produced - 2.5 spent on 1.25 Sighs
        assert!(approx(ledger.tier(Tier::Smiles).amount(), 57.5));
        assert!(ledger.tier(Tier::Frowns).amount().is_zero());
    }

    #[test]
    fn test_production_scales_with_lower_stock() {
        let sighs_after_one_second = |smiles: u64| {
            let mut ledger = ledger();
            ledger.harvest(Tier::Smiles, ScaledNumber::from_count(smiles));
            ledger.advance(1.0).unwrap();
            ledger.tier(Tier::Sighs).amount().to_f64()
        };

        let low = sighs_after_one_second(20);
        let high = sighs_after_one_second(40);
        assert!((low - 0.05).abs() < 1e-12);
        assert!((high - 2.0 * low).abs() < 1e-12);
        assert!((sighs_after_one_second(100) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_production_limited_by_lower_stock() {
        let mut ledger = ledger();
        ledger.harvest(Tier::Smiles, ScaledNumber::from_count(20));
        // 0.0025 x 20 x 1000s would be 50 Sighs, but 20 Smiles only cover 10
        ledger.advance(1_000.0).unwrap();
        assert_eq!(ledger.tier(Tier::Sighs).amount(), ScaledNumber::from_count(10));
    }

    #[test]
    fn test_overflow_contaminates_matching_batches() {
        let mut ledger = ledger();
        ledger.harvest(Tier::Smiles, ScaledNumber::from_count(100));
        let joy = ledger.distill(Tier::Smiles, ScaledNumber::from_count(40)).unwrap();
        let sadness = ledger
            .cellar_mut()
            .store(Emotion::Sadness, ScaledNumber::from_count(5), 100.0, 1)
            .unwrap();

        // 60 stored + 90 harvested = 150 -> excess 50, severity 0.5
        let overflow = ledger.harvest(Tier::Smiles, ScaledNumber::from_count(90)).unwrap();
        assert_eq!(overflow.excess, ScaledNumber::from_count(50));
        assert_eq!(overflow.batches_affected, 1);

        let joy = ledger.cellar().get(joy).unwrap();
        assert!((joy.purity() - 95.0).abs() < 1e-9);
        assert_eq!(joy.contamination_events(), 1);
        assert_eq!(ledger.cellar().get(sadness).unwrap().purity(), 100.0);
    }

    #[test]
    fn test_distill_and_consume() {
        let mut ledger = ledger();
        ledger.harvest(Tier::Smiles, ScaledNumber::from_count(30));
        assert!(ledger.distill(Tier::Smiles, ScaledNumber::from_count(31)).is_err());
        assert!(ledger.distill(Tier::Smiles, ScaledNumber::ZERO).is_err());

        let id = ledger.distill(Tier::Smiles, ScaledNumber::from_count(30)).unwrap();
        assert!(ledger.tier(Tier::Smiles).amount().is_zero());
        assert_eq!(ledger.cellar().get(id).unwrap().purity(), 100.0);

        assert!(ledger.consume(id, ScaledNumber::from_count(31)).is_err());
        ledger.consume(id, ScaledNumber::from_count(10)).unwrap();
        assert_eq!(ledger.cellar().total_of(Emotion::Joy), ScaledNumber::from_count(20));
        ledger.consume(id, ScaledNumber::from_count(20)).unwrap();
        assert!(ledger.cellar().get(id).is_none());
        assert!(matches!(
            ledger.consume(id, ScaledNumber::ONE),
            Err(EconomyError::BatchNotFound(_))
        ));
    }

    #[test]
    fn test_contaminate_near_respects_radius() {
        let mut ledger = ledger();
        let cellar = ledger.cellar_mut();
        let near = cellar.store(Emotion::Joy, ScaledNumber::ONE, 80.0, 4).unwrap();
        let edge = cellar.store(Emotion::Joy, ScaledNumber::ONE, 80.0, 6).unwrap();
        let far = cellar.store(Emotion::Joy, ScaledNumber::ONE, 80.0, 9).unwrap();

        assert_eq!(ledger.contaminate_near(4, 2), 2);
        assert_eq!(ledger.cellar().get(near).unwrap().purity(), 70.0);
        assert_eq!(ledger.cellar().get(edge).unwrap().purity(), 70.0);
        assert_eq!(ledger.cellar().get(far).unwrap().purity(), 80.0);
    }

    #[test]
    fn test_lifetime_counts_overflow() {
        let mut ledger = ledger();
        ledger.advance(120.0).unwrap();
        assert_eq!(ledger.tier(Tier::Smiles).lifetime(), ScaledNumber::from_count(120));
    }

    #[test]
    fn test_state_round_trip() {
        let mut ledger = ledger();
        ledger.advance(75.0).unwrap();
        ledger.advance(30.0).unwrap();
        ledger.distill(Tier::Smiles, ScaledNumber::from_count(10)).unwrap();
        ledger.decay_batches(90.0).unwrap();

        let state = ledger.to_state();
        let restored = ResourceLedger::from_state(&state, PurityConfig::default()).unwrap();
        assert_eq!(restored.to_state(), state);

        let mut truncated = state;
        truncated.tiers.pop();
        assert!(ResourceLedger::from_state(&truncated, PurityConfig::default()).is_err());
    }

    #[test]
    fn test_new_rejects_misordered_table() {
        let mut tiers = content::default_tiers();
        tiers.swap(0, 1);
        assert!(ResourceLedger::new(&tiers, PurityConfig::default()).is_err());
    }
}
