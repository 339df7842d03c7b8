//! # Purity Tracking
//!
//! Every stored quantity of emotion is a [`Batch`] with its own quality score
//! in `[0, 100]`. Purity only moves through the three [`PurityTracker`]
//! mutators:
//!
//! - `decay` - ages the batch, purity falls linearly per minute
//! - `apply_contamination` - a fixed (or overflow-scaled) hit
//! - `purify` - an explicit purification action, scaled by intensity
//!
//! Each mutator also advances the batch's history counters. The history is a
//! record, not a formula input: penalties vary with overflow severity and
//! every step clamps to `[0, 100]`, so the stored purity is the authoritative
//! value and is saved alongside the counters. Batch fields are private so
//! nothing else can move either.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};
use crate::scaled::ScaledNumber;

/// Highest purity a batch can hold.
pub const MAX_PURITY: f64 = 100.0;

/// Unique identifier for a stored batch.
pub type BatchId = u64;

/// Emotion types that can be stored, blended and crafted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    /// Bottled Smiles.
    Joy,
    /// Bottled Sighs.
    Sadness,
    /// Bottled Frowns.
    Anger,
    /// Bottled Shivers.
    Fear,
    /// Bottled Blushes.
    Love,
    /// Bottled Breaths.
    Calm,
    /// Bottled Gasps.
    Wonder,
    /// Bottled Memories; also the product of Bittersweet.
    Nostalgia,
    /// Bottled Epiphanies.
    Serenity,
    /// Distilled from the Singularity.
    Catharsis,
    /// Output of recipes synthesized from interesting failures.
    Enigma,
    /// Contaminated by-product of failed crafts.
    Sludge,
}

impl Emotion {
    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Joy => "Joy",
            Self::Sadness => "Sadness",
            Self::Anger => "Anger",
            Self::Fear => "Fear",
            Self::Love => "Love",
            Self::Calm => "Calm",
            Self::Wonder => "Wonder",
            Self::Nostalgia => "Nostalgia",
            Self::Serenity => "Serenity",
            Self::Catharsis => "Catharsis",
            Self::Enigma => "Enigma",
            Self::Sludge => "Contaminated Sludge",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A discrete quantity of one emotion with its own quality.
///
/// `purity` is stored and updated step by step by [`PurityTracker`]; the age
/// and event counters describe how it got there but are never used to
/// recompute it.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    id: BatchId,
    emotion: Emotion,
    amount: ScaledNumber,
    purity: f64,
    age_seconds: f64,
    contamination_events: u32,
    purification_events: u32,
    shelf: u32,
    container_quality: f64,
}

impl Batch {
    /// Creates a fresh batch in a standard (x1.0) container.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if `purity` is not within `[0, 100]`.
    pub fn new(
        id: BatchId,
        emotion: Emotion,
        amount: ScaledNumber,
        purity: f64,
        shelf: u32,
    ) -> EconomyResult<Self> {
        if !(0.0..=MAX_PURITY).contains(&purity) {
            return Err(EconomyError::magnitude(format_args!("purity {purity}")));
        }
        Ok(Self {
            id,
            emotion,
            amount,
            purity,
            age_seconds: 0.0,
            contamination_events: 0,
            purification_events: 0,
            shelf,
            container_quality: 1.0,
        })
    }

    /// Places the batch in a container with the given quality multiplier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if `quality` is negative or not finite.
    pub fn with_container_quality(mut self, quality: f64) -> EconomyResult<Self> {
        if !quality.is_finite() || quality < 0.0 {
            return Err(EconomyError::magnitude(format_args!("container quality {quality}")));
        }
        self.container_quality = quality;
        Ok(self)
    }

    /// Batch id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> BatchId {
        self.id
    }

    /// Stored emotion.
    #[inline]
    #[must_use]
    pub const fn emotion(&self) -> Emotion {
        self.emotion
    }

    /// Stored amount.
    #[inline]
    #[must_use]
    pub const fn amount(&self) -> ScaledNumber {
        self.amount
    }

    /// Current purity in `[0, 100]`.
    #[inline]
    #[must_use]
    pub const fn purity(&self) -> f64 {
        self.purity
    }

    /// Seconds spent in storage.
    #[inline]
    #[must_use]
    pub const fn age_seconds(&self) -> f64 {
        self.age_seconds
    }

    /// Contamination events suffered so far.
    #[inline]
    #[must_use]
    pub const fn contamination_events(&self) -> u32 {
        self.contamination_events
    }

    /// Purification actions applied so far.
    #[inline]
    #[must_use]
    pub const fn purification_events(&self) -> u32 {
        self.purification_events
    }

    /// Cellar shelf the batch sits on.
    #[inline]
    #[must_use]
    pub const fn shelf(&self) -> u32 {
        self.shelf
    }

    /// Container quality multiplier.
    #[inline]
    #[must_use]
    pub const fn container_quality(&self) -> f64 {
        self.container_quality
    }

    /// Removes `amount`, saturating at zero.
    pub(crate) fn drain(&mut self, amount: ScaledNumber) {
        self.amount = self.amount.saturating_sub(amount);
    }

    /// Exports the plain record.
    #[must_use]
    pub fn to_state(&self) -> BatchState {
        BatchState {
            id: self.id,
            emotion: self.emotion,
            amount: self.amount,
            purity: self.purity,
            age_seconds: self.age_seconds,
            contamination_events: self.contamination_events,
            purification_events: self.purification_events,
            shelf: self.shelf,
            container_quality: self.container_quality,
        }
    }

    /// Rebuilds a batch from its plain record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if purity, age or container quality are out of range.
    pub fn from_state(state: &BatchState) -> EconomyResult<Self> {
        if !(0.0..=MAX_PURITY).contains(&state.purity) {
            return Err(EconomyError::InvalidState(format!(
                "batch {} purity {} outside [0, 100]",
                state.id, state.purity
            )));
        }
        if !state.age_seconds.is_finite() || state.age_seconds < 0.0 {
            return Err(EconomyError::InvalidState(format!(
                "batch {} has invalid age {}",
                state.id, state.age_seconds
            )));
        }
        if !state.container_quality.is_finite() || state.container_quality < 0.0 {
            return Err(EconomyError::InvalidState(format!(
                "batch {} has invalid container quality {}",
                state.id, state.container_quality
            )));
        }
        Ok(Self {
            id: state.id,
            emotion: state.emotion,
            amount: state.amount,
            purity: state.purity,
            age_seconds: state.age_seconds,
            contamination_events: state.contamination_events,
            purification_events: state.purification_events,
            shelf: state.shelf,
            container_quality: state.container_quality,
        })
    }
}

/// Plain persisted form of a [`Batch`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchState {
    /// Batch id.
    pub id: BatchId,
    /// Stored emotion.
    pub emotion: Emotion,
    /// Stored amount.
    pub amount: ScaledNumber,
    /// Purity in `[0, 100]`.
    pub purity: f64,
    /// Seconds spent in storage.
    pub age_seconds: f64,
    /// Contamination events suffered.
    pub contamination_events: u32,
    /// Purification actions applied.
    pub purification_events: u32,
    /// Cellar shelf.
    pub shelf: u32,
    /// Container quality multiplier.
    pub container_quality: f64,
}

/// What contaminated a batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Contamination {
    /// Spill, catastrophe or other discrete accident: full fixed penalty.
    Incident,
    /// Storage overflow; `severity` in `[0, 1]` scales the penalty.
    Overflow {
        /// Fraction of capacity that spilled over (clamped to 1).
        severity: f64,
    },
}

/// Tuning for purity changes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurityConfig {
    /// Purity points lost per minute of storage.
    pub decay_per_minute: f64,
    /// Purity points lost per contamination incident.
    pub contamination_penalty: f64,
    /// Purity points gained per purification at intensity 1.0.
    pub purification_gain: f64,
    /// Purity points lost by an overflow of severity 1.0.
    pub overflow_penalty_scale: f64,
}

impl Default for PurityConfig {
    fn default() -> Self {
        Self {
            decay_per_minute: 0.5,
            contamination_penalty: 10.0,
            purification_gain: 20.0,
            overflow_penalty_scale: 10.0,
        }
    }
}

/// Applies decay, contamination and purification to batches.
#[derive(Clone, Debug, Default)]
pub struct PurityTracker {
    config: PurityConfig,
}

impl PurityTracker {
    /// Creates a tracker with the given tuning.
    #[must_use]
    pub const fn new(config: PurityConfig) -> Self {
        Self { config }
    }

    /// Returns the tuning in use.
    #[must_use]
    pub const fn config(&self) -> &PurityConfig {
        &self.config
    }

    /// Ages a batch by `dt_seconds`: `purity -= decay_per_minute * dt / 60`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if `dt_seconds` is negative or not finite.
    pub fn decay(&self, batch: &mut Batch, dt_seconds: f64) -> EconomyResult<()> {
        if !dt_seconds.is_finite() || dt_seconds < 0.0 {
            return Err(EconomyError::magnitude(format_args!("dt {dt_seconds}")));
        }
        batch.age_seconds += dt_seconds;
        let loss = self.config.decay_per_minute * (dt_seconds / 60.0);
        batch.purity = (batch.purity - loss).clamp(0.0, MAX_PURITY);
        Ok(())
    }

    /// Contaminates a batch and records the event.
    pub fn apply_contamination(&self, batch: &mut Batch, source: Contamination) {
        let penalty = match source {
            Contamination::Incident => self.config.contamination_penalty,
            Contamination::Overflow { severity } => {
                let severity = if severity.is_finite() { severity.clamp(0.0, 1.0) } else { 1.0 };
                self.config.overflow_penalty_scale * severity
            }
        };
        batch.contamination_events = batch.contamination_events.saturating_add(1);
        batch.purity = (batch.purity - penalty).clamp(0.0, MAX_PURITY);
    }

    /// Purifies a batch: `purity += purification_gain * intensity`, capped at 100.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if `intensity` is negative or not finite.
    pub fn purify(&self, batch: &mut Batch, intensity: f64) -> EconomyResult<()> {
        if !intensity.is_finite() || intensity < 0.0 {
            return Err(EconomyError::magnitude(format_args!("intensity {intensity}")));
        }
        batch.purification_events = batch.purification_events.saturating_add(1);
        batch.purity = (batch.purity + self.config.purification_gain * intensity).clamp(0.0, MAX_PURITY);
        Ok(())
    }

    /// Purity as seen through a container: `purity * multiplier`, clamped to `[0, 100]`.
    #[must_use]
    pub fn effective_purity(&self, batch: &Batch, container_quality_multiplier: f64) -> f64 {
        let effective = batch.purity * container_quality_multiplier;
        if effective.is_finite() {
            effective.clamp(0.0, MAX_PURITY)
        } else {
            0.0
        }
    }
}

/// Amount-weighted average purity of `(amount, purity)` parts.
///
/// Returns `0.0` when the total amount is zero.
#[must_use]
pub fn blend_purity(parts: &[(ScaledNumber, f64)]) -> f64 {
    let total: ScaledNumber = parts.iter().map(|(amount, _)| *amount).sum();
    if total.is_zero() {
        return 0.0;
    }
    let blended: f64 = parts
        .iter()
        .map(|(amount, purity)| amount.ratio(total) * purity)
        .sum();
    blended.clamp(0.0, MAX_PURITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(purity: f64) -> Batch {
        Batch::new(1, Emotion::Joy, ScaledNumber::from_count(10), purity, 0).unwrap()
    }

    #[test]
    fn test_decay_per_minute() {
        let tracker = PurityTracker::default();
        let mut b = batch(100.0);
        tracker.decay(&mut b, 120.0).unwrap();
        assert!((b.purity() - 99.0).abs() < 1e-9);
        assert_eq!(b.age_seconds(), 120.0);
    }

    #[test]
    fn test_decay_never_increases_and_clamps() {
        let tracker = PurityTracker::default();
        let mut b = batch(0.2);
        let before = b.purity();
        tracker.decay(&mut b, 3_600.0).unwrap();
        assert!(b.purity() <= before);
        assert_eq!(b.purity(), 0.0);

        tracker.decay(&mut b, 0.0).unwrap();
        assert_eq!(b.purity(), 0.0);
        assert!(tracker.decay(&mut b, -1.0).is_err());
        assert!(tracker.decay(&mut b, f64::NAN).is_err());
    }

    #[test]
    fn test_contamination() {
        let tracker = PurityTracker::default();
        let mut b = batch(55.0);
        tracker.apply_contamination(&mut b, Contamination::Incident);
        assert_eq!(b.purity(), 45.0);
        assert_eq!(b.contamination_events(), 1);

        tracker.apply_contamination(&mut b, Contamination::Overflow { severity: 0.5 });
        assert_eq!(b.purity(), 40.0);
        assert_eq!(b.contamination_events(), 2);

        // severity is capped at a full capacity's worth
        tracker.apply_contamination(&mut b, Contamination::Overflow { severity: 7.0 });
        assert_eq!(b.purity(), 30.0);
    }

    #[test]
    fn test_purify_never_decreases_and_clamps() {
        let tracker = PurityTracker::default();
        let mut b = batch(50.0);
        tracker.purify(&mut b, 1.0).unwrap();
        assert_eq!(b.purity(), 70.0);
        tracker.purify(&mut b, 0.5).unwrap();
        assert_eq!(b.purity(), 80.0);
        tracker.purify(&mut b, 3.0).unwrap();
        assert_eq!(b.purity(), 100.0);
        tracker.purify(&mut b, 0.0).unwrap();
        assert_eq!(b.purity(), 100.0);
        assert_eq!(b.purification_events(), 4);
        assert!(tracker.purify(&mut b, -0.1).is_err());
    }

    #[test]
    fn test_mutators_are_deterministic() {
        let tracker = PurityTracker::default();
        let mut a = batch(90.0);
        let mut b = batch(90.0);
        for target in [&mut a, &mut b] {
            tracker.decay(target, 30.0).unwrap();
            tracker.apply_contamination(target, Contamination::Incident);
            tracker.purify(target, 0.25).unwrap();
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_effective_purity() {
        let tracker = PurityTracker::default();
        let b = batch(80.0);
        assert_eq!(tracker.effective_purity(&b, 0.5), 40.0);
        assert_eq!(tracker.effective_purity(&b, 2.0), 100.0);
    }

    #[test]
    fn test_blend_purity_weights_by_amount() {
        let parts = [
            (ScaledNumber::from_count(3), 100.0),
            (ScaledNumber::from_count(1), 20.0),
        ];
        assert!((blend_purity(&parts) - 80.0).abs() < 1e-9);
        assert_eq!(blend_purity(&[]), 0.0);
    }

    #[test]
    fn test_batch_state_round_trip() {
        let tracker = PurityTracker::default();
        let amounts = [
            ScaledNumber::ZERO,
            ScaledNumber::ONE,
            ScaledNumber::from_native(9.999_999).unwrap(),
            ScaledNumber::from_native(1e308).unwrap(),
            ScaledNumber::from_native(1e-10).unwrap(),
            ScaledNumber::from_parts(9.999_999, 308).unwrap(),
        ];
        for amount in amounts {
            let mut b = Batch::new(7, Emotion::Sadness, amount, 64.5, 3)
                .unwrap()
                .with_container_quality(1.25)
                .unwrap();
            tracker.decay(&mut b, 90.0).unwrap();
            tracker.apply_contamination(&mut b, Contamination::Incident);
            tracker.purify(&mut b, 0.5).unwrap();

            let state = b.to_state();
            let restored = Batch::from_state(&state).unwrap();
            assert_eq!(restored, b);
            assert_eq!(restored.to_state(), state);
            assert_eq!(restored.amount(), amount);
        }

        let b = Batch::new(7, Emotion::Sadness, ScaledNumber::ONE, 64.5, 3).unwrap();
        let mut bad = b.to_state();
        bad.purity = 101.0;
        assert!(Batch::from_state(&bad).is_err());
    }

    #[test]
    fn test_stored_purity_is_authoritative() {
        let tracker = PurityTracker::default();
        let mut light = Batch::new(1, Emotion::Joy, ScaledNumber::ONE, 100.0, 0).unwrap();
        let mut heavy = Batch::new(2, Emotion::Joy, ScaledNumber::ONE, 100.0, 0).unwrap();
        tracker.apply_contamination(&mut light, Contamination::Overflow { severity: 0.1 });
        tracker.apply_contamination(&mut heavy, Contamination::Overflow { severity: 1.0 });

        // same history, different purity
        assert_eq!(light.contamination_events(), heavy.contamination_events());
        assert!((light.purity() - 99.0).abs() < 1e-9);
        assert!((heavy.purity() - 90.0).abs() < 1e-9);
        assert_eq!(Batch::from_state(&light.to_state()).unwrap().purity(), light.purity());
    }

    #[test]
    fn test_new_rejects_out_of_range_purity() {
        assert!(Batch::new(1, Emotion::Joy, ScaledNumber::ONE, 100.5, 0).is_err());
        assert!(Batch::new(1, Emotion::Joy, ScaledNumber::ONE, -1.0, 0).is_err());
        assert!(Batch::new(1, Emotion::Joy, ScaledNumber::ONE, f64::NAN, 0).is_err());
    }
}
