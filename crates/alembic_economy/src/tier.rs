//! # Resource Tiers
//!
//! **The ten-step production chain, Smiles to Singularity.**
//!
//! Each tier is fed by the one below it at a fixed conversion ratio; tier 0
//! is fed by time and clicks. Tiers form a strict total order with no cycles,
//! so a single ascending pass over [`Tier::ALL`] visits every producer before
//! its consumer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};
use crate::purity::Emotion;
use crate::scaled::ScaledNumber;

/// One of the ten ordered resource tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Tier 0, produced by time and clicks.
    Smiles,
    /// Tier 1.
    Sighs,
    /// Tier 2.
    Frowns,
    /// Tier 3.
    Shivers,
    /// Tier 4.
    Blushes,
    /// Tier 5.
    Breaths,
    /// Tier 6.
    Gasps,
    /// Tier 7.
    Memories,
    /// Tier 8.
    Epiphanies,
    /// Tier 9, the top of the chain.
    Singularity,
}

impl Tier {
    /// Number of tiers.
    pub const COUNT: usize = 10;

    /// All tiers in production order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Smiles,
        Self::Sighs,
        Self::Frowns,
        Self::Shivers,
        Self::Blushes,
        Self::Breaths,
        Self::Gasps,
        Self::Memories,
        Self::Epiphanies,
        Self::Singularity,
    ];

    /// Position in the chain (0 for Smiles).
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Tier at `index`, if any.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// The tier this one consumes, `None` for Smiles.
    #[must_use]
    pub const fn lower(self) -> Option<Self> {
        match self.index() {
            0 => None,
            i => Self::from_index(i - 1),
        }
    }

    /// Emotion carried by batches distilled from this tier.
    #[must_use]
    pub const fn emotion(self) -> Emotion {
        match self {
            Self::Smiles => Emotion::Joy,
            Self::Sighs => Emotion::Sadness,
            Self::Frowns => Emotion::Anger,
            Self::Shivers => Emotion::Fear,
            Self::Blushes => Emotion::Love,
            Self::Breaths => Emotion::Calm,
            Self::Gasps => Emotion::Wonder,
            Self::Memories => Emotion::Nostalgia,
            Self::Epiphanies => Emotion::Serenity,
            Self::Singularity => Emotion::Catharsis,
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Smiles => "Smiles",
            Self::Sighs => "Sighs",
            Self::Frowns => "Frowns",
            Self::Shivers => "Shivers",
            Self::Blushes => "Blushes",
            Self::Breaths => "Breaths",
            Self::Gasps => "Gasps",
            Self::Memories => "Memories",
            Self::Epiphanies => "Epiphanies",
            Self::Singularity => "Singularity",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static starting values for one tier, as loaded from content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierDefinition {
    /// Which tier this row describes.
    pub tier: Tier,
    /// Starting storage cap.
    pub capacity: ScaledNumber,
    /// Starting production rate: units per second for Smiles, units per
    /// second per unit of the tier below for every higher tier.
    pub production_rate: ScaledNumber,
    /// Units of the lower tier consumed per unit produced (ignored for Smiles).
    #[serde(default = "default_conversion_ratio")]
    pub conversion_ratio: f64,
}

const fn default_conversion_ratio() -> f64 {
    2.0
}

impl TierDefinition {
    /// Checks the row is usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero capacity or a non-positive ratio.
    pub fn validate(&self) -> EconomyResult<()> {
        if self.capacity.is_zero() {
            return Err(EconomyError::InvalidConfig(format!(
                "tier {} has zero capacity",
                self.tier
            )));
        }
        if !self.conversion_ratio.is_finite() || self.conversion_ratio <= 0.0 {
            return Err(EconomyError::InvalidConfig(format!(
                "tier {} conversion ratio {} must be positive",
                self.tier, self.conversion_ratio
            )));
        }
        Ok(())
    }
}

/// Multipliers applied by an upgrade.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierUpgrade {
    /// Factor applied to capacity.
    pub capacity_multiplier: f64,
    /// Factor applied to production rate.
    pub rate_multiplier: f64,
}

/// Live state of one tier.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceTier {
    tier: Tier,
    amount: ScaledNumber,
    capacity: ScaledNumber,
    production_rate: ScaledNumber,
    conversion_ratio: f64,
    lifetime: ScaledNumber,
}

/// Result of adding to a tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deposit {
    /// Amount that fit under the cap.
    pub accepted: ScaledNumber,
    /// Amount discarded by the clamp.
    pub excess: ScaledNumber,
}

impl ResourceTier {
    /// Creates an empty tier from its definition.
    #[must_use]
    pub fn new(definition: &TierDefinition) -> Self {
        Self {
            tier: definition.tier,
            amount: ScaledNumber::ZERO,
            capacity: definition.capacity,
            production_rate: definition.production_rate,
            conversion_ratio: definition.conversion_ratio,
            lifetime: ScaledNumber::ZERO,
        }
    }

    /// Which tier this is.
    #[inline]
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// Current stock.
    #[inline]
    #[must_use]
    pub const fn amount(&self) -> ScaledNumber {
        self.amount
    }

    /// Storage cap.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> ScaledNumber {
        self.capacity
    }

    /// Production rate (per second for Smiles, per second per lower-tier unit above it).
    #[inline]
    #[must_use]
    pub const fn production_rate(&self) -> ScaledNumber {
        self.production_rate
    }

    /// Lower-tier units consumed per unit produced.
    #[inline]
    #[must_use]
    pub const fn conversion_ratio(&self) -> f64 {
        self.conversion_ratio
    }

    /// Everything ever produced or harvested into this tier, overflow included.
    #[inline]
    #[must_use]
    pub const fn lifetime(&self) -> ScaledNumber {
        self.lifetime
    }

    /// Adds `amount`, clamping at capacity.
    pub(crate) fn deposit(&mut self, amount: ScaledNumber) -> Deposit {
        self.lifetime = self.lifetime + amount;
        let total = self.amount + amount;
        if total > self.capacity {
            let excess = total.saturating_sub(self.capacity);
            let accepted = self.capacity.saturating_sub(self.amount);
            self.amount = self.capacity;
            Deposit { accepted, excess }
        } else {
            self.amount = total;
            Deposit {
                accepted: amount,
                excess: ScaledNumber::ZERO,
            }
        }
    }

    /// Removes `amount` from stock.
    pub(crate) fn withdraw(&mut self, amount: ScaledNumber) -> EconomyResult<()> {
        self.amount = self.amount.checked_sub(amount)?;
        Ok(())
    }

    /// Removes up to `amount`, saturating at zero.
    pub(crate) fn drain(&mut self, amount: ScaledNumber) {
        self.amount = self.amount.saturating_sub(amount);
    }

    /// Scales capacity and rate.
    pub(crate) fn upgrade(&mut self, upgrade: TierUpgrade) -> EconomyResult<()> {
        let capacity = self.capacity.scale(upgrade.capacity_multiplier)?;
        let production_rate = self.production_rate.scale(upgrade.rate_multiplier)?;
        if capacity.is_zero() {
            return Err(EconomyError::magnitude(format_args!(
                "capacity multiplier {}",
                upgrade.capacity_multiplier
            )));
        }
        self.capacity = capacity;
        self.production_rate = production_rate;
        if self.amount > self.capacity {
            self.amount = self.capacity;
        }
        Ok(())
    }

    /// Exports the plain record.
    #[must_use]
    pub const fn to_state(&self) -> ResourceTierState {
        ResourceTierState {
            tier: self.tier,
            amount: self.amount,
            capacity: self.capacity,
            production_rate: self.production_rate,
            conversion_ratio: self.conversion_ratio,
            lifetime: self.lifetime,
        }
    }

    /// Rebuilds a tier from its plain record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the amount exceeds capacity or the ratio is not positive.
    pub fn from_state(state: &ResourceTierState) -> EconomyResult<Self> {
        if state.amount > state.capacity {
            return Err(EconomyError::InvalidState(format!(
                "tier {} amount {} exceeds capacity {}",
                state.tier, state.amount, state.capacity
            )));
        }
        if !state.conversion_ratio.is_finite() || state.conversion_ratio <= 0.0 {
            return Err(EconomyError::InvalidState(format!(
                "tier {} conversion ratio {}",
                state.tier, state.conversion_ratio
            )));
        }
        Ok(Self {
            tier: state.tier,
            amount: state.amount,
            capacity: state.capacity,
            production_rate: state.production_rate,
            conversion_ratio: state.conversion_ratio,
            lifetime: state.lifetime,
        })
    }
}

/// Plain persisted form of a [`ResourceTier`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceTierState {
    /// Which tier.
    pub tier: Tier,
    /// Current stock.
    pub amount: ScaledNumber,
    /// Storage cap.
    pub capacity: ScaledNumber,
    /// Units per second.
    pub production_rate: ScaledNumber,
    /// Lower-tier units per unit produced.
    pub conversion_ratio: f64,
    /// Lifetime production.
    pub lifetime: ScaledNumber,
}
