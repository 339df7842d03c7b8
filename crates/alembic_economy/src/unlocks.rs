//! # Unlocks
//!
//! Buttons, upgrades, features and achievements are one tagged [`Unlock`]
//! type, each paired with an [`UnlockCondition`] in an [`UnlockRule`].
//! A single routine, [`UnlockTracker::check`], evaluates every pending rule
//! against the ledger and recipe book; each rule fires at most once and is
//! reported through the event queue.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};
use crate::events::{AlchemyEvent, EventQueue};
use crate::ledger::ResourceLedger;
use crate::recipe::{RecipeBook, RecipeId};
use crate::scaled::ScaledNumber;
use crate::tier::{Tier, TierUpgrade};

/// Unique identifier for an unlock rule.
pub type UnlockId = u32;

/// What an unlock grants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Unlock {
    /// A new control for the presentation layer.
    Button {
        /// Button label.
        label: String,
    },
    /// A capacity/rate upgrade applied to a tier on unlock.
    Upgrade {
        /// Tier upgraded.
        tier: Tier,
        /// Capacity factor.
        capacity_multiplier: f64,
        /// Rate factor.
        rate_multiplier: f64,
    },
    /// A named feature.
    Feature {
        /// Feature name.
        name: String,
    },
    /// An achievement.
    Achievement {
        /// Achievement title.
        title: String,
    },
}

impl Unlock {
    /// Tier upgrade carried by this unlock, if any.
    #[must_use]
    pub fn tier_upgrade(&self) -> Option<(Tier, TierUpgrade)> {
        match *self {
            Self::Upgrade {
                tier,
                capacity_multiplier,
                rate_multiplier,
            } => Some((
                tier,
                TierUpgrade {
                    capacity_multiplier,
                    rate_multiplier,
                },
            )),
            _ => None,
        }
    }
}

/// When an unlock fires.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnlockCondition {
    /// Current stock of a tier reaches `amount`.
    TierAmount {
        /// Tier watched.
        tier: Tier,
        /// Threshold.
        amount: ScaledNumber,
    },
    /// Lifetime production of a tier reaches `amount`.
    LifetimeAmount {
        /// Tier watched.
        tier: Tier,
        /// Threshold.
        amount: ScaledNumber,
    },
    /// Total successful crafts reach `count`.
    RecipesCrafted {
        /// Threshold.
        count: u64,
    },
    /// A specific recipe is discovered.
    RecipeDiscovered {
        /// Recipe watched.
        recipe: RecipeId,
    },
}

impl UnlockCondition {
    /// Whether the condition holds now.
    #[must_use]
    pub fn is_met(&self, ledger: &ResourceLedger, book: &RecipeBook) -> bool {
        match self {
            Self::TierAmount { tier, amount } => ledger.tier(*tier).amount() >= *amount,
            Self::LifetimeAmount { tier, amount } => ledger.tier(*tier).lifetime() >= *amount,
            Self::RecipesCrafted { count } => book.total_crafted() >= *count,
            Self::RecipeDiscovered { recipe } => book.is_discovered(*recipe),
        }
    }
}

/// A condition and what it unlocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnlockRule {
    /// Unique id.
    pub id: UnlockId,
    /// Trigger.
    pub condition: UnlockCondition,
    /// Reward.
    pub unlock: Unlock,
}

/// Checks that rule ids are unique and upgrades are sane.
///
/// # Errors
///
/// Returns `InvalidConfig` describing the first problem.
pub fn validate_rules(rules: &[UnlockRule]) -> EconomyResult<()> {
    for (i, rule) in rules.iter().enumerate() {
        if rules[..i].iter().any(|r| r.id == rule.id) {
            return Err(EconomyError::InvalidConfig(format!("duplicate unlock id {}", rule.id)));
        }
        if let Some((tier, upgrade)) = rule.unlock.tier_upgrade() {
            for value in [upgrade.capacity_multiplier, upgrade.rate_multiplier] {
                if !value.is_finite() || value <= 0.0 {
                    return Err(EconomyError::InvalidConfig(format!(
                        "unlock {} upgrades {tier} by {value}",
                        rule.id
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Tracks which rules have fired.
#[derive(Clone, Debug)]
pub struct UnlockTracker {
    rules: Arc<[UnlockRule]>,
    fired: BTreeSet<UnlockId>,
}

impl UnlockTracker {
    /// Creates a tracker with nothing fired.
    #[must_use]
    pub fn new(rules: Arc<[UnlockRule]>) -> Self {
        Self {
            rules,
            fired: BTreeSet::new(),
        }
    }

    /// Fires every pending rule whose condition holds, queueing an event per rule.
    ///
    /// Returns the newly fired unlocks in rule order.
    pub fn check(&mut self, ledger: &ResourceLedger, book: &RecipeBook, events: &mut EventQueue) -> Vec<Unlock> {
        let mut fired = Vec::new();
        for rule in self.rules.iter() {
            if self.fired.contains(&rule.id) || !rule.condition.is_met(ledger, book) {
                continue;
            }
            self.fired.insert(rule.id);
            tracing::info!(unlock = rule.id, reward = ?rule.unlock, "unlocked");
            events.push(AlchemyEvent::Unlocked {
                id: rule.id,
                unlock: rule.unlock.clone(),
            });
            fired.push(rule.unlock.clone());
        }
        fired
    }

    /// Whether a rule has fired.
    #[must_use]
    pub fn is_unlocked(&self, id: UnlockId) -> bool {
        self.fired.contains(&id)
    }

    /// Ids of fired rules, ascending.
    #[must_use]
    pub fn to_state(&self) -> Vec<UnlockId> {
        self.fired.iter().copied().collect()
    }

    /// Restores fired rules.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for an id no rule has.
    pub fn from_state(rules: Arc<[UnlockRule]>, fired: &[UnlockId]) -> EconomyResult<Self> {
        if let Some(unknown) = fired.iter().find(|id| !rules.iter().any(|r| r.id == **id)) {
            return Err(EconomyError::InvalidState(format!("unknown unlock id {unknown}")));
        }
        Ok(Self {
            rules,
            fired: fired.iter().copied().collect(),
        })
    }
}
