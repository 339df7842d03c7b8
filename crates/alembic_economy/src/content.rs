//! # Built-in Content
//!
//! The default tables every game starts from when no TOML overrides them:
//! the ten tiers, the recipe list, the equipment rack and the unlock rules.
//! A config file may replace any table wholesale.

use crate::equipment::Equipment;
use crate::purity::Emotion;
use crate::recipe::{Ingredient, OutputFormula, RecipeDefinition, RecipeId};
use crate::scaled::ScaledNumber;
use crate::tier::{Tier, TierDefinition};
use crate::unlocks::{Unlock, UnlockCondition, UnlockRule};

/// 60 % Joy + 40 % Sadness into Nostalgia. Known from the start.
pub const BITTERSWEET: RecipeId = 1;
/// 50 % Love + 50 % Fear into Wonder. Known from the start.
pub const WARM_COURAGE: RecipeId = 2;
/// 50 % Anger + 50 % Calm into Serenity.
pub const SERENE_FURY: RecipeId = 3;
/// Fear, Love and Sadness into Catharsis.
pub const TENDER_DREAD: RecipeId = 4;
/// Wonder, Nostalgia and Joy into Serenity.
pub const WISTFUL_WONDER: RecipeId = 5;
/// An unstable Joy, Anger and Fear mix into Wonder.
pub const VOLATILE_ELATION: RecipeId = 6;

/// `(capacity, rate mantissa, rate exponent)` per tier, Smiles first.
///
/// Smiles make one unit a second. Every higher tier makes 0.0025 units a
/// second for each unit held in the tier below, and each unit costs two of
/// that tier, so a tier settles at half the stock of the one beneath it.
const TIER_TABLE: [(u64, f64, i64); Tier::COUNT] = [
    (100, 1.0, 0),
    (50, 2.5, -3),
    (25, 2.5, -3),
    (20, 2.5, -3),
    (10, 2.5, -3),
    (10, 2.5, -3),
    (5, 2.5, -3),
    (5, 2.5, -3),
    (2, 2.5, -3),
    (1, 2.5, -3),
];

/// Units of the lower tier consumed per unit produced.
const CONVERSION_RATIO: f64 = 2.0;

/// Default tier table.
#[must_use]
pub fn default_tiers() -> Vec<TierDefinition> {
    Tier::ALL
        .iter()
        .zip(TIER_TABLE)
        .map(|(tier, (capacity, mantissa, exponent))| TierDefinition {
            tier: *tier,
            capacity: ScaledNumber::from_count(capacity),
            production_rate: ScaledNumber::from_normalized(mantissa, exponent),
            conversion_ratio: CONVERSION_RATIO,
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn recipe(
    id: RecipeId,
    name: &str,
    ingredients: &[(Emotion, f64)],
    output: Emotion,
    output_formula: OutputFormula,
    base_success_rate: f64,
    min_purity_required: f64,
    batch_size: u64,
) -> RecipeDefinition {
    RecipeDefinition {
        id,
        name: name.to_string(),
        ingredients: ingredients
            .iter()
            .map(|(emotion, percent)| Ingredient::new(*emotion, *percent))
            .collect(),
        output,
        output_formula,
        base_success_rate,
        min_purity_required,
        contamination_risk: 0.0,
        unstable_tolerance: 0.0,
        batch_size: ScaledNumber::from_count(batch_size),
        discovered_at_start: false,
    }
}

/// Default recipe table.
#[must_use]
pub fn default_recipes() -> Vec<RecipeDefinition> {
    vec![
        RecipeDefinition {
            discovered_at_start: true,
            ..recipe(
                BITTERSWEET,
                "Bittersweet",
                &[(Emotion::Joy, 60.0), (Emotion::Sadness, 40.0)],
                Emotion::Nostalgia,
                OutputFormula::Fixed {
                    amount: ScaledNumber::from_count(2),
                },
                0.90,
                50.0,
                10,
            )
        },
        RecipeDefinition {
            discovered_at_start: true,
            ..recipe(
                WARM_COURAGE,
                "Warm Courage",
                &[(Emotion::Love, 50.0), (Emotion::Fear, 50.0)],
                Emotion::Wonder,
                OutputFormula::Fixed {
                    amount: ScaledNumber::ONE,
                },
                0.75,
                40.0,
                10,
            )
        },
        RecipeDefinition {
            contamination_risk: 0.05,
            ..recipe(
                SERENE_FURY,
                "Serene Fury",
                &[(Emotion::Anger, 50.0), (Emotion::Calm, 50.0)],
                Emotion::Serenity,
                OutputFormula::PerInputUnit { ratio: 0.1 },
                0.60,
                60.0,
                20,
            )
        },
        recipe(
            TENDER_DREAD,
            "Tender Dread",
            &[(Emotion::Fear, 30.0), (Emotion::Love, 30.0), (Emotion::Sadness, 40.0)],
            Emotion::Catharsis,
            OutputFormula::PerInputUnit { ratio: 0.05 },
            0.50,
            70.0,
            30,
        ),
        RecipeDefinition {
            contamination_risk: 0.10,
            ..recipe(
                WISTFUL_WONDER,
                "Wistful Wonder",
                &[(Emotion::Wonder, 40.0), (Emotion::Nostalgia, 40.0), (Emotion::Joy, 20.0)],
                Emotion::Serenity,
                OutputFormula::Fixed {
                    amount: ScaledNumber::ONE,
                },
                0.55,
                60.0,
                25,
            )
        },
        RecipeDefinition {
            contamination_risk: 0.20,
            unstable_tolerance: 5.0,
            ..recipe(
                VOLATILE_ELATION,
                "Volatile Elation",
                &[(Emotion::Joy, 45.0), (Emotion::Anger, 30.0), (Emotion::Fear, 20.0)],
                Emotion::Wonder,
                OutputFormula::PerInputUnit { ratio: 0.2 },
                0.40,
                30.0,
                20,
            )
        },
    ]
}

/// Default equipment rack.
#[must_use]
pub fn default_equipment() -> Vec<Equipment> {
    vec![
        Equipment::new(1, "Copper Alembic", 0.05, 2.0, 2),
        Equipment::new(2, "Glass Retort", 0.10, 5.0, 5),
        Equipment::new(3, "Philosopher's Athanor", 0.15, 10.0, 8),
    ]
}

/// Default unlock rules.
#[must_use]
pub fn default_unlocks() -> Vec<UnlockRule> {
    vec![
        UnlockRule {
            id: 1,
            condition: UnlockCondition::TierAmount {
                tier: Tier::Smiles,
                amount: ScaledNumber::from_count(10),
            },
            unlock: Unlock::Button {
                label: "Distill".to_string(),
            },
        },
        UnlockRule {
            id: 2,
            condition: UnlockCondition::LifetimeAmount {
                tier: Tier::Smiles,
                amount: ScaledNumber::from_count(500),
            },
            unlock: Unlock::Upgrade {
                tier: Tier::Smiles,
                capacity_multiplier: 10.0,
                rate_multiplier: 2.0,
            },
        },
        UnlockRule {
            id: 3,
            condition: UnlockCondition::TierAmount {
                tier: Tier::Sighs,
                amount: ScaledNumber::ONE,
            },
            unlock: Unlock::Feature {
                name: "Alchemy Lab".to_string(),
            },
        },
        UnlockRule {
            id: 4,
            condition: UnlockCondition::RecipesCrafted { count: 1 },
            unlock: Unlock::Achievement {
                title: "First Brew".to_string(),
            },
        },
        UnlockRule {
            id: 5,
            condition: UnlockCondition::RecipeDiscovered { recipe: SERENE_FURY },
            unlock: Unlock::Achievement {
                title: "Calm Before the Storm".to_string(),
            },
        },
        UnlockRule {
            id: 6,
            condition: UnlockCondition::LifetimeAmount {
                tier: Tier::Sighs,
                amount: ScaledNumber::from_count(50),
            },
            unlock: Unlock::Upgrade {
                tier: Tier::Sighs,
                capacity_multiplier: 10.0,
                rate_multiplier: 2.0,
            },
        },
        UnlockRule {
            id: 7,
            condition: UnlockCondition::RecipesCrafted { count: 25 },
            unlock: Unlock::Feature {
                name: "Auto-Distiller".to_string(),
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_in_order() {
        let tiers = default_tiers();
        assert_eq!(tiers.len(), Tier::COUNT);
        for (definition, tier) in tiers.iter().zip(Tier::ALL) {
            assert_eq!(definition.tier, tier);
            definition.validate().unwrap();
        }
        assert_eq!(tiers[0].capacity, ScaledNumber::from_count(100));
        assert_eq!(tiers[0].production_rate, ScaledNumber::ONE);
        assert_eq!(tiers[1].production_rate, ScaledNumber::from_parts(2.5, -3).unwrap());
    }

    #[test]
    fn test_recipe_ids_unique() {
        let recipes = default_recipes();
        for (i, recipe) in recipes.iter().enumerate() {
            assert!(recipes[..i].iter().all(|r| r.id != recipe.id));
        }
    }
}
