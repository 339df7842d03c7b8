//! # Economy Configuration
//!
//! All balance data lives in one TOML document, loaded once at startup and
//! shared read-only as `Arc<EconomyConfig>`. Every section is optional and
//! defaults to the built-in [`content`](crate::content) tables, so a file
//! only needs to name what it changes.
//!
//! ```toml
//! [numbers]
//! precision = 2
//! scientific_ceiling = 303
//!
//! [crafting]
//! max_success_rate = 0.95
//!
//! [[recipes]]
//! id = 1
//! name = "Bittersweet"
//! # ...
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::content;
use crate::equipment::{Equipment, EquipmentRack};
use crate::error::{EconomyError, EconomyResult};
use crate::purity::{PurityConfig, MAX_PURITY};
use crate::recipe::{RecipeDefinition, SYNTHESIZED_ID_BASE};
use crate::resolver::CraftingConfig;
use crate::scaled::FormatPolicy;
use crate::tier::{Tier, TierDefinition};
use crate::unlocks::{validate_rules, UnlockRule};
use crate::workshop::SessionConfig;

/// The complete balance sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    /// Number display.
    pub numbers: FormatPolicy,
    /// Purity rules.
    pub purity: PurityConfig,
    /// Craft resolution rules.
    pub crafting: CraftingConfig,
    /// Clicks and offline progress.
    pub session: SessionConfig,
    /// One row per tier, in tier order.
    pub tiers: Vec<TierDefinition>,
    /// Static recipe table.
    pub recipes: Vec<RecipeDefinition>,
    /// Installed equipment.
    pub equipment: Vec<Equipment>,
    /// Unlock rules.
    pub unlocks: Vec<UnlockRule>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            numbers: FormatPolicy::default(),
            purity: PurityConfig::default(),
            crafting: CraftingConfig::default(),
            session: SessionConfig::default(),
            tiers: content::default_tiers(),
            recipes: content::default_recipes(),
            equipment: content::default_equipment(),
            unlocks: content::default_unlocks(),
        }
    }
}

impl EconomyConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for malformed TOML or inconsistent content.
    pub fn from_toml_str(source: &str) -> EconomyResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| EconomyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read or fails validation.
    pub fn from_toml_file(path: impl AsRef<Path>) -> EconomyResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .map_err(|e| EconomyError::InvalidConfig(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!(
            path = %path.display(),
            recipes = config.recipes.len(),
            unlocks = config.unlocks.len(),
            "economy config loaded"
        );
        Ok(config)
    }

    /// Renders the config as TOML.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if serialization fails.
    pub fn to_toml_string(&self) -> EconomyResult<String> {
        toml::to_string_pretty(self).map_err(|e| EconomyError::InvalidConfig(e.to_string()))
    }

    /// Wraps the config for sharing.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Checks every section and table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> EconomyResult<()> {
        if self.numbers.scientific_ceiling < 3 {
            return Err(EconomyError::InvalidConfig(format!(
                "scientific ceiling {} below 1e3",
                self.numbers.scientific_ceiling
            )));
        }
        self.validate_purity()?;
        self.crafting.validate()?;
        self.session.validate()?;

        if self.tiers.len() != Tier::COUNT {
            return Err(EconomyError::InvalidConfig(format!(
                "expected {} tiers, found {}",
                Tier::COUNT,
                self.tiers.len()
            )));
        }
        for (definition, expected) in self.tiers.iter().zip(Tier::ALL) {
            if definition.tier != expected {
                return Err(EconomyError::InvalidConfig(format!(
                    "tier {} listed where {expected} was expected",
                    definition.tier
                )));
            }
            definition.validate()?;
        }

        for (i, recipe) in self.recipes.iter().enumerate() {
            recipe.validate()?;
            if recipe.id >= SYNTHESIZED_ID_BASE {
                return Err(EconomyError::InvalidConfig(format!(
                    "recipe id {} is reserved for synthesized recipes",
                    recipe.id
                )));
            }
            if self.recipes[..i].iter().any(|r| r.id == recipe.id) {
                return Err(EconomyError::InvalidConfig(format!("duplicate recipe id {}", recipe.id)));
            }
        }

        EquipmentRack::new(self.equipment.clone())?;
        validate_rules(&self.unlocks)
    }

    fn validate_purity(&self) -> EconomyResult<()> {
        let p = &self.purity;
        for (what, value) in [
            ("decay per minute", p.decay_per_minute),
            ("contamination penalty", p.contamination_penalty),
            ("purification gain", p.purification_gain),
            ("overflow penalty scale", p.overflow_penalty_scale),
        ] {
            if !value.is_finite() || !(0.0..=MAX_PURITY).contains(&value) {
                return Err(EconomyError::InvalidConfig(format!("purity {what} {value}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        EconomyConfig::default().validate().unwrap();
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(EconomyConfig::from_toml_str("").unwrap(), EconomyConfig::default());
    }

    #[test]
    fn test_partial_document_overrides_section() {
        let config = EconomyConfig::from_toml_str(
            r"
            [purity]
            decay_per_minute = 1.5

            [crafting]
            catastrophe_radius = 4
            ",
        )
        .unwrap();
        assert_eq!(config.purity.decay_per_minute, 1.5);
        assert_eq!(config.purity.contamination_penalty, 10.0);
        assert_eq!(config.crafting.catastrophe_radius, 4);
        assert_eq!(config.crafting.max_success_rate, 0.95);
        assert_eq!(config.recipes, content::default_recipes());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EconomyConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(EconomyConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_distribution() {
        let result = EconomyConfig::from_toml_str(
            r"
            [crafting.failure_distribution]
            minor = 0.9
            ",
        );
        assert!(matches!(result, Err(EconomyError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_recipe_shares_off_100() {
        let result = EconomyConfig::from_toml_str(
            r#"
            [[recipes]]
            id = 1
            name = "Lopsided"
            ingredients = [
                { emotion = "joy", percent = 70.0 },
                { emotion = "sadness", percent = 40.0 },
            ]
            output = "nostalgia"
            output_formula = { kind = "fixed", amount = "2e0" }
            base_success_rate = 0.9
            batch_size = "1e1"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_short_tier_table() {
        let result = EconomyConfig::from_toml_str(
            r#"
            [[tiers]]
            tier = "smiles"
            capacity = "1e2"
            production_rate = "1e0"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(EconomyConfig::from_toml_str("[purity").is_err());
    }
}
