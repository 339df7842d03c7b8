//! # Recipes
//!
//! **Static recipe definitions plus per-game progress.**
//!
//! [`RecipeDefinition`]s come from the content table and never change at
//! runtime. Everything a game learns about them (discovery, craft counts,
//! best purity) lives in [`RecipeProgress`] records owned by the
//! [`RecipeBook`], alongside recipes synthesized from interesting failures.
//!
//! ## Matching
//!
//! Supplied ingredients are compared against a recipe by percentage overlap:
//!
//! ```text
//! score = sum over recipe ingredients of min(supplied %, recipe %) / 100
//! ```
//!
//! A perfect ratio scores 1.0; an emotion the recipe does not use only
//! dilutes the score.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};
use crate::purity::{Emotion, MAX_PURITY};
use crate::scaled::ScaledNumber;

/// Unique identifier for a recipe.
pub type RecipeId = u32;

/// First id handed to synthesized recipes.
pub const SYNTHESIZED_ID_BASE: RecipeId = 10_000;

/// Percent slack allowed on top of a recipe's own unstable tolerance.
const PERCENT_EPSILON: f64 = 1e-6;

/// One line of a recipe: an emotion and its share of the batch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Required emotion.
    pub emotion: Emotion,
    /// Share of the batch, in percent.
    pub percent: f64,
}

impl Ingredient {
    /// Creates a new ingredient line.
    #[inline]
    #[must_use]
    pub const fn new(emotion: Emotion, percent: f64) -> Self {
        Self { emotion, percent }
    }
}

/// How much output a successful craft yields.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputFormula {
    /// A fixed amount per full batch.
    Fixed {
        /// Units produced.
        amount: ScaledNumber,
    },
    /// `ratio` units per unit of input consumed.
    PerInputUnit {
        /// Output units per input unit.
        ratio: f64,
    },
}

impl OutputFormula {
    /// Output for an attempt that consumed `input_total` units, worth
    /// `batches` full recipe batches (1 for a regular craft).
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` if a ratio or batch count is negative or not finite.
    pub fn output_for(&self, input_total: ScaledNumber, batches: f64) -> EconomyResult<ScaledNumber> {
        match *self {
            Self::Fixed { amount } => amount.scale(batches),
            Self::PerInputUnit { ratio } => input_total.scale(ratio),
        }
    }
}

/// A static recipe from the content table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecipeDefinition {
    /// Unique recipe identifier.
    pub id: RecipeId,
    /// Human-readable name.
    pub name: String,
    /// Ingredient shares; percentages sum to 100 within `unstable_tolerance`.
    pub ingredients: Vec<Ingredient>,
    /// Emotion produced.
    pub output: Emotion,
    /// Output quantity.
    pub output_formula: OutputFormula,
    /// Success probability before modifiers.
    pub base_success_rate: f64,
    /// Purity at which the purity bonus starts.
    #[serde(default)]
    pub min_purity_required: f64,
    /// Chance that a successful output is contaminated.
    #[serde(default)]
    pub contamination_risk: f64,
    /// Extra percent slack for "unstable" recipes.
    #[serde(default)]
    pub unstable_tolerance: f64,
    /// Total input units per craft.
    pub batch_size: ScaledNumber,
    /// Whether the recipe is known from the start.
    #[serde(default)]
    pub discovered_at_start: bool,
}

impl RecipeDefinition {
    /// Checks the definition is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> EconomyResult<()> {
        let fail = |what: String| Err(EconomyError::InvalidConfig(format!("recipe {} ({}): {what}", self.id, self.name)));

        if self.ingredients.is_empty() {
            return fail("no ingredients".to_string());
        }
        for (i, ingredient) in self.ingredients.iter().enumerate() {
            if !ingredient.percent.is_finite() || ingredient.percent <= 0.0 {
                return fail(format!("{} share {}", ingredient.emotion, ingredient.percent));
            }
            if self.ingredients[..i].iter().any(|other| other.emotion == ingredient.emotion) {
                return fail(format!("{} listed twice", ingredient.emotion));
            }
        }
        if !self.unstable_tolerance.is_finite() || self.unstable_tolerance < 0.0 {
            return fail(format!("tolerance {}", self.unstable_tolerance));
        }
        let total: f64 = self.ingredients.iter().map(|i| i.percent).sum();
        if (total - 100.0).abs() > self.unstable_tolerance + PERCENT_EPSILON {
            return fail(format!("shares sum to {total}"));
        }
        if !(0.0..=1.0).contains(&self.base_success_rate) {
            return fail(format!("base success rate {}", self.base_success_rate));
        }
        if !(0.0..=1.0).contains(&self.contamination_risk) {
            return fail(format!("contamination risk {}", self.contamination_risk));
        }
        if !(0.0..=MAX_PURITY).contains(&self.min_purity_required) {
            return fail(format!("min purity {}", self.min_purity_required));
        }
        if self.batch_size.is_zero() {
            return fail("zero batch size".to_string());
        }
        if let OutputFormula::PerInputUnit { ratio } = self.output_formula {
            if !ratio.is_finite() || ratio < 0.0 {
                return fail(format!("output ratio {ratio}"));
            }
        }
        Ok(())
    }

    /// Share of `emotion` in percent (0 if unused).
    #[must_use]
    pub fn percent_of(&self, emotion: Emotion) -> f64 {
        self.ingredients
            .iter()
            .find(|i| i.emotion == emotion)
            .map_or(0.0, |i| i.percent)
    }

    /// Units of each ingredient one craft needs: `batch_size * percent / 100`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMagnitude` for a malformed percentage.
    pub fn requirements(&self) -> EconomyResult<Vec<(Emotion, ScaledNumber)>> {
        self.ingredients
            .iter()
            .map(|i| Ok((i.emotion, self.batch_size.scale(i.percent / 100.0)?)))
            .collect()
    }

    /// Percentage-overlap score against supplied ratios, in `[0, 1]`.
    #[must_use]
    pub fn match_score(&self, supplied: &[(Emotion, f64)]) -> f64 {
        let overlap: f64 = self
            .ingredients
            .iter()
            .map(|ingredient| {
                let offered: f64 = supplied
                    .iter()
                    .filter(|(emotion, _)| *emotion == ingredient.emotion)
                    .map(|(_, percent)| *percent)
                    .sum();
                offered.min(ingredient.percent)
            })
            .sum();
        (overlap / 100.0).clamp(0.0, 1.0)
    }
}

/// Converts supplied amounts into per-emotion percentages summing to 100.
///
/// Repeated emotions are merged; order follows first appearance.
#[must_use]
pub fn supplied_ratios(supplied: &[(Emotion, ScaledNumber)]) -> Vec<(Emotion, f64)> {
    let mut merged: Vec<(Emotion, ScaledNumber)> = Vec::new();
    for (emotion, amount) in supplied {
        match merged.iter_mut().find(|(e, _)| e == emotion) {
            Some((_, total)) => *total = *total + *amount,
            None => merged.push((*emotion, *amount)),
        }
    }
    let total: ScaledNumber = merged.iter().map(|(_, amount)| *amount).sum();
    merged
        .into_iter()
        .map(|(emotion, amount)| (emotion, amount.ratio(total) * 100.0))
        .collect()
}

/// What one game has learned about one recipe.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeProgress {
    /// Known to the player.
    pub discovered: bool,
    /// Successful crafts.
    pub times_crafted: u32,
    /// Resolved attempts, successful or not.
    pub attempts: u32,
    /// Best output purity so far.
    pub best_purity_achieved: f64,
}

/// Static recipe table, synthesized recipes, and per-game progress.
#[derive(Clone, Debug)]
pub struct RecipeBook {
    table: Arc<[RecipeDefinition]>,
    synthesized: Vec<RecipeDefinition>,
    progress: BTreeMap<RecipeId, RecipeProgress>,
}

impl RecipeBook {
    /// Creates a book over a static table; recipes flagged `discovered_at_start` start known.
    #[must_use]
    pub fn new(table: Arc<[RecipeDefinition]>) -> Self {
        let progress = table
            .iter()
            .map(|r| {
                (
                    r.id,
                    RecipeProgress {
                        discovered: r.discovered_at_start,
                        ..RecipeProgress::default()
                    },
                )
            })
            .collect();
        Self {
            table,
            synthesized: Vec::new(),
            progress,
        }
    }

    /// Looks up a static or synthesized recipe.
    #[must_use]
    pub fn get(&self, id: RecipeId) -> Option<&RecipeDefinition> {
        self.table
            .iter()
            .chain(self.synthesized.iter())
            .find(|r| r.id == id)
    }

    /// Looks up a recipe or fails with `RecipeNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `RecipeNotFound` for an unknown id.
    pub fn definition(&self, id: RecipeId) -> EconomyResult<&RecipeDefinition> {
        self.get(id).ok_or(EconomyError::RecipeNotFound(id))
    }

    /// All recipes, static first, then synthesized.
    pub fn iter(&self) -> impl Iterator<Item = &RecipeDefinition> {
        self.table.iter().chain(self.synthesized.iter())
    }

    /// Recipes synthesized in this game.
    #[must_use]
    pub fn synthesized(&self) -> &[RecipeDefinition] {
        &self.synthesized
    }

    /// Progress for a recipe (default for unknown ids).
    #[must_use]
    pub fn progress(&self, id: RecipeId) -> RecipeProgress {
        self.progress.get(&id).cloned().unwrap_or_default()
    }

    /// Whether the recipe is known.
    #[must_use]
    pub fn is_discovered(&self, id: RecipeId) -> bool {
        self.progress.get(&id).is_some_and(|p| p.discovered)
    }

    /// Number of discovered recipes.
    #[must_use]
    pub fn discovered_count(&self) -> usize {
        self.progress.values().filter(|p| p.discovered).count()
    }

    /// Successful crafts across all recipes.
    #[must_use]
    pub fn total_crafted(&self) -> u64 {
        self.progress.values().map(|p| u64::from(p.times_crafted)).sum()
    }

    /// Highest-scoring recipe among the discovered (or undiscovered) ones.
    ///
    /// Ties go to the lowest id.
    #[must_use]
    pub fn best_match(&self, supplied: &[(Emotion, f64)], discovered: bool) -> Option<(RecipeId, f64)> {
        let mut best: Option<(RecipeId, f64)> = None;
        for recipe in self.iter().filter(|r| self.is_discovered(r.id) == discovered) {
            let score = recipe.match_score(supplied);
            let better = match best {
                None => true,
                Some((id, best_score)) => score > best_score || (score == best_score && recipe.id < id),
            };
            if better {
                best = Some((recipe.id, score));
            }
        }
        best
    }

    /// Flags a recipe discovered; returns `true` if it was not known before.
    pub(crate) fn mark_discovered(&mut self, id: RecipeId) -> bool {
        let progress = self.progress.entry(id).or_default();
        let newly = !progress.discovered;
        progress.discovered = true;
        newly
    }

    /// Books one resolved attempt; `output_purity` is set on success.
    pub(crate) fn record_attempt(&mut self, id: RecipeId, output_purity: Option<f64>) {
        let progress = self.progress.entry(id).or_default();
        progress.attempts = progress.attempts.saturating_add(1);
        if let Some(purity) = output_purity {
            progress.times_crafted = progress.times_crafted.saturating_add(1);
            progress.discovered = true;
            progress.best_purity_achieved = progress.best_purity_achieved.max(purity);
        }
    }

    /// Adds a recipe matching `ratios` unless an identical one was synthesized already.
    ///
    /// Returns the recipe id and whether it is new.
    pub(crate) fn synthesize(
        &mut self,
        ratios: &[(Emotion, f64)],
        base_success_rate: f64,
        batch_size: ScaledNumber,
    ) -> (RecipeId, bool) {
        let mut ingredients: Vec<Ingredient> = ratios
            .iter()
            .filter(|(_, percent)| *percent > 0.0)
            .map(|(emotion, percent)| Ingredient::new(*emotion, (percent * 100.0).round() / 100.0))
            .collect();
        ingredients.sort_by_key(|i| i.emotion);

        if let Some(existing) = self.synthesized.iter().find(|r| r.ingredients == ingredients) {
            return (existing.id, false);
        }

        let id = SYNTHESIZED_ID_BASE + self.synthesized.len() as RecipeId;
        let name = ingredients
            .iter()
            .map(|i| i.emotion.name())
            .collect::<Vec<_>>()
            .join("-");
        self.synthesized.push(RecipeDefinition {
            id,
            name: format!("Enigma of {name}"),
            ingredients,
            output: Emotion::Enigma,
            output_formula: OutputFormula::PerInputUnit { ratio: 0.1 },
            base_success_rate,
            min_purity_required: 0.0,
            contamination_risk: 0.0,
            unstable_tolerance: 1.0,
            batch_size,
            discovered_at_start: false,
        });
        self.mark_discovered(id);
        tracing::info!(recipe = id, "recipe synthesized");
        (id, true)
    }

    /// Exports the per-game records.
    #[must_use]
    pub fn to_state(&self) -> RecipeBookState {
        RecipeBookState {
            progress: self
                .progress
                .iter()
                .map(|(id, progress)| RecipeProgressState {
                    id: *id,
                    progress: progress.clone(),
                })
                .collect(),
            synthesized: self.synthesized.clone(),
        }
    }

    /// Rebuilds a book from a static table and saved records.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for invalid synthesized recipes or progress on unknown ids.
    pub fn from_state(table: Arc<[RecipeDefinition]>, state: &RecipeBookState) -> EconomyResult<Self> {
        let mut book = Self::new(table);
        for recipe in &state.synthesized {
            if recipe.id < SYNTHESIZED_ID_BASE || book.get(recipe.id).is_some() {
                return Err(EconomyError::InvalidState(format!(
                    "synthesized recipe id {} is reserved or duplicated",
                    recipe.id
                )));
            }
            recipe
                .validate()
                .map_err(|e| EconomyError::InvalidState(e.to_string()))?;
            book.synthesized.push(recipe.clone());
        }
        for record in &state.progress {
            if book.get(record.id).is_none() {
                return Err(EconomyError::InvalidState(format!(
                    "progress recorded for unknown recipe {}",
                    record.id
                )));
            }
            book.progress.insert(record.id, record.progress.clone());
        }
        Ok(book)
    }
}

/// Persisted progress for one recipe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecipeProgressState {
    /// Recipe id.
    pub id: RecipeId,
    /// Saved progress.
    pub progress: RecipeProgress,
}

/// Plain persisted form of a [`RecipeBook`] (the static table is not saved).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeBookState {
    /// Progress per recipe.
    #[serde(default)]
    pub progress: Vec<RecipeProgressState>,
    /// Recipes synthesized in this game.
    #[serde(default)]
    pub synthesized: Vec<RecipeDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content;

    fn book() -> RecipeBook {
        RecipeBook::new(content::default_recipes().into())
    }

    #[test]
    fn test_default_recipes_validate() {
        for recipe in content::default_recipes() {
            recipe.validate().unwrap();
        }
    }

    #[test]
    fn test_validation_rejects_bad_shares() {
        let mut recipe = content::default_recipes()[0].clone();
        recipe.ingredients[0].percent = 50.0;
        assert!(recipe.validate().is_err());

        recipe.unstable_tolerance = 10.0;
        assert!(recipe.validate().is_ok());

        recipe.ingredients[1].emotion = recipe.ingredients[0].emotion;
        assert!(recipe.validate().is_err());
    }

    #[test]
    fn test_requirements() {
        let book = book();
        let bittersweet = book.definition(content::BITTERSWEET).unwrap();
        let needs = bittersweet.requirements().unwrap();
        assert_eq!(needs[0], (Emotion::Joy, ScaledNumber::from_count(6)));
        assert_eq!(needs[1], (Emotion::Sadness, ScaledNumber::from_count(4)));
    }

    #[test]
    fn test_match_score() {
        let book = book();
        let bittersweet = book.definition(content::BITTERSWEET).unwrap();
        assert!((bittersweet.match_score(&[(Emotion::Joy, 60.0), (Emotion::Sadness, 40.0)]) - 1.0).abs() < 1e-12);
        assert!((bittersweet.match_score(&[(Emotion::Joy, 50.0), (Emotion::Sadness, 50.0)]) - 0.9).abs() < 1e-12);
        assert!((bittersweet.match_score(&[(Emotion::Joy, 100.0)]) - 0.6).abs() < 1e-12);
        assert_eq!(bittersweet.match_score(&[(Emotion::Fear, 100.0)]), 0.0);
    }

    #[test]
    fn test_supplied_ratios_merge() {
        let ratios = supplied_ratios(&[
            (Emotion::Joy, ScaledNumber::from_count(3)),
            (Emotion::Sadness, ScaledNumber::from_count(4)),
            (Emotion::Joy, ScaledNumber::from_count(3)),
        ]);
        assert_eq!(ratios.len(), 2);
        assert_eq!(ratios[0].0, Emotion::Joy);
        assert!((ratios[0].1 - 60.0).abs() < 1e-9);
        assert!((ratios[1].1 - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_discovery_flags() {
        let mut book = book();
        assert!(book.is_discovered(content::BITTERSWEET));
        assert!(!book.is_discovered(content::SERENE_FURY));
        assert!(book.mark_discovered(content::SERENE_FURY));
        assert!(!book.mark_discovered(content::SERENE_FURY));
    }

    #[test]
    fn test_record_attempt() {
        let mut book = book();
        book.record_attempt(content::BITTERSWEET, None);
        book.record_attempt(content::BITTERSWEET, Some(82.0));
        book.record_attempt(content::BITTERSWEET, Some(75.0));
        let progress = book.progress(content::BITTERSWEET);
        assert_eq!(progress.attempts, 3);
        assert_eq!(progress.times_crafted, 2);
        assert_eq!(progress.best_purity_achieved, 82.0);
        assert_eq!(book.total_crafted(), 2);
    }

    #[test]
    fn test_best_match_ties_lowest_id() {
        let table: Arc<[RecipeDefinition]> = vec![
            recipe_with(7, Emotion::Joy, Emotion::Fear),
            recipe_with(3, Emotion::Joy, Emotion::Fear),
        ]
        .into();
        let book = RecipeBook::new(table);
        let best = book.best_match(&[(Emotion::Joy, 50.0), (Emotion::Fear, 50.0)], false);
        assert_eq!(best, Some((3, 1.0)));
        assert_eq!(book.best_match(&[(Emotion::Joy, 100.0)], true), None);
    }

    fn recipe_with(id: RecipeId, a: Emotion, b: Emotion) -> RecipeDefinition {
        RecipeDefinition {
            id,
            name: format!("test {id}"),
            ingredients: vec![Ingredient::new(a, 50.0), Ingredient::new(b, 50.0)],
            output: Emotion::Wonder,
            output_formula: OutputFormula::Fixed {
                amount: ScaledNumber::ONE,
            },
            base_success_rate: 0.5,
            min_purity_required: 0.0,
            contamination_risk: 0.0,
            unstable_tolerance: 0.0,
            batch_size: ScaledNumber::from_count(10),
            discovered_at_start: false,
        }
    }

    #[test]
    fn test_synthesize_dedupes() {
        let mut book = book();
        let ratios = [(Emotion::Fear, 70.0), (Emotion::Joy, 30.0)];
        let (first, new) = book.synthesize(&ratios, 0.5, ScaledNumber::from_count(10));
        assert!(new);
        assert_eq!(first, SYNTHESIZED_ID_BASE);
        assert!(book.is_discovered(first));
        assert_eq!(book.definition(first).unwrap().output, Emotion::Enigma);
        book.definition(first).unwrap().validate().unwrap();

        let reordered = [(Emotion::Joy, 30.0), (Emotion::Fear, 70.0)];
        let (second, new) = book.synthesize(&reordered, 0.5, ScaledNumber::from_count(10));
        assert!(!new);
        assert_eq!(second, first);
        assert_eq!(book.synthesized().len(), 1);
    }

    #[test]
    fn test_state_round_trip() {
        let mut book = book();
        book.record_attempt(content::BITTERSWEET, Some(91.5));
        book.synthesize(&[(Emotion::Calm, 100.0)], 0.5, ScaledNumber::from_count(5));

        let state = book.to_state();
        let table: Arc<[RecipeDefinition]> = content::default_recipes().into();
        let restored = RecipeBook::from_state(table.clone(), &state).unwrap();
        assert_eq!(restored.to_state(), state);

        let mut bogus = state;
        bogus.progress.push(RecipeProgressState {
            id: 4_242,
            progress: RecipeProgress::default(),
        });
        assert!(RecipeBook::from_state(table, &bogus).is_err());
    }

    #[test]
    fn test_definition_round_trip_boundary_values() {
        let values = [
            ScaledNumber::ZERO,
            ScaledNumber::ONE,
            ScaledNumber::from_native(9.999_999).unwrap(),
            ScaledNumber::from_native(1e308).unwrap(),
            ScaledNumber::from_native(1e-10).unwrap(),
        ];
        for value in values {
            let mut fixed = recipe_with(9, Emotion::Joy, Emotion::Calm);
            fixed.output_formula = OutputFormula::Fixed { amount: value };
            fixed.batch_size = value;
            let text = toml::to_string(&fixed).unwrap();
            assert_eq!(toml::from_str::<RecipeDefinition>(&text).unwrap(), fixed);

            if value.is_zero() {
                continue;
            }
            // synthesized records travel inside the book state
            let mut book = book();
            book.synthesize(&[(Emotion::Fear, 40.0), (Emotion::Love, 60.0)], 0.5, value);
            let state = book.to_state();
            let table: Arc<[RecipeDefinition]> = content::default_recipes().into();
            let restored = RecipeBook::from_state(table, &state).unwrap();
            assert_eq!(restored.to_state(), state);
            assert_eq!(restored.synthesized()[0].batch_size, value);
        }
    }

    #[test]
    fn test_output_formula() {
        let fixed = OutputFormula::Fixed {
            amount: ScaledNumber::from_count(2),
        };
        assert_eq!(
            fixed.output_for(ScaledNumber::from_count(10), 1.0).unwrap(),
            ScaledNumber::from_count(2)
        );
        // a hundredth of a batch makes a hundredth of the output
        let sip = fixed.output_for(ScaledNumber::from_native(0.1).unwrap(), 0.01).unwrap();
        assert!((sip.to_f64() - 0.02).abs() < 1e-12);
        assert!(fixed.output_for(ScaledNumber::ONE, -1.0).is_err());

        let per_unit = OutputFormula::PerInputUnit { ratio: 0.5 };
        assert_eq!(
            per_unit.output_for(ScaledNumber::from_count(10), 3.0).unwrap(),
            ScaledNumber::from_count(5)
        );
    }
}
