//! # Recipe Resolution
//!
//! **One craft attempt, from validation to committed outcome.**
//!
//! Every attempt walks the same pipeline:
//!
//! ```text
//! Idle -> Validating -> RateComputed -> Resolved
//!                                        |- Success
//!                                        |- MinorFailure
//!                                        |- MajorFailure
//!                                        |- Catastrophic
//!                                        '- InterestingFailure
//! ```
//!
//! Validation touches nothing: an attempt that fails validation returns an
//! error and leaves the ledger, the recipe book and the equipment exactly as
//! they were. Once an attempt reaches `Resolved`, all of its mutations are
//! applied together before the report is returned.
//!
//! ## Success Rate
//!
//! ```text
//! rate = base
//!      + level_bonus * level
//!      + equipment bonus (5-15 %, 0 on the bare bench)
//!      + purity_step_bonus * floor((weighted purity - min purity) / purity_step)
//!      + discovery bonus (experiments only)
//!      - low purity penalty (any input below the threshold)
//!      - complexity_penalty * (ingredients beyond the free count)
//!      - pending penalty from a previous major failure
//! ```
//!
//! All modifiers are summed first and the total is clamped to
//! `[0, max_success_rate]` last.
//!
//! ## Determinism
//!
//! Every uniform value comes from the injected [`RandomSource`]: one draw
//! decides success, a second picks the failure kind, a third (only for
//! recipes with a contamination risk) decides whether a success is tainted.

use serde::{Deserialize, Serialize};

use crate::equipment::{EquipmentId, EquipmentRack};
use crate::error::{EconomyError, EconomyResult};
use crate::ledger::ResourceLedger;
use crate::purity::{blend_purity, BatchId, Emotion, MAX_PURITY};
use crate::random::RandomSource;
use crate::recipe::{supplied_ratios, RecipeBook, RecipeDefinition, RecipeId};
use crate::scaled::ScaledNumber;

/// Failure kinds, in the order the failure draw walks them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Half the ingredients lost, sludge produced.
    Minor,
    /// All ingredients lost, next attempt penalized.
    Major,
    /// All ingredients lost, nearby batches contaminated, equipment damaged.
    Catastrophic,
    /// Ingredients consumed, a new recipe is synthesized.
    Interesting,
}

/// Probabilities of each failure kind; they sum to 1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureDistribution {
    /// Chance of a minor failure.
    pub minor: f64,
    /// Chance of a major failure.
    pub major: f64,
    /// Chance of a catastrophic failure.
    pub catastrophic: f64,
    /// Chance of an interesting failure.
    pub interesting: f64,
}

impl Default for FailureDistribution {
    fn default() -> Self {
        Self {
            minor: 0.50,
            major: 0.35,
            catastrophic: 0.10,
            interesting: 0.05,
        }
    }
}

impl FailureDistribution {
    /// Maps a uniform draw to a failure kind.
    #[must_use]
    pub fn pick(&self, draw: f64) -> FailureKind {
        let mut threshold = self.minor;
        if draw < threshold {
            return FailureKind::Minor;
        }
        threshold += self.major;
        if draw < threshold {
            return FailureKind::Major;
        }
        threshold += self.catastrophic;
        if draw < threshold {
            return FailureKind::Catastrophic;
        }
        FailureKind::Interesting
    }

    fn validate(&self) -> EconomyResult<()> {
        let parts = [self.minor, self.major, self.catastrophic, self.interesting];
        if parts.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(EconomyError::InvalidConfig(format!("failure distribution {parts:?}")));
        }
        let total: f64 = parts.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(EconomyError::InvalidConfig(format!(
                "failure distribution sums to {total}"
            )));
        }
        Ok(())
    }
}

/// Tuning for craft resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraftingConfig {
    /// Upper clamp on the final success rate.
    pub max_success_rate: f64,
    /// Bonus per alchemist level.
    pub level_bonus: f64,
    /// Purity points per purity bonus step.
    pub purity_step: f64,
    /// Bonus per purity step above the recipe minimum.
    pub purity_step_bonus: f64,
    /// Inputs below this effective purity trigger the low purity penalty.
    pub low_purity_threshold: f64,
    /// Penalty when any input is below the threshold.
    pub low_purity_penalty: f64,
    /// Ingredient count with no complexity penalty.
    pub free_ingredients: u32,
    /// Penalty per ingredient beyond the free count.
    pub complexity_penalty: f64,
    /// Penalty a major failure leaves on the station's next attempt.
    pub major_failure_penalty: f64,
    /// Shelves around the station hit by a catastrophe.
    pub catastrophe_radius: u32,
    /// Failure kind probabilities.
    pub failure_distribution: FailureDistribution,
    /// Score an undiscovered recipe needs to be attempted from an experiment.
    pub discovery_threshold: f64,
    /// Score at which an experiment is treated as a known recipe.
    pub known_match_threshold: f64,
    /// Bonus for attempting an undiscovered recipe by experiment.
    pub discovery_bonus: f64,
    /// Chance an unmatched experiment yields Contaminated Mix.
    pub contaminated_mix_chance: f64,
    /// Purity of sludge batches.
    pub sludge_purity: f64,
    /// XP for an interesting failure.
    pub interesting_xp: u64,
    /// XP for a success.
    pub success_xp: u64,
    /// Base rate of synthesized recipes.
    pub synthesized_base_rate: f64,
}

impl Default for CraftingConfig {
    fn default() -> Self {
        Self {
            max_success_rate: 0.95,
            level_bonus: 0.02,
            purity_step: 5.0,
            purity_step_bonus: 0.01,
            low_purity_threshold: 50.0,
            low_purity_penalty: 0.05,
            free_ingredients: 3,
            complexity_penalty: 0.05,
            major_failure_penalty: 0.05,
            catastrophe_radius: 2,
            failure_distribution: FailureDistribution::default(),
            discovery_threshold: 0.80,
            known_match_threshold: 0.95,
            discovery_bonus: 0.10,
            contaminated_mix_chance: 0.70,
            sludge_purity: 10.0,
            interesting_xp: 50,
            success_xp: 10,
            synthesized_base_rate: 0.50,
        }
    }
}

impl CraftingConfig {
    /// Checks probabilities and thresholds are in range.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem.
    pub fn validate(&self) -> EconomyResult<()> {
        self.failure_distribution.validate()?;
        for (what, value) in [
            ("max success rate", self.max_success_rate),
            ("discovery threshold", self.discovery_threshold),
            ("known match threshold", self.known_match_threshold),
            ("contaminated mix chance", self.contaminated_mix_chance),
            ("synthesized base rate", self.synthesized_base_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EconomyError::InvalidConfig(format!("{what} {value} outside [0, 1]")));
            }
        }
        for (what, value) in [
            ("level bonus", self.level_bonus),
            ("purity step bonus", self.purity_step_bonus),
            ("low purity penalty", self.low_purity_penalty),
            ("complexity penalty", self.complexity_penalty),
            ("major failure penalty", self.major_failure_penalty),
            ("discovery bonus", self.discovery_bonus),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EconomyError::InvalidConfig(format!("{what} {value}")));
            }
        }
        if !self.purity_step.is_finite() || self.purity_step <= 0.0 {
            return Err(EconomyError::InvalidConfig(format!("purity step {}", self.purity_step)));
        }
        if !(0.0..=MAX_PURITY).contains(&self.sludge_purity) {
            return Err(EconomyError::InvalidConfig(format!("sludge purity {}", self.sludge_purity)));
        }
        Ok(())
    }
}

/// Everything the success rate depends on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateInputs {
    /// Recipe base rate.
    pub base_success_rate: f64,
    /// Alchemist level.
    pub alchemist_level: u32,
    /// Station success bonus (already clamped to 5-15 %, or 0).
    pub equipment_bonus: f64,
    /// Amount-weighted effective purity of the inputs.
    pub weighted_purity: f64,
    /// Recipe minimum purity.
    pub min_purity_required: f64,
    /// Lowest effective input purity.
    pub lowest_purity: f64,
    /// Number of distinct ingredients.
    pub ingredient_count: usize,
    /// Penalty left by a previous major failure.
    pub pending_penalty: f64,
    /// Whether this is an experimental attempt on an undiscovered recipe.
    pub discovery: bool,
}

/// The success rate and each term that went into it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateBreakdown {
    /// Recipe base rate.
    pub base: f64,
    /// Alchemist level term.
    pub level_bonus: f64,
    /// Equipment term.
    pub equipment_bonus: f64,
    /// Purity term.
    pub purity_bonus: f64,
    /// Discovery term.
    pub discovery_bonus: f64,
    /// Low purity term (subtracted).
    pub low_purity_penalty: f64,
    /// Complexity term (subtracted).
    pub complexity_penalty: f64,
    /// Pending penalty (subtracted).
    pub pending_penalty: f64,
    /// Clamped rate used for the draw.
    pub final_rate: f64,
}

impl RateBreakdown {
    /// Sum of all terms before clamping.
    #[must_use]
    pub fn unclamped(&self) -> f64 {
        self.base + self.level_bonus + self.equipment_bonus + self.purity_bonus + self.discovery_bonus
            - self.low_purity_penalty
            - self.complexity_penalty
            - self.pending_penalty
    }
}

/// A craft on a known recipe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CraftRequest {
    /// Recipe to craft.
    pub recipe: RecipeId,
    /// Batches to draw from; the first batch of each required emotion is used.
    pub inputs: Vec<BatchId>,
    /// Station, `None` for the bare bench.
    pub equipment: Option<EquipmentId>,
}

/// A freeform mix of batches.
#[derive(Clone, Debug, PartialEq)]
pub struct ExperimentRequest {
    /// Batches and the exact amounts to pour from each.
    pub inputs: Vec<(BatchId, ScaledNumber)>,
    /// Station, `None` for the bare bench.
    pub equipment: Option<EquipmentId>,
}

/// Final state of an attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CraftOutcome {
    /// Output produced.
    Success {
        /// New output batch.
        batch: BatchId,
        /// Units produced.
        amount: ScaledNumber,
        /// Output purity.
        purity: f64,
    },
    /// Half the inputs lost; sludge produced.
    MinorFailure {
        /// Sludge batch, if any sludge was made.
        sludge: Option<BatchId>,
    },
    /// Inputs lost; next attempt on the station penalized.
    MajorFailure,
    /// Inputs lost; surroundings contaminated; equipment damaged.
    Catastrophic {
        /// Batches contaminated around the station.
        batches_contaminated: usize,
        /// Equipment that is now damaged (`None` on the bare bench).
        equipment_damaged: Option<EquipmentId>,
    },
    /// Inputs consumed into a brand new recipe.
    InterestingFailure {
        /// The synthesized (or previously synthesized) recipe.
        recipe: RecipeId,
        /// Whether the recipe record was created by this attempt.
        newly_synthesized: bool,
    },
    /// Unmatched experiment: the mix spoiled.
    ContaminatedMix {
        /// Sludge batch, if any sludge was made.
        sludge: Option<BatchId>,
    },
    /// Unmatched experiment: something strange came out.
    UnknownRecipe {
        /// Enigma batch, if anything was made.
        batch: Option<BatchId>,
    },
}

impl CraftOutcome {
    /// Whether the attempt succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The failure kind, for recipe failures.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::MinorFailure { .. } => Some(FailureKind::Minor),
            Self::MajorFailure => Some(FailureKind::Major),
            Self::Catastrophic { .. } => Some(FailureKind::Catastrophic),
            Self::InterestingFailure { .. } => Some(FailureKind::Interesting),
            Self::Success { .. } | Self::ContaminatedMix { .. } | Self::UnknownRecipe { .. } => None,
        }
    }
}

/// Everything one resolved attempt did.
#[derive(Clone, Debug, PartialEq)]
pub struct CraftReport {
    /// Recipe attempted (`None` for unmatched experiments).
    pub recipe: Option<RecipeId>,
    /// Station used.
    pub equipment: Option<EquipmentId>,
    /// Rate and its terms (`None` for unmatched experiments).
    pub rate: Option<RateBreakdown>,
    /// What happened.
    pub outcome: CraftOutcome,
    /// Amounts taken from each batch.
    pub consumed: Vec<(BatchId, ScaledNumber)>,
    /// Whether the attempted recipe became known through this attempt.
    pub newly_discovered: bool,
    /// XP earned.
    pub xp_awarded: u64,
}

/// Mutable game state a craft reads and writes.
#[derive(Debug)]
pub struct Workbench<'a> {
    /// Tier stock and stored batches.
    pub ledger: &'a mut ResourceLedger,
    /// Recipes and progress.
    pub book: &'a mut RecipeBook,
    /// Equipment and the bare bench.
    pub rack: &'a mut EquipmentRack,
    /// Current alchemist level.
    pub alchemist_level: u32,
}

/// One batch contributing to an attempt.
#[derive(Clone, Copy, Debug)]
struct InputDraw {
    batch: BatchId,
    emotion: Emotion,
    amount: ScaledNumber,
    purity: f64,
}

/// Validating -> RateComputed: inputs located and checked, nothing mutated.
#[derive(Debug)]
struct Validated {
    recipe: RecipeDefinition,
    draws: Vec<InputDraw>,
    station: Option<EquipmentId>,
    discovery: bool,
    /// Full recipe batches the draws amount to.
    batches: f64,
}

/// RateComputed -> Resolved: the only state from which mutation happens.
#[derive(Debug)]
struct RateComputed {
    validated: Validated,
    rate: RateBreakdown,
}

/// Resolves craft attempts against injected randomness.
#[derive(Clone, Copy, Debug)]
pub struct RecipeResolver<'c> {
    config: &'c CraftingConfig,
}

impl<'c> RecipeResolver<'c> {
    /// Creates a resolver over the given tuning.
    #[must_use]
    pub const fn new(config: &'c CraftingConfig) -> Self {
        Self { config }
    }

    /// Computes the clamped success rate.
    #[must_use]
    pub fn success_rate(&self, inputs: &RateInputs) -> RateBreakdown {
        let c = self.config;
        let above_min = (inputs.weighted_purity - inputs.min_purity_required).max(0.0);
        let purity_steps = (above_min / c.purity_step).floor();
        let extra_ingredients = inputs
            .ingredient_count
            .saturating_sub(c.free_ingredients as usize);

        let mut breakdown = RateBreakdown {
            base: inputs.base_success_rate,
            level_bonus: c.level_bonus * f64::from(inputs.alchemist_level),
            equipment_bonus: inputs.equipment_bonus,
            purity_bonus: purity_steps * c.purity_step_bonus,
            discovery_bonus: if inputs.discovery { c.discovery_bonus } else { 0.0 },
            low_purity_penalty: if inputs.lowest_purity < c.low_purity_threshold {
                c.low_purity_penalty
            } else {
                0.0
            },
            complexity_penalty: c.complexity_penalty * extra_ingredients as f64,
            pending_penalty: inputs.pending_penalty,
            final_rate: 0.0,
        };
        let total = breakdown.unclamped();
        breakdown.final_rate = if total.is_finite() {
            total.clamp(0.0, c.max_success_rate)
        } else {
            0.0
        };
        breakdown
    }

    /// Attempts a craft on a recipe.
    ///
    /// # Errors
    ///
    /// `RecipeNotFound`, `UnknownRecipe` (undiscovered), `EquipmentNotFound`,
    /// `EquipmentDamaged` or `InsufficientIngredients`. Nothing is mutated on error.
    pub fn attempt_craft<R: RandomSource + ?Sized>(
        &self,
        bench: &mut Workbench<'_>,
        request: &CraftRequest,
        rng: &mut R,
    ) -> EconomyResult<CraftReport> {
        let validated = Self::validate_craft(bench, request)?;
        self.finish(bench, validated, rng)
    }

    /// Mixes arbitrary batches and sees what happens.
    ///
    /// A mix that matches a known recipe is crafted normally; one that
    /// closely matches an undiscovered recipe is attempted with the
    /// discovery bonus; anything else spoils or turns into an enigma.
    ///
    /// # Errors
    ///
    /// `InvalidMagnitude` (empty mix or zero amounts), `BatchNotFound`,
    /// `InsufficientIngredients`, `EquipmentNotFound` or `EquipmentDamaged`.
    /// Nothing is mutated on error.
    pub fn experiment<R: RandomSource + ?Sized>(
        &self,
        bench: &mut Workbench<'_>,
        request: &ExperimentRequest,
        rng: &mut R,
    ) -> EconomyResult<CraftReport> {
        bench.rack.check_usable(request.equipment)?;
        let draws = Self::validate_supplied(bench.ledger, &request.inputs)?;
        let amounts: Vec<(Emotion, ScaledNumber)> = draws.iter().map(|d| (d.emotion, d.amount)).collect();
        let ratios = supplied_ratios(&amounts);

        let known = bench
            .book
            .best_match(&ratios, true)
            .filter(|(_, score)| *score >= self.config.known_match_threshold);
        let candidate = known.map(|(id, score)| (id, score, false)).or_else(|| {
            bench
                .book
                .best_match(&ratios, false)
                .filter(|(_, score)| *score >= self.config.discovery_threshold)
                .map(|(id, score)| (id, score, true))
        });

        match candidate {
            Some((id, score, discovery)) => {
                let recipe = bench.book.definition(id)?.clone();
                // the mix is crafted at the size poured, not as a full batch
                let poured: ScaledNumber = draws.iter().map(|d| d.amount).sum();
                let batches = poured.ratio(recipe.batch_size);
                tracing::debug!(recipe = id, score, discovery, batches, "experiment matched recipe");
                let validated = Validated {
                    recipe,
                    draws,
                    station: request.equipment,
                    discovery,
                    batches,
                };
                self.finish(bench, validated, rng)
            }
            None => self.fallback(bench, draws, request.equipment, rng),
        }
    }

    fn validate_craft(bench: &Workbench<'_>, request: &CraftRequest) -> EconomyResult<Validated> {
        tracing::debug!(recipe = request.recipe, "craft validating");
        let recipe = bench.book.definition(request.recipe)?;
        if !bench.book.is_discovered(recipe.id) {
            return Err(EconomyError::UnknownRecipe(recipe.id));
        }
        bench.rack.check_usable(request.equipment)?;

        let cellar = bench.ledger.cellar();
        let tracker = bench.ledger.tracker();
        let mut draws = Vec::with_capacity(recipe.ingredients.len());
        for (emotion, required) in recipe.requirements()? {
            let batch = request
                .inputs
                .iter()
                .filter_map(|id| cellar.get(*id))
                .find(|b| b.emotion() == emotion);
            match batch {
                Some(batch) if batch.amount() >= required => draws.push(InputDraw {
                    batch: batch.id(),
                    emotion,
                    amount: required,
                    purity: tracker.effective_purity(batch, batch.container_quality()),
                }),
                _ => {
                    return Err(EconomyError::InsufficientIngredients {
                        emotion,
                        required: required.to_string(),
                        available: batch.map_or(ScaledNumber::ZERO, |b| b.amount()).to_string(),
                    })
                }
            }
        }
        Ok(Validated {
            recipe: recipe.clone(),
            draws,
            station: request.equipment,
            discovery: false,
            batches: 1.0,
        })
    }

    fn validate_supplied(
        ledger: &ResourceLedger,
        inputs: &[(BatchId, ScaledNumber)],
    ) -> EconomyResult<Vec<InputDraw>> {
        if inputs.is_empty() {
            return Err(EconomyError::magnitude("empty experiment"));
        }
        let mut draws: Vec<InputDraw> = Vec::with_capacity(inputs.len());
        for (id, amount) in inputs {
            if amount.is_zero() {
                return Err(EconomyError::magnitude(format_args!("zero amount from batch {id}")));
            }
            let batch = ledger.cellar().get(*id).ok_or(EconomyError::BatchNotFound(*id))?;
            let poured: ScaledNumber = draws
                .iter()
                .filter(|d| d.batch == *id)
                .map(|d| d.amount)
                .sum::<ScaledNumber>()
                + *amount;
            if batch.amount() < poured {
                return Err(EconomyError::InsufficientIngredients {
                    emotion: batch.emotion(),
                    required: poured.to_string(),
                    available: batch.amount().to_string(),
                });
            }
            draws.push(InputDraw {
                batch: *id,
                emotion: batch.emotion(),
                amount: *amount,
                purity: ledger.tracker().effective_purity(batch, batch.container_quality()),
            });
        }
        Ok(draws)
    }

    fn finish<R: RandomSource + ?Sized>(
        &self,
        bench: &mut Workbench<'_>,
        validated: Validated,
        rng: &mut R,
    ) -> EconomyResult<CraftReport> {
        let computed = self.compute_rate(bench, validated);
        self.resolve(bench, computed, rng)
    }

    fn compute_rate(&self, bench: &Workbench<'_>, validated: Validated) -> RateComputed {
        let parts: Vec<(ScaledNumber, f64)> = validated.draws.iter().map(|d| (d.amount, d.purity)).collect();
        let lowest_purity = validated
            .draws
            .iter()
            .map(|d| d.purity)
            .fold(MAX_PURITY, f64::min);
        let inputs = RateInputs {
            base_success_rate: validated.recipe.base_success_rate,
            alchemist_level: bench.alchemist_level,
            equipment_bonus: bench.rack.success_bonus(validated.station),
            weighted_purity: blend_purity(&parts),
            min_purity_required: validated.recipe.min_purity_required,
            lowest_purity,
            ingredient_count: validated.recipe.ingredients.len(),
            pending_penalty: bench.rack.pending_penalty(validated.station),
            discovery: validated.discovery,
        };
        let rate = self.success_rate(&inputs);
        tracing::debug!(
            recipe = validated.recipe.id,
            unclamped = rate.unclamped(),
            rate = rate.final_rate,
            "craft rate computed"
        );
        RateComputed { validated, rate }
    }

    fn resolve<R: RandomSource + ?Sized>(
        &self,
        bench: &mut Workbench<'_>,
        computed: RateComputed,
        rng: &mut R,
    ) -> EconomyResult<CraftReport> {
        let RateComputed { validated, rate } = computed;
        let Validated {
            recipe,
            draws,
            station,
            discovery,
            batches,
        } = validated;
        let shelf = bench.rack.shelf(station);
        let was_discovered = bench.book.is_discovered(recipe.id);

        // the pending penalty is spent by this attempt whatever the outcome
        let mut next_penalty = 0.0;
        let mut xp_awarded = 0;
        let (outcome, consumed) = if rng.next_unit() < rate.final_rate {
            let poured: ScaledNumber = draws.iter().map(|d| d.amount).sum();
            let amount = recipe.output_formula.output_for(poured, batches)?;
            let consumed = consume_all(bench.ledger, &draws, 1.0)?;
            let parts: Vec<(ScaledNumber, f64)> = draws.iter().map(|d| (d.amount, d.purity)).collect();
            let mut purity = (blend_purity(&parts) + bench.rack.purity_bonus(station)).clamp(0.0, MAX_PURITY);
            let batch = bench
                .ledger
                .cellar_mut()
                .store(recipe.output, amount, purity, shelf)?;
            if recipe.contamination_risk > 0.0 && rng.next_unit() < recipe.contamination_risk {
                purity = bench.ledger.contaminate(batch)?;
            }
            bench.book.record_attempt(recipe.id, Some(purity));
            xp_awarded = self.config.success_xp;
            let outcome = CraftOutcome::Success {
                batch,
                amount,
                purity,
            };
            (outcome, consumed)
        } else {
            let kind = self.config.failure_distribution.pick(rng.next_unit());
            let fraction = if kind == FailureKind::Minor { 0.5 } else { 1.0 };
            let consumed = consume_all(bench.ledger, &draws, fraction)?;
            let outcome = match kind {
                FailureKind::Minor => {
                    let sludge_amount = total_of(&consumed).scale(0.5)?;
                    CraftOutcome::MinorFailure {
                        sludge: self.store_sludge(bench.ledger, sludge_amount, shelf)?,
                    }
                }
                FailureKind::Major => {
                    next_penalty = self.config.major_failure_penalty;
                    CraftOutcome::MajorFailure
                }
                FailureKind::Catastrophic => {
                    let batches_contaminated = bench
                        .ledger
                        .contaminate_near(shelf, self.config.catastrophe_radius);
                    let equipment_damaged = if bench.rack.damage(station) { station } else { None };
                    CraftOutcome::Catastrophic {
                        batches_contaminated,
                        equipment_damaged,
                    }
                }
                FailureKind::Interesting => {
                    let amounts: Vec<(Emotion, ScaledNumber)> =
                        draws.iter().map(|d| (d.emotion, d.amount)).collect();
                    let (synthesized, newly_synthesized) = bench.book.synthesize(
                        &supplied_ratios(&amounts),
                        self.config.synthesized_base_rate,
                        recipe.batch_size,
                    );
                    xp_awarded = self.config.interesting_xp;
                    CraftOutcome::InterestingFailure {
                        recipe: synthesized,
                        newly_synthesized,
                    }
                }
            };
            bench.book.record_attempt(recipe.id, None);
            (outcome, consumed)
        };
        bench.rack.set_penalty(station, next_penalty);

        let newly_discovered = !was_discovered && bench.book.is_discovered(recipe.id);
        tracing::info!(
            recipe = recipe.id,
            name = %recipe.name,
            rate = rate.final_rate,
            discovery,
            outcome = ?outcome,
            "craft resolved"
        );
        Ok(CraftReport {
            recipe: Some(recipe.id),
            equipment: station,
            rate: Some(rate),
            outcome,
            consumed,
            newly_discovered,
            xp_awarded,
        })
    }

    fn fallback<R: RandomSource + ?Sized>(
        &self,
        bench: &mut Workbench<'_>,
        draws: Vec<InputDraw>,
        station: Option<EquipmentId>,
        rng: &mut R,
    ) -> EconomyResult<CraftReport> {
        let shelf = bench.rack.shelf(station);
        let parts: Vec<(ScaledNumber, f64)> = draws.iter().map(|d| (d.amount, d.purity)).collect();
        let blended = blend_purity(&parts);
        let consumed = consume_all(bench.ledger, &draws, 1.0)?;
        let half = total_of(&consumed).scale(0.5)?;

        let outcome = if rng.next_unit() < self.config.contaminated_mix_chance {
            CraftOutcome::ContaminatedMix {
                sludge: self.store_sludge(bench.ledger, half, shelf)?,
            }
        } else {
            let batch = if half.is_zero() {
                None
            } else {
                Some(
                    bench
                        .ledger
                        .cellar_mut()
                        .store(Emotion::Enigma, half, blended / 2.0, shelf)?,
                )
            };
            CraftOutcome::UnknownRecipe { batch }
        };
        tracing::info!(outcome = ?outcome, "experiment matched no recipe");
        Ok(CraftReport {
            recipe: None,
            equipment: station,
            rate: None,
            outcome,
            consumed,
            newly_discovered: false,
            xp_awarded: 0,
        })
    }

    fn store_sludge(
        &self,
        ledger: &mut ResourceLedger,
        amount: ScaledNumber,
        shelf: u32,
    ) -> EconomyResult<Option<BatchId>> {
        if amount.is_zero() {
            return Ok(None);
        }
        ledger
            .cellar_mut()
            .store(Emotion::Sludge, amount, self.config.sludge_purity, shelf)
            .map(Some)
    }
}

/// Takes `fraction` of every draw from its batch.
fn consume_all(
    ledger: &mut ResourceLedger,
    draws: &[InputDraw],
    fraction: f64,
) -> EconomyResult<Vec<(BatchId, ScaledNumber)>> {
    let mut consumed = Vec::with_capacity(draws.len());
    for draw in draws {
        let amount = draw.amount.scale(fraction)?;
        ledger.consume(draw.batch, amount)?;
        consumed.push((draw.batch, amount));
    }
    Ok(consumed)
}

fn total_of(consumed: &[(BatchId, ScaledNumber)]) -> ScaledNumber {
    consumed.iter().map(|(_, amount)| *amount).sum()
}
