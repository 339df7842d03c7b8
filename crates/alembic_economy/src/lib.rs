//! # ALEMBIC Economy
//!
//! Pure Rust resource and alchemy logic for the ALEMBIC idle game.
//!
//! ## Design Principles
//!
//! 1. **Numbers past f64** - Every quantity is a [`ScaledNumber`] (mantissa + exponent)
//! 2. **Deterministic** - Randomness is injected through [`RandomSource`], never global
//! 3. **All-or-nothing crafting** - Validation mutates nothing; resolution commits everything
//! 4. **External configuration** - All balance data in TOML, loaded once, shared by `Arc`
//! 5. **Events, not callbacks** - State changes queue [`AlchemyEvent`]s for the presentation layer
//!
//! ## Thread Safety
//!
//! Nothing here locks. A host that ticks on one thread and takes commands on
//! another wraps each [`Workshop`] in a single mutex.
//!
//! ## Example
//!
//! ```rust,ignore
//! use alembic_economy::{CraftRequest, EconomyConfig, ScaledNumber, SeededRandom, Tier, Workshop};
//!
//! let config = EconomyConfig::from_toml_file("data/alembic.toml")?.shared();
//! let mut workshop = Workshop::new(config)?;
//! let mut rng = SeededRandom::new(7);
//!
//! workshop.tick(1.0)?;
//! workshop.click()?;
//! let smiles = workshop.distill(Tier::Smiles, ScaledNumber::from_count(10))?;
//! let report = workshop.craft(
//!     &CraftRequest { recipe: 1, inputs: vec![smiles], equipment: None },
//!     &mut rng,
//! )?;
//! for event in workshop.drain_events() {
//!     println!("{event:?}");
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod content;
pub mod equipment;
pub mod error;
pub mod events;
pub mod ledger;
pub mod purity;
pub mod random;
pub mod recipe;
pub mod resolver;
pub mod scaled;
pub mod tier;
pub mod unlocks;
pub mod workshop;

pub use config::EconomyConfig;
pub use equipment::{Equipment, EquipmentId, EquipmentRack};
pub use error::{EconomyError, EconomyResult};
pub use events::{AlchemyEvent, EventQueue};
pub use ledger::{AdvanceReport, Cellar, LedgerState, OverflowEvent, ResourceLedger};
pub use purity::{blend_purity, Batch, BatchId, Contamination, Emotion, PurityConfig, PurityTracker};
pub use random::{RandomSource, RandomState, ScriptedRandom, SeededRandom};
pub use recipe::{OutputFormula, RecipeBook, RecipeDefinition, RecipeId, RecipeProgress};
pub use resolver::{
    CraftOutcome, CraftReport, CraftRequest, CraftingConfig, ExperimentRequest, FailureDistribution,
    FailureKind, RateBreakdown, RateInputs, RecipeResolver, Workbench,
};
pub use scaled::{FormatPolicy, ScaledNumber};
pub use tier::{ResourceTier, Tier, TierDefinition, TierUpgrade};
pub use unlocks::{Unlock, UnlockCondition, UnlockId, UnlockRule, UnlockTracker};
pub use workshop::{OfflineReport, SessionConfig, Workshop, WorkshopState};
