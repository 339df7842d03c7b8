//! # Economy Error Types
//!
//! All errors that can occur in the economy core.
//!
//! Every error here is local and recoverable. Validation errors are returned
//! before any state is touched, so a caller that receives one can retry or
//! report without rolling anything back. Storage overflow is deliberately
//! absent: it is a reported side effect (see [`crate::ledger::OverflowEvent`]),
//! not a failure.

use thiserror::Error;

use crate::purity::Emotion;
use crate::recipe::RecipeId;

/// Errors that can occur in the economy core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EconomyError {
    /// Malformed numeric input (NaN, infinite, negative, unparsable).
    #[error("invalid magnitude: {input}")]
    InvalidMagnitude {
        /// The rejected input, rendered as text.
        input: String,
    },

    /// A subtraction would have gone below zero.
    #[error("underflow: cannot subtract {subtrahend} from {minuend}")]
    Underflow {
        /// Left operand (lossless text form).
        minuend: String,
        /// Right operand (lossless text form).
        subtrahend: String,
    },

    /// Division by a zero quantity.
    #[error("division by zero")]
    DivisionByZero,

    /// A craft was attempted without enough stock.
    #[error("insufficient {emotion}: need {required}, have {available}")]
    InsufficientIngredients {
        /// The emotion that was short.
        emotion: Emotion,
        /// Amount required (lossless text form).
        required: String,
        /// Amount available (lossless text form).
        available: String,
    },

    /// A craft was attempted on an undiscovered recipe outside experimentation.
    #[error("recipe {0} has not been discovered")]
    UnknownRecipe(RecipeId),

    /// Recipe id is not in the recipe book.
    #[error("recipe not found: {0}")]
    RecipeNotFound(RecipeId),

    /// Equipment id is not installed in the workshop.
    #[error("equipment not found: {0}")]
    EquipmentNotFound(u32),

    /// Equipment is damaged and must be repaired before use.
    #[error("equipment {0} is damaged")]
    EquipmentDamaged(u32),

    /// Batch id is not stored in the cellar.
    #[error("batch not found: {0}")]
    BatchNotFound(u64),

    /// Invalid configuration or content table.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A persisted state record failed validation.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl EconomyError {
    /// Builds an [`EconomyError::InvalidMagnitude`] from anything displayable.
    pub(crate) fn magnitude(input: impl std::fmt::Display) -> Self {
        Self::InvalidMagnitude {
            input: input.to_string(),
        }
    }
}

/// Result type for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;
