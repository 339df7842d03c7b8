//! # Alchemy Events
//!
//! **State transitions report, presentation reacts.**
//!
//! The workshop never calls out to rendering or animation code. Anything a
//! presentation layer might want to celebrate (an unlock, an overflow, a
//! failed craft) is appended to an [`EventQueue`], and the caller drains the
//! queue whenever it is ready to react.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::equipment::EquipmentId;
use crate::ledger::OverflowEvent;
use crate::recipe::RecipeId;
use crate::resolver::CraftOutcome;
use crate::unlocks::{Unlock, UnlockId};

// ============================================================================
// Event Types
// ============================================================================

/// Something the presentation layer may want to react to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AlchemyEvent {
    /// An unlock rule fired.
    Unlocked {
        /// Rule id.
        id: UnlockId,
        /// What was unlocked.
        unlock: Unlock,
    },
    /// A tier overflowed its storage.
    Overflow(OverflowEvent),
    /// A craft or experiment resolved.
    CraftResolved {
        /// Recipe attempted, if any matched.
        recipe: Option<RecipeId>,
        /// Outcome.
        outcome: CraftOutcome,
    },
    /// A recipe became known.
    RecipeDiscovered {
        /// Recipe id.
        recipe: RecipeId,
    },
    /// A new recipe was synthesized from an interesting failure.
    RecipeSynthesized {
        /// Recipe id.
        recipe: RecipeId,
    },
    /// XP was granted.
    BonusXp {
        /// XP granted.
        amount: u64,
        /// XP after the grant.
        total: u64,
    },
    /// The alchemist reached a new level.
    LevelUp {
        /// New level.
        level: u32,
    },
    /// Equipment was damaged by a catastrophe.
    EquipmentDamaged {
        /// Equipment id.
        equipment: EquipmentId,
    },
    /// Damaged equipment was repaired.
    EquipmentRepaired {
        /// Equipment id.
        equipment: EquipmentId,
    },
    /// Batches around a catastrophe were contaminated.
    BatchesContaminated {
        /// Number of batches hit.
        count: usize,
    },
}

// ============================================================================
// Queue
// ============================================================================

/// FIFO of events waiting for the presentation layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventQueue {
    events: VecDeque<AlchemyEvent>,
}

impl EventQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn push(&mut self, event: AlchemyEvent) {
        self.events.push_back(event);
    }

    /// Removes and returns every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<AlchemyEvent> {
        self.events.drain(..).collect()
    }

    /// Queued events, oldest first, without removing them.
    pub fn iter(&self) -> impl Iterator<Item = &AlchemyEvent> {
        self.events.iter()
    }

    /// Number of queued events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Extend<AlchemyEvent> for EventQueue {
    fn extend<I: IntoIterator<Item = AlchemyEvent>>(&mut self, iter: I) {
        self.events.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_is_fifo_and_empties() {
        let mut queue = EventQueue::new();
        queue.push(AlchemyEvent::LevelUp { level: 1 });
        queue.push(AlchemyEvent::BonusXp { amount: 50, total: 150 });
        queue.extend([AlchemyEvent::BatchesContaminated { count: 2 }]);
        assert_eq!(queue.len(), 3);

        let drained = queue.drain();
        assert_eq!(drained[0], AlchemyEvent::LevelUp { level: 1 });
        assert_eq!(drained[2], AlchemyEvent::BatchesContaminated { count: 2 });
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }
}
