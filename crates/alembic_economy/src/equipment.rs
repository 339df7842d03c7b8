//! # Equipment
//!
//! Alembics, retorts and the like. Installed equipment adds a success bonus
//! (always held within 5-15 %) and a purity bonus to crafts, sits on a cellar
//! shelf, and can be damaged by a catastrophic failure. Crafting without
//! equipment uses the bare bench, which has no bonus but can still carry a
//! pending penalty from a major failure.

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};

/// Unique identifier for a piece of equipment.
pub type EquipmentId = u32;

/// Lowest success bonus installed equipment grants.
pub const MIN_SUCCESS_BONUS: f64 = 0.05;

/// Highest success bonus installed equipment grants.
pub const MAX_SUCCESS_BONUS: f64 = 0.15;

/// A piece of crafting equipment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    /// Unique id.
    pub id: EquipmentId,
    /// Display name.
    pub name: String,
    /// Nominal success bonus (clamped to 5-15 % when used).
    pub success_bonus: f64,
    /// Purity points added to outputs.
    #[serde(default)]
    pub purity_bonus: f64,
    /// Shelf the equipment stands on.
    #[serde(default)]
    pub shelf: u32,
    /// Unusable until repaired.
    #[serde(default)]
    pub damaged: bool,
    /// Penalty applied to the next attempt on this equipment.
    #[serde(default)]
    pub pending_penalty: f64,
}

impl Equipment {
    /// Creates undamaged equipment.
    #[must_use]
    pub fn new(id: EquipmentId, name: impl Into<String>, success_bonus: f64, purity_bonus: f64, shelf: u32) -> Self {
        Self {
            id,
            name: name.into(),
            success_bonus,
            purity_bonus,
            shelf,
            damaged: false,
            pending_penalty: 0.0,
        }
    }

    /// Success bonus actually applied.
    #[must_use]
    pub fn effective_success_bonus(&self) -> f64 {
        self.success_bonus.clamp(MIN_SUCCESS_BONUS, MAX_SUCCESS_BONUS)
    }

    /// Checks the record is usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for non-finite or negative bonuses.
    pub fn validate(&self) -> EconomyResult<()> {
        for (what, value) in [
            ("success bonus", self.success_bonus),
            ("purity bonus", self.purity_bonus),
            ("pending penalty", self.pending_penalty),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EconomyError::InvalidConfig(format!(
                    "equipment {} ({}): {what} {value}",
                    self.id, self.name
                )));
            }
        }
        Ok(())
    }
}

/// Installed equipment plus the bare bench.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRack {
    /// Installed equipment.
    #[serde(default)]
    pub installed: Vec<Equipment>,
    /// Pending penalty on the bare bench.
    #[serde(default)]
    pub bench_penalty: f64,
    /// Shelf the bare bench stands on.
    #[serde(default)]
    pub bench_shelf: u32,
}

impl EquipmentRack {
    /// Creates a rack from installed equipment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for duplicate ids or invalid records.
    pub fn new(installed: Vec<Equipment>) -> EconomyResult<Self> {
        let rack = Self {
            installed,
            bench_penalty: 0.0,
            bench_shelf: 0,
        };
        rack.validate()?;
        Ok(rack)
    }

    /// Checks every record and id uniqueness.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem.
    pub fn validate(&self) -> EconomyResult<()> {
        for (i, equipment) in self.installed.iter().enumerate() {
            equipment.validate()?;
            if self.installed[..i].iter().any(|e| e.id == equipment.id) {
                return Err(EconomyError::InvalidConfig(format!(
                    "duplicate equipment id {}",
                    equipment.id
                )));
            }
        }
        if !self.bench_penalty.is_finite() || self.bench_penalty < 0.0 {
            return Err(EconomyError::InvalidConfig(format!("bench penalty {}", self.bench_penalty)));
        }
        Ok(())
    }

    /// Looks up installed equipment.
    ///
    /// # Errors
    ///
    /// Returns `EquipmentNotFound` for an unknown id.
    pub fn get(&self, id: EquipmentId) -> EconomyResult<&Equipment> {
        self.installed
            .iter()
            .find(|e| e.id == id)
            .ok_or(EconomyError::EquipmentNotFound(id))
    }

    fn get_mut(&mut self, id: EquipmentId) -> EconomyResult<&mut Equipment> {
        self.installed
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(EconomyError::EquipmentNotFound(id))
    }

    /// Fails unless the station exists and is usable.
    ///
    /// # Errors
    ///
    /// Returns `EquipmentNotFound` or `EquipmentDamaged`.
    pub fn check_usable(&self, station: Option<EquipmentId>) -> EconomyResult<()> {
        if let Some(id) = station {
            if self.get(id)?.damaged {
                return Err(EconomyError::EquipmentDamaged(id));
            }
        }
        Ok(())
    }

    /// Success bonus of a station (0 for the bare bench).
    #[must_use]
    pub fn success_bonus(&self, station: Option<EquipmentId>) -> f64 {
        station
            .and_then(|id| self.get(id).ok())
            .map_or(0.0, Equipment::effective_success_bonus)
    }

    /// Purity bonus of a station (0 for the bare bench).
    #[must_use]
    pub fn purity_bonus(&self, station: Option<EquipmentId>) -> f64 {
        station
            .and_then(|id| self.get(id).ok())
            .map_or(0.0, |e| e.purity_bonus)
    }

    /// Shelf of a station.
    #[must_use]
    pub fn shelf(&self, station: Option<EquipmentId>) -> u32 {
        station
            .and_then(|id| self.get(id).ok())
            .map_or(self.bench_shelf, |e| e.shelf)
    }

    /// Penalty waiting on a station's next attempt.
    #[must_use]
    pub fn pending_penalty(&self, station: Option<EquipmentId>) -> f64 {
        match station {
            None => self.bench_penalty,
            Some(id) => self.get(id).map_or(0.0, |e| e.pending_penalty),
        }
    }

    /// Sets (or clears, with `0.0`) a station's pending penalty.
    pub(crate) fn set_penalty(&mut self, station: Option<EquipmentId>, penalty: f64) {
        match station {
            None => self.bench_penalty = penalty,
            Some(id) => {
                if let Ok(equipment) = self.get_mut(id) {
                    equipment.pending_penalty = penalty;
                }
            }
        }
    }

    /// Marks equipment damaged. The bare bench cannot be damaged.
    pub(crate) fn damage(&mut self, station: Option<EquipmentId>) -> bool {
        match station.map(|id| self.get_mut(id)) {
            Some(Ok(equipment)) => {
                equipment.damaged = true;
                true
            }
            _ => false,
        }
    }

    /// Repairs damaged equipment; returns whether it was damaged.
    ///
    /// # Errors
    ///
    /// Returns `EquipmentNotFound` for an unknown id.
    pub fn repair(&mut self, id: EquipmentId) -> EconomyResult<bool> {
        let equipment = self.get_mut(id)?;
        let was_damaged = equipment.damaged;
        equipment.damaged = false;
        Ok(was_damaged)
    }
}
