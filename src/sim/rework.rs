//! LIFO rework stack for defective units
//!
//! Defective units wait here until the line drains them back to an earlier
//! station. The most recently flagged unit is handled first, and every pop
//! costs the unit one retry; past the retry cap the unit is permanently
//! rejected.

use rand::Rng;

use super::station::StationId;
use super::unit::Unit;
use crate::consts::MAX_REWORK_ATTEMPTS;
use crate::error::SimError;

/// One defective unit awaiting re-entry
#[derive(Debug, Clone)]
pub struct ReworkEntry {
    pub unit: Unit,
    /// Station whose output was flagged defective
    pub origin: StationId,
    pub reason: String,
}

/// LIFO stack of defective units with retry-limited routing
#[derive(Debug, Clone, Default)]
pub struct ReworkStack {
    entries: Vec<ReworkEntry>,
}

impl ReworkStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Push a defective unit. A unit may appear in at most one entry at a
    /// time; pushing it twice is a caller bug.
    pub fn push(
        &mut self,
        unit: Unit,
        origin: StationId,
        reason: impl Into<String>,
    ) -> Result<(), SimError> {
        if self.entries.iter().any(|e| e.unit.id() == unit.id()) {
            return Err(SimError::InvalidState(format!(
                "unit {} is already on the rework stack",
                unit.id()
            )));
        }
        let reason = reason.into();
        log::debug!(
            "unit {} pushed for rework from {} ({reason})",
            unit.id(),
            origin.as_str()
        );
        self.entries.push(ReworkEntry {
            unit,
            origin,
            reason,
        });
        Ok(())
    }

    /// Inspect the top entry without removing it, along with a candidate
    /// return station: the origin itself when the origin is first in line,
    /// otherwise a uniformly random station strictly before the origin.
    pub fn peek<R: Rng>(&self, rng: &mut R) -> Option<(&Unit, StationId)> {
        let entry = self.entries.last()?;
        Some((&entry.unit, return_station(entry.origin, rng)))
    }

    /// Remove the top entry and charge the unit one retry.
    ///
    /// Returns `Some((unit, Some(station)))` for re-injection, or
    /// `Some((unit, None))` when the retry cap is exceeded and the unit is
    /// now Rejected. An empty stack yields `None`, never an error.
    pub fn pop<R: Rng>(&mut self, rng: &mut R) -> Option<(Unit, Option<StationId>)> {
        let ReworkEntry {
            mut unit,
            origin,
            reason,
        } = self.entries.pop()?;

        let retries = unit.increment_retry();
        if retries > MAX_REWORK_ATTEMPTS {
            log::warn!(
                "unit {} failed rework {retries} times ({reason}), giving up",
                unit.id()
            );
            unit.mark_rejected();
            return Some((unit, None));
        }

        let station = return_station(origin, rng);
        log::info!(
            "unit {} returns to station {} for rework attempt {retries}",
            unit.id(),
            station.as_str()
        );
        Some((unit, Some(station)))
    }
}

/// Choose where a defective unit re-enters the line: the origin itself when
/// it is the first station, otherwise some station strictly before it.
fn return_station<R: Rng>(origin: StationId, rng: &mut R) -> StationId {
    let index = origin.index();
    if index == 0 {
        origin
    } else {
        StationId::ORDER[rng.random_range(0..index)]
    }
}
