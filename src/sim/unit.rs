//! Unit lifecycle and production history
//!
//! A unit is one toy flowing through the line. It carries its status, a
//! retry counter for rework, and an append-only history of completed
//! processing steps.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::station::StationId;
use crate::consts::UNIT_COLORS;
use crate::error::SimError;

/// Lifecycle status of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStatus {
    /// Freshly created, not yet picked up by a station
    Created,
    /// Currently held or queued inside the line
    InProgress,
    /// Flagged by quality control, awaiting rework routing
    Defective,
    /// Left the last station successfully (terminal)
    Finished,
    /// Exceeded the rework retry cap (terminal)
    Rejected,
}

/// One completed processing step in a unit's history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductionStep {
    /// Station that performed the step
    pub station: StationId,
    /// Simulated-clock time at which the step completed
    pub at: f64,
    /// Sampled processing duration (simulated seconds)
    pub duration: f64,
}

/// A single toy moving through the production line
#[derive(Debug, Clone)]
pub struct Unit {
    id: String,
    serial: u64,
    status: UnitStatus,
    retry_count: u32,
    total_process_time: f64,
    history: Vec<ProductionStep>,
}

impl Unit {
    /// Create a unit with the given serial number.
    ///
    /// The serial counter is owned by whoever constructs units (the
    /// [`Line`](super::line::Line)), never global state, so independent
    /// simulations stay independent. The color is purely cosmetic and drawn
    /// from the simulation RNG.
    pub fn new(serial: u64, rng: &mut impl Rng) -> Self {
        let color = UNIT_COLORS[rng.random_range(0..UNIT_COLORS.len())];
        let id = format!("TOY-{serial:03}-{}", color.to_uppercase());
        log::debug!("created unit {id}");
        Self {
            id,
            serial,
            status: UnitStatus::Created,
            retry_count: 0,
            total_process_time: 0.0,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn status(&self) -> UnitStatus {
        self.status
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Sum of every completed processing-step duration. Never decreases.
    pub fn total_process_time(&self) -> f64 {
        self.total_process_time
    }

    /// Step history, as a defensive copy: callers can never mutate a unit's
    /// history through an obtained handle.
    pub fn history(&self) -> Vec<ProductionStep> {
        self.history.clone()
    }

    /// Check the `TOY-{serial}-{COLOR}` id shape.
    pub fn id_is_valid(&self) -> bool {
        let mut parts = self.id.splitn(3, '-');
        parts.next() == Some("TOY")
            && parts
                .next()
                .is_some_and(|s| s.len() >= 3 && s.bytes().all(|b| b.is_ascii_digit()))
            && parts
                .next()
                .is_some_and(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_uppercase()))
    }

    pub fn mark_in_progress(&mut self) {
        self.status = UnitStatus::InProgress;
        log::debug!("unit {} in progress", self.id);
    }

    pub fn mark_defective(&mut self) {
        self.status = UnitStatus::Defective;
        log::warn!("unit {} flagged defective", self.id);
    }

    pub fn mark_finished(&mut self) {
        self.status = UnitStatus::Finished;
        log::info!(
            "unit {} finished (total process time {:.2}s)",
            self.id,
            self.total_process_time
        );
    }

    pub fn mark_rejected(&mut self) {
        self.status = UnitStatus::Rejected;
        log::warn!("unit {} permanently rejected", self.id);
    }

    /// Append a completed step and accumulate its duration.
    pub fn record_step(
        &mut self,
        station: StationId,
        at: f64,
        duration: f64,
    ) -> Result<(), SimError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimError::InvalidArgument(format!(
                "step duration must be non-negative, got {duration}"
            )));
        }
        self.history.push(ProductionStep {
            station,
            at,
            duration,
        });
        self.total_process_time += duration;
        log::debug!(
            "unit {} completed step '{}' in {duration:.2}s",
            self.id,
            station.as_str()
        );
        Ok(())
    }

    /// Bump the rework retry counter and return the new count.
    pub fn increment_retry(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn test_rng() -> Pcg32 {
        Pcg32::seed_from_u64(42)
    }

    #[test]
    fn test_new_unit_defaults() {
        let mut rng = test_rng();
        let unit = Unit::new(1, &mut rng);

        assert!(unit.id_is_valid(), "bad id shape: {}", unit.id());
        assert!(unit.id().starts_with("TOY-001-"));
        assert_eq!(unit.serial(), 1);
        assert_eq!(unit.status(), UnitStatus::Created);
        assert_eq!(unit.retry_count(), 0);
        assert_eq!(unit.total_process_time(), 0.0);
        assert!(unit.history().is_empty());
    }

    #[test]
    fn test_record_step_accumulates_time() {
        let mut rng = test_rng();
        let mut unit = Unit::new(7, &mut rng);

        unit.record_step(StationId::Assembly, 2.5, 2.5).unwrap();
        unit.record_step(StationId::Painting, 6.0, 3.5).unwrap();

        assert_eq!(unit.total_process_time(), 6.0);
        let history = unit.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].station, StationId::Assembly);
        assert_eq!(history[0].duration, 2.5);
        assert_eq!(history[1].station, StationId::Painting);
        assert_eq!(history[1].at, 6.0);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let mut rng = test_rng();
        let mut unit = Unit::new(1, &mut rng);

        let err = unit.record_step(StationId::Assembly, 0.0, -1.0).unwrap_err();
        assert!(matches!(err, crate::SimError::InvalidArgument(_)));
        assert!(unit.history().is_empty());
        assert_eq!(unit.total_process_time(), 0.0);
    }

    #[test]
    fn test_history_is_a_defensive_copy() {
        let mut rng = test_rng();
        let mut unit = Unit::new(1, &mut rng);
        unit.record_step(StationId::Assembly, 1.0, 1.0).unwrap();

        let mut copy = unit.history();
        copy.clear();
        copy.push(ProductionStep {
            station: StationId::Packaging,
            at: 99.0,
            duration: 99.0,
        });

        let fresh = unit.history();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].station, StationId::Assembly);
    }

    #[test]
    fn test_status_transitions_and_retry() {
        let mut rng = test_rng();
        let mut unit = Unit::new(3, &mut rng);

        unit.mark_in_progress();
        assert_eq!(unit.status(), UnitStatus::InProgress);

        assert_eq!(unit.increment_retry(), 1);
        unit.mark_defective();
        assert_eq!(unit.status(), UnitStatus::Defective);
        assert_eq!(unit.retry_count(), 1);

        unit.mark_rejected();
        assert_eq!(unit.status(), UnitStatus::Rejected);
    }
}
