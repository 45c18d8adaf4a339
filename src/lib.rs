//! Toyline - a discrete-time toy production line simulator
//!
//! Core modules:
//! - `sim`: Deterministic simulation engine (units, stations, rework, line)
//! - `report`: Read-only reporting surface consumed by dashboards
//! - `error`: Error taxonomy for contract violations
//!
//! The engine is single-threaded and cooperative: a host drives it by
//! calling [`sim::Line::tick`] with wall-clock deltas, either in real time
//! or in a tight loop for batch runs. A tick is atomic - nothing blocks or
//! yields mid-tick, and all randomness flows from one seeded RNG per
//! simulation so seeded runs replay bit-for-bit.

pub mod error;
pub mod report;
pub mod sim;

pub use error::SimError;
pub use report::{LineReport, StationReport, UnitSummary};
pub use sim::{
    Line, LineConfig, ProductionStep, ReworkStack, Station, StationId, StationState, Unit,
    UnitStatus,
};

/// Simulation constants
pub mod consts {
    /// Rework attempts allowed before a unit is permanently rejected
    pub const MAX_REWORK_ATTEMPTS: u32 = 3;
    /// Probability that a unit leaving quality control is flagged defective
    pub const DEFECT_PROBABILITY: f64 = 0.2;
    /// Per-attempt probability that a waiting station breaks down
    pub const BREAKDOWN_PROBABILITY: f64 = 0.05;
    /// Repair time bounds (simulated seconds)
    pub const BREAKDOWN_DURATION_MIN: f64 = 5.0;
    pub const BREAKDOWN_DURATION_MAX: f64 = 10.0;
    /// Processing duration jitter around the station average
    pub const PROCESS_TIME_MIN_FACTOR: f64 = 0.5;
    pub const PROCESS_TIME_MAX_FACTOR: f64 = 1.5;
    /// Cosmetic color palette used in unit ids
    pub const UNIT_COLORS: [&str; 6] = ["Red", "Blue", "Green", "Yellow", "Mauve", "Orange"];

    /// Default units created per simulated second
    pub const DEFAULT_CREATION_RATE: f64 = 0.5;
    /// Default simulated seconds per wall-clock second
    pub const DEFAULT_TIME_SCALE: u32 = 10;
}

/// Round to 2 decimals (sampled durations are kept coarse)
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
