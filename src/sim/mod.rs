//! Deterministic simulation module
//!
//! All production logic lives here. This module must be pure and deterministic:
//! - Time advances only through explicit tick deltas
//! - Seeded RNG only (a single source per simulation)
//! - Stable station iteration order (the canonical line order)
//! - No I/O, no wall-clock reads, no platform dependencies

pub mod line;
pub mod rework;
pub mod station;
pub mod unit;

pub use line::{Line, LineConfig};
pub use rework::ReworkStack;
pub use station::{Station, StationId, StationState};
pub use unit::{ProductionStep, Unit, UnitStatus};
