//! Read-only reporting surface
//!
//! Snapshots the counters a dashboard or report renderer needs: totals,
//! per-station utilization, the bottleneck, and per-unit summaries.
//! Everything here is plain serializable data - rendering, charting and
//! persistence are the host's job.

use serde::{Deserialize, Serialize};

use crate::sim::{Line, ProductionStep, StationId, Unit, UnitStatus};

/// Utilization of one station over the whole run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationReport {
    pub station: StationId,
    /// Fraction of elapsed simulated time spent Processing or Broken
    pub utilization: f64,
}

/// Terminal snapshot of a single unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub id: String,
    pub status: UnitStatus,
    pub total_process_time: f64,
    pub retry_count: u32,
    pub history: Vec<ProductionStep>,
}

impl UnitSummary {
    fn from_unit(unit: &Unit) -> Self {
        Self {
            id: unit.id().to_owned(),
            status: unit.status(),
            total_process_time: unit.total_process_time(),
            retry_count: unit.retry_count(),
            history: unit.history(),
        }
    }
}

/// Full production report for one simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineReport {
    /// Simulated seconds covered by the run
    pub simulated_time: f64,
    /// Units ever created
    pub total_created: u64,
    pub total_finished: usize,
    pub total_rejected: usize,
    /// Mean total processing time of finished units
    pub average_process_time: Option<f64>,
    /// Share of terminal units that needed at least one rework pass
    pub rework_share: f64,
    pub stations: Vec<StationReport>,
    /// Station with the highest utilization
    pub bottleneck: Option<StationId>,
    pub finished: Vec<UnitSummary>,
    pub rejected: Vec<UnitSummary>,
}

impl LineReport {
    pub fn from_line(line: &Line) -> Self {
        let finished: Vec<UnitSummary> = line.finished().iter().map(UnitSummary::from_unit).collect();
        let rejected: Vec<UnitSummary> = line.rejected().iter().map(UnitSummary::from_unit).collect();

        let average_process_time = if finished.is_empty() {
            None
        } else {
            let total: f64 = finished.iter().map(|u| u.total_process_time).sum();
            Some(total / finished.len() as f64)
        };

        let terminal = finished.len() + rejected.len();
        let rework_share = if terminal == 0 {
            0.0
        } else {
            let reworked = finished
                .iter()
                .chain(&rejected)
                .filter(|u| u.retry_count >= 1)
                .count();
            reworked as f64 / terminal as f64
        };

        Self {
            simulated_time: line.simulated_time(),
            total_created: line.produced_count(),
            total_finished: finished.len(),
            total_rejected: rejected.len(),
            average_process_time,
            rework_share,
            stations: line
                .utilization()
                .into_iter()
                .map(|(station, utilization)| StationReport {
                    station,
                    utilization,
                })
                .collect(),
            bottleneck: line.bottleneck(),
            finished,
            rejected,
        }
    }
}
