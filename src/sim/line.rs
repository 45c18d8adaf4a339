//! Line orchestration: the per-tick update pipeline
//!
//! The line owns every station, the rework stack, the terminal collections
//! and the single simulation RNG. Each tick runs four phases in order:
//! unit creation, station advancement, downstream transfer, rework drain.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::rework::ReworkStack;
use super::station::{Station, StationId, StationState};
use super::unit::Unit;
use crate::consts::{DEFAULT_CREATION_RATE, DEFAULT_TIME_SCALE, DEFECT_PROBABILITY};
use crate::error::SimError;
use crate::report::LineReport;

/// Line configuration supplied by the host
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Units created per simulated second. Non-positive values suspend
    /// creation (with a logged warning) instead of failing.
    pub creation_rate: f64,
    /// Simulated seconds per wall-clock second
    pub time_scale: u32,
    /// RNG seed; `None` draws one from OS entropy
    pub seed: Option<u64>,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            creation_rate: DEFAULT_CREATION_RATE,
            time_scale: DEFAULT_TIME_SCALE,
            seed: None,
        }
    }
}

/// The production line: stations in canonical order plus the rework lane
#[derive(Debug)]
pub struct Line {
    config: LineConfig,
    /// Indexed by `StationId::index()`, i.e. canonical order
    stations: Vec<Station>,
    rework: ReworkStack,
    finished: Vec<Unit>,
    rejected: Vec<Unit>,
    simulated_time: f64,
    /// Creation accumulator: simulated time since the last unit was created
    since_last_unit: f64,
    produced_count: u64,
    next_serial: u64,
    seed: u64,
    rng: Pcg32,
    warned_creation_rate: bool,
}

impl Line {
    pub fn new(config: LineConfig) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        if config.time_scale == 0 {
            log::warn!("time_scale is 0: simulated time will not advance");
        }
        log::info!(
            "line initialized (seed {seed}, rate {}, scale {})",
            config.creation_rate,
            config.time_scale
        );
        Self {
            config,
            stations: StationId::ORDER.iter().map(|id| Station::new(*id)).collect(),
            rework: ReworkStack::new(),
            finished: Vec::new(),
            rejected: Vec::new(),
            simulated_time: 0.0,
            since_last_unit: 0.0,
            produced_count: 0,
            next_serial: 1,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            warned_creation_rate: false,
        }
    }

    /// Advance the whole line by `delta_wall` wall-clock seconds.
    pub fn tick(&mut self, delta_wall: f64) -> Result<(), SimError> {
        if !delta_wall.is_finite() || delta_wall < 0.0 {
            return Err(SimError::InvalidArgument(format!(
                "tick delta must be non-negative, got {delta_wall}"
            )));
        }
        let dt = delta_wall * f64::from(self.config.time_scale);
        self.simulated_time += dt;

        self.create_units(dt);

        // Advance every station in order, collecting 0-or-1 completions each.
        let now = self.simulated_time;
        let mut completed: Vec<(usize, Unit)> = Vec::new();
        for (index, station) in self.stations.iter_mut().enumerate() {
            if let Some(unit) = station.advance(dt, now, &mut self.rng)? {
                completed.push((index, unit));
            }
        }

        self.transfer(completed)?;
        self.drain_rework();
        Ok(())
    }

    /// Create new units while the creation accumulator covers the interval.
    fn create_units(&mut self, dt: f64) {
        self.since_last_unit += dt;
        if self.config.creation_rate <= 0.0 {
            if !self.warned_creation_rate {
                log::warn!(
                    "creation_rate {} is non-positive, unit creation suspended",
                    self.config.creation_rate
                );
                self.warned_creation_rate = true;
            }
            return;
        }
        let interval = 1.0 / self.config.creation_rate;
        while self.since_last_unit >= interval {
            let unit = Unit::new(self.next_serial, &mut self.rng);
            self.next_serial += 1;
            self.produced_count += 1;
            self.stations[0].enqueue(unit);
            self.since_last_unit -= interval;
        }
    }

    /// Move completed units downstream, flag defects at quality control,
    /// and bank units leaving the last station.
    fn transfer(&mut self, completed: Vec<(usize, Unit)>) -> Result<(), SimError> {
        let last = StationId::ORDER.len() - 1;
        for (index, mut unit) in completed {
            if index == last {
                unit.mark_finished();
                self.finished.push(unit);
            } else if index == last - 1 && self.rng.random::<f64>() < DEFECT_PROBABILITY {
                unit.mark_defective();
                self.rework
                    .push(unit, StationId::ORDER[index], "failed quality inspection")?;
            } else {
                self.stations[index + 1].enqueue(unit);
            }
        }
        Ok(())
    }

    /// Drain at most one rework candidate per tick (a single physical
    /// rework lane). A candidate whose return station is Broken stays on
    /// the stack - backpressure, not loss.
    fn drain_rework(&mut self) {
        let Some((_, candidate)) = self.rework.peek(&mut self.rng) else {
            return;
        };
        if self.stations[candidate.index()].state() == StationState::Broken {
            log::debug!(
                "rework blocked: station {} is broken",
                candidate.as_str()
            );
            return;
        }
        match self.rework.pop(&mut self.rng) {
            Some((unit, Some(station))) => self.stations[station.index()].enqueue(unit),
            Some((unit, None)) => self.rejected.push(unit),
            None => {}
        }
    }

    // === Read-only reporting surface ===

    /// Total simulated seconds elapsed
    pub fn simulated_time(&self) -> f64 {
        self.simulated_time
    }

    /// Total units ever created by this line
    pub fn produced_count(&self) -> u64 {
        self.produced_count
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn finished(&self) -> &[Unit] {
        &self.finished
    }

    pub fn rejected(&self) -> &[Unit] {
        &self.rejected
    }

    pub fn station(&self, id: StationId) -> &Station {
        &self.stations[id.index()]
    }

    pub fn rework(&self) -> &ReworkStack {
        &self.rework
    }

    /// Units currently circulating: station queues, in-process slots and
    /// the rework stack. Together with `finished` and `rejected` this
    /// accounts for every unit ever created (conservation law).
    pub fn in_flight(&self) -> usize {
        let in_stations: usize = self
            .stations
            .iter()
            .map(|s| s.queue_len() + usize::from(s.current_unit().is_some()))
            .sum();
        in_stations + self.rework.len()
    }

    /// Per-station utilization over the elapsed simulated time
    pub fn utilization(&self) -> Vec<(StationId, f64)> {
        self.stations
            .iter()
            .map(|s| (s.id(), s.utilization(self.simulated_time)))
            .collect()
    }

    /// Station with the highest utilization, if any time has elapsed
    pub fn bottleneck(&self) -> Option<StationId> {
        if self.simulated_time <= 0.0 {
            return None;
        }
        self.stations
            .iter()
            .max_by(|a, b| {
                a.utilization(self.simulated_time)
                    .partial_cmp(&b.utilization(self.simulated_time))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|s| s.id())
    }

    /// Snapshot of the final counters for the report/dashboard layer
    pub fn report(&self) -> LineReport {
        LineReport::from_line(self)
    }

    #[cfg(test)]
    pub(crate) fn station_mut(&mut self, id: StationId) -> &mut Station {
        &mut self.stations[id.index()]
    }

    #[cfg(test)]
    pub(crate) fn rework_mut(&mut self) -> &mut ReworkStack {
        &mut self.rework
    }
}
