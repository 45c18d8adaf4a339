//! Station state machine with processing and breakdown timers
//!
//! A station is a timed processing slot fed by an unbounded FIFO queue. It
//! owns a four-state machine (Idle, Waiting, Processing, Broken) driven
//! once per tick through [`Station::advance`].

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::unit::Unit;
use crate::consts::{
    BREAKDOWN_DURATION_MAX, BREAKDOWN_DURATION_MIN, BREAKDOWN_PROBABILITY,
    PROCESS_TIME_MAX_FACTOR, PROCESS_TIME_MIN_FACTOR,
};
use crate::error::SimError;
use crate::round2;

/// The canonical stations of the line, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StationId {
    Assembly,
    Painting,
    QualityControl,
    Packaging,
}

impl StationId {
    /// Fixed processing order of the line.
    pub const ORDER: [StationId; 4] = [
        StationId::Assembly,
        StationId::Painting,
        StationId::QualityControl,
        StationId::Packaging,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StationId::Assembly => "assembly",
            StationId::Painting => "painting",
            StationId::QualityControl => "quality-control",
            StationId::Packaging => "packaging",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "assembly" => Some(StationId::Assembly),
            "painting" => Some(StationId::Painting),
            "quality-control" | "qc" => Some(StationId::QualityControl),
            "packaging" => Some(StationId::Packaging),
            _ => None,
        }
    }

    /// Position in the canonical order.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Average processing time seed for duration sampling.
    pub fn average_process_time(&self) -> f64 {
        match self {
            StationId::Assembly => 2.0,
            StationId::Painting => 3.0,
            StationId::QualityControl => 1.0,
            StationId::Packaging => 1.0,
        }
    }
}

/// Station machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationState {
    /// Queue empty, nothing to do
    Idle,
    /// Queue non-empty, not yet processing
    Waiting,
    /// One unit held, counting down its sampled duration
    Processing,
    /// Out of order, counting down the repair timer
    Broken,
}

/// A timed processing stage with its own queue and failure model
#[derive(Debug, Clone)]
pub struct Station {
    id: StationId,
    average_process_time: f64,
    state: StationState,
    queue: VecDeque<Unit>,
    /// Held unit; `Some` iff state == Processing
    current: Option<Unit>,
    /// Duration sampled when processing started (recorded on completion)
    sampled_duration: f64,
    processing_remaining: f64,
    breakdown_remaining: f64,
    breakdown_probability: f64,
    breakdown_duration: (f64, f64),
    /// Simulated time spent Processing or Broken (utilization numerator)
    busy_time: f64,
}

impl Station {
    pub fn new(id: StationId) -> Self {
        log::debug!("station {} created", id.as_str());
        Self {
            id,
            average_process_time: id.average_process_time(),
            state: StationState::Idle,
            queue: VecDeque::new(),
            current: None,
            sampled_duration: 0.0,
            processing_remaining: 0.0,
            breakdown_remaining: 0.0,
            breakdown_probability: BREAKDOWN_PROBABILITY,
            breakdown_duration: (BREAKDOWN_DURATION_MIN, BREAKDOWN_DURATION_MAX),
            busy_time: 0.0,
        }
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn state(&self) -> StationState {
        self.state
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn current_unit(&self) -> Option<&Unit> {
        self.current.as_ref()
    }

    pub fn processing_remaining(&self) -> f64 {
        self.processing_remaining
    }

    pub fn breakdown_remaining(&self) -> f64 {
        self.breakdown_remaining
    }

    /// Override the breakdown probability (0.0 disables breakdowns).
    pub fn set_breakdown_probability(&mut self, probability: f64) {
        self.breakdown_probability = probability.clamp(0.0, 1.0);
    }

    /// Fraction of `elapsed` simulated time this station spent Processing
    /// or Broken. The bottleneck station is the one with the maximum.
    pub fn utilization(&self, elapsed: f64) -> f64 {
        if elapsed <= 0.0 {
            0.0
        } else {
            self.busy_time / elapsed
        }
    }

    /// Append a unit to the queue. Valid in every state; an Idle station
    /// becomes Waiting.
    pub fn enqueue(&mut self, unit: Unit) {
        log::debug!("unit {} queued at station {}", unit.id(), self.id.as_str());
        self.queue.push_back(unit);
        if self.state == StationState::Idle {
            self.set_state(StationState::Waiting);
        }
    }

    /// Advance the station by `dt` simulated seconds. `now` is the
    /// simulated clock at the end of the tick, used to timestamp completed
    /// steps.
    ///
    /// Returns the completed unit, if any. A single call never completes
    /// more than one unit, no matter how large `dt` is: a unit that
    /// finishes mid-tick leaves the station Waiting (or Idle) and the next
    /// queued unit starts on a later tick.
    pub fn advance<R: Rng>(
        &mut self,
        dt: f64,
        now: f64,
        rng: &mut R,
    ) -> Result<Option<Unit>, SimError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::InvalidArgument(format!(
                "tick delta must be non-negative, got {dt}"
            )));
        }

        match self.state {
            StationState::Idle => Ok(None),

            StationState::Broken => {
                self.busy_time += dt.min(self.breakdown_remaining);
                self.breakdown_remaining -= dt;
                if self.breakdown_remaining <= 0.0 {
                    self.breakdown_remaining = 0.0;
                    log::info!("station {} repaired", self.id.as_str());
                    self.settle();
                }
                Ok(None)
            }

            StationState::Waiting => {
                // Breakdown roll happens before work starts; a station that
                // breaks does not start processing this tick.
                if rng.random::<f64>() < self.breakdown_probability {
                    self.trigger_breakdown(rng);
                    return Ok(None);
                }
                let duration = round2(rng.random_range(
                    self.average_process_time * PROCESS_TIME_MIN_FACTOR
                        ..=self.average_process_time * PROCESS_TIME_MAX_FACTOR,
                ));
                self.start_processing(duration)?;
                // The freshly started unit consumes this tick's dt too.
                self.run_processing(dt, now)
            }

            StationState::Processing => self.run_processing(dt, now),
        }
    }

    /// Pop the queue head and begin processing it for an explicit duration.
    ///
    /// [`advance`](Self::advance) calls this with a sampled duration;
    /// deterministic tests call it directly to force the sample.
    pub(crate) fn start_processing(&mut self, duration: f64) -> Result<(), SimError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimError::InvalidArgument(format!(
                "processing duration must be non-negative, got {duration}"
            )));
        }
        if matches!(self.state, StationState::Processing | StationState::Broken) {
            return Err(SimError::InvalidState(format!(
                "station {} cannot start processing while {:?}",
                self.id.as_str(),
                self.state
            )));
        }
        let Some(mut unit) = self.queue.pop_front() else {
            return Err(SimError::InvalidState(format!(
                "station {} has no queued unit to process",
                self.id.as_str()
            )));
        };
        unit.mark_in_progress();
        log::debug!(
            "station {} processing unit {} for {duration:.2}s",
            self.id.as_str(),
            unit.id()
        );
        self.sampled_duration = duration;
        self.processing_remaining = duration;
        self.current = Some(unit);
        self.set_state(StationState::Processing);
        Ok(())
    }

    /// Count down the processing timer; emit the unit on completion.
    fn run_processing(&mut self, dt: f64, now: f64) -> Result<Option<Unit>, SimError> {
        self.busy_time += dt.min(self.processing_remaining);
        self.processing_remaining -= dt;
        if self.processing_remaining > 0.0 {
            return Ok(None);
        }
        self.processing_remaining = 0.0;

        let Some(mut unit) = self.current.take() else {
            return Err(SimError::InvalidState(format!(
                "station {} is Processing without a held unit",
                self.id.as_str()
            )));
        };
        // The history records the sampled duration, not the tick delta.
        unit.record_step(self.id, now, self.sampled_duration)?;
        self.settle();
        Ok(Some(unit))
    }

    fn trigger_breakdown<R: Rng>(&mut self, rng: &mut R) {
        let (min, max) = self.breakdown_duration;
        self.breakdown_remaining = round2(rng.random_range(min..=max));
        self.set_state(StationState::Broken);
        log::error!(
            "station {} broke down, repair in {:.2}s",
            self.id.as_str(),
            self.breakdown_remaining
        );
    }

    /// Re-derive Waiting/Idle from the queue after a completion or repair,
    /// so `state` never drifts from queue emptiness.
    fn settle(&mut self) {
        if self.queue.is_empty() {
            self.set_state(StationState::Idle);
        } else {
            self.set_state(StationState::Waiting);
        }
    }

    fn set_state(&mut self, new_state: StationState) {
        if self.state != new_state {
            log::debug!(
                "station {}: {:?} -> {:?}",
                self.id.as_str(),
                self.state,
                new_state
            );
            self.state = new_state;
        }
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

    fn unit(rng: &mut Pcg32) -> Unit {
        Unit::new(1, rng)
    }

    #[test]
    fn test_station_id_order_round_trip() {
        for (i, id) in StationId::ORDER.iter().enumerate() {
            assert_eq!(id.index(), i);
            assert_eq!(StationId::from_str(id.as_str()), Some(*id));
        }
        assert_eq!(StationId::from_str("warehouse"), None);
    }

    #[test]
    fn test_enqueue_moves_idle_to_waiting() {
        let mut rng = test_rng();
        let mut station = Station::new(StationId::Assembly);
        assert_eq!(station.state(), StationState::Idle);

        station.enqueue(unit(&mut rng));
        assert_eq!(station.state(), StationState::Waiting);
        assert_eq!(station.queue_len(), 1);
    }

    #[test]
    fn test_forced_sample_completes_in_one_large_tick() {
        // Waiting station, forced 5.0s sample, advance(10) -> the unit
        // completes, the timer is drained and the station goes Idle.
        let mut rng = test_rng();
        let mut station = Station::new(StationId::Assembly);
        station.set_breakdown_probability(0.0);
        station.enqueue(unit(&mut rng));

        station.start_processing(5.0).unwrap();
        assert_eq!(station.state(), StationState::Processing);
        assert!(station.current_unit().is_some());

        let done = station.advance(10.0, 10.0, &mut rng).unwrap();
        let done = done.expect("unit should complete");
        assert_eq!(station.processing_remaining(), 0.0);
        assert_eq!(station.state(), StationState::Idle);
        assert!(station.current_unit().is_none());

        let history = done.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].station, StationId::Assembly);
        assert_eq!(history[0].duration, 5.0);
        assert_eq!(done.total_process_time(), 5.0);
    }

    #[test]
    fn test_at_most_one_completion_per_advance() {
        let mut rng = test_rng();
        let mut station = Station::new(StationId::Packaging);
        station.set_breakdown_probability(0.0);
        station.enqueue(Unit::new(1, &mut rng));
        station.enqueue(Unit::new(2, &mut rng));

        // Enormous dt: still only one unit may complete per call.
        let done = station.advance(1_000.0, 1_000.0, &mut rng).unwrap();
        assert!(done.is_some());
        assert_eq!(station.state(), StationState::Waiting);
        assert_eq!(station.queue_len(), 1);

        let done = station.advance(1_000.0, 2_000.0, &mut rng).unwrap();
        assert!(done.is_some());
        assert_eq!(station.state(), StationState::Idle);
    }

    #[test]
    fn test_zero_breakdown_probability_never_breaks() {
        let mut rng = test_rng();
        let mut station = Station::new(StationId::Painting);
        station.set_breakdown_probability(0.0);

        for serial in 0..200 {
            station.enqueue(Unit::new(serial, &mut rng));
        }
        for tick in 0..2_000 {
            station.advance(0.5, tick as f64 * 0.5, &mut rng).unwrap();
            assert_ne!(station.state(), StationState::Broken);
        }
    }

    #[test]
    fn test_breakdown_blocks_queue_until_repaired() {
        let mut rng = test_rng();
        let mut station = Station::new(StationId::Assembly);
        station.set_breakdown_probability(1.0);
        station.enqueue(unit(&mut rng));

        // Guaranteed breakdown on the start attempt; no processing begins.
        let done = station.advance(1.0, 1.0, &mut rng).unwrap();
        assert!(done.is_none());
        assert_eq!(station.state(), StationState::Broken);
        assert!(station.breakdown_remaining() > 0.0);
        assert_eq!(station.queue_len(), 1);

        // Run the repair timer down; queued work resumes as Waiting.
        let repair = station.breakdown_remaining();
        let done = station.advance(repair + 1.0, 2.0, &mut rng).unwrap();
        assert!(done.is_none());
        assert_eq!(station.state(), StationState::Waiting);
        assert_eq!(station.queue_len(), 1);
    }

    #[test]
    fn test_sampled_duration_within_bounds() {
        let mut rng = test_rng();
        let mut station = Station::new(StationId::Painting);
        station.set_breakdown_probability(0.0);

        // avg 3.0 -> samples in [1.5, 4.5]
        for serial in 0..50 {
            station.enqueue(Unit::new(serial, &mut rng));
        }
        for _ in 0..50 {
            let done = station.advance(100.0, 0.0, &mut rng).unwrap();
            let done = done.expect("each large tick completes one unit");
            let duration = done.history()[0].duration;
            assert!((1.5..=4.5).contains(&duration), "out of range: {duration}");
            assert_eq!(duration, crate::round2(duration));
        }
    }

    #[test]
    fn test_utilization_counts_processing_time() {
        let mut rng = test_rng();
        let mut station = Station::new(StationId::Assembly);
        station.set_breakdown_probability(0.0);
        station.enqueue(unit(&mut rng));
        station.start_processing(4.0).unwrap();

        // 2s of a 4s job: fully busy so far.
        station.advance(2.0, 2.0, &mut rng).unwrap();
        assert_eq!(station.utilization(2.0), 1.0);

        // 4 more seconds: only 2 of them were spent processing.
        station.advance(4.0, 6.0, &mut rng).unwrap();
        let busy = station.utilization(6.0) * 6.0;
        assert!((busy - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_dt_rejected() {
        let mut rng = test_rng();
        let mut station = Station::new(StationId::Assembly);
        let err = station.advance(-0.1, 0.0, &mut rng).unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument(_)));
    }

    #[test]
    fn test_start_processing_on_empty_queue_fails() {
        let mut station = Station::new(StationId::Assembly);
        let err = station.start_processing(1.0).unwrap_err();
        assert!(matches!(err, SimError::InvalidState(_)));
    }
}
