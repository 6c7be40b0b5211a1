//! Scan request queue.
//!
//! Sources report their ground position every tick. The queue discards
//! positions too close to the source's previous request on the same body,
//! backfills missed scan intervals from the source's trajectory, and feeds a
//! bounded number of requests per tick into the [`ScanRegistry`].

use std::collections::{HashMap, VecDeque};
use std::fmt;

use bevy::prelude::Resource;

use crate::{
    body::BodyId,
    coords::{clamp_latitude, clamp_longitude, lat_to_row, lon_to_col, within_distance},
    registry::ScanRegistry,
    survey_config::SchedulingConfig,
};

/// Identifier of a scanning source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single footprint waiting to be painted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRequest {
    pub body: BodyId,
    pub longitude: f64,
    pub latitude: f64,
    /// `true` marks cells scanned, `false` clears them.
    pub reveal: bool,
    pub radius: u32,
    /// Universal time the position was sampled at.
    pub timestamp: f64,
    pub source: SourceId,
}

/// Position of a source over a body at some time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoSample {
    pub body: BodyId,
    pub longitude: f64,
    pub latitude: f64,
}

/// Supplies a source's ground position at an arbitrary universal time.
pub trait TrajectorySampler {
    /// `None` when the position cannot be determined, e.g. the source was
    /// not in orbit at `ut`.
    fn sample_at(&self, ut: f64) -> Option<GeoSample>;
}

impl<F> TrajectorySampler for F
where
    F: Fn(f64) -> Option<GeoSample>,
{
    fn sample_at(&self, ut: f64) -> Option<GeoSample> {
        self(ut)
    }
}

/// What a source reports for the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceObservation {
    pub source: SourceId,
    pub position: GeoSample,
    pub ut: f64,
    pub reveal: bool,
    pub radius: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued { depth: usize },
    Deduplicated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveReport {
    pub queued: usize,
    pub deduplicated: usize,
    /// Samples requested for missed intervals, whether or not they queued.
    pub backfilled: usize,
    pub unavailable: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub processed: usize,
    pub dropped: usize,
    pub cells_changed: u64,
    pub auto_completed: Vec<BodyId>,
}

/// Running totals kept for metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub queued_total: u64,
    pub deduplicated_total: u64,
    pub processed_total: u64,
    pub dropped_total: u64,
    pub processed_last_drain: usize,
}

/// FIFO of pending scan requests plus per-source dedup and timing state.
#[derive(Resource, Debug, Clone, Default)]
pub struct ScanQueue {
    pending: VecDeque<ScanRequest>,
    last_requests: HashMap<SourceId, ScanRequest>,
    last_scan_ut: HashMap<SourceId, f64>,
    dedup_radius_divisor: u32,
    stats: QueueStats,
}

impl ScanQueue {
    pub fn new(dedup_radius_divisor: u32) -> Self {
        Self {
            dedup_radius_divisor,
            ..Default::default()
        }
    }

    pub fn depth(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ScanRequest> + '_ {
        self.pending.iter()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    pub fn last_scan_ut(&self, source: SourceId) -> Option<f64> {
        self.last_scan_ut.get(&source).copied()
    }

    pub fn set_dedup_radius_divisor(&mut self, divisor: u32) {
        self.dedup_radius_divisor = divisor;
    }

    /// Queue a request unless it lands within the dedup distance of the
    /// source's previous request on the same body.
    ///
    /// The distance is `max(radius / divisor, 1)` cells. The column gap wraps
    /// at the date line and is compressed by the cosine of the new request's
    /// latitude so that converging meridians do not defeat the check near
    /// the poles.
    pub fn enqueue(&mut self, request: ScanRequest, registry: &ScanRegistry) -> EnqueueOutcome {
        if let (Some(last), Some((width, height))) = (
            self.last_requests.get(&request.source),
            registry.dimensions_for(request.body),
        ) {
            if last.body == request.body
                && self.is_duplicate(last, &request, width, height)
            {
                tracing::trace!(
                    target: "orbital_survey::queue",
                    source = request.source.0,
                    body = request.body.0,
                    "queue.enqueue.deduplicated"
                );
                self.stats.deduplicated_total += 1;
                return EnqueueOutcome::Deduplicated;
            }
        }

        self.last_requests.insert(request.source, request);
        self.pending.push_back(request);
        self.stats.queued_total += 1;
        EnqueueOutcome::Queued {
            depth: self.pending.len(),
        }
    }

    fn is_duplicate(&self, last: &ScanRequest, next: &ScanRequest, width: u32, height: u32) -> bool {
        let compression = next.latitude.to_radians().cos().max(0.0);
        let dx = lon_to_col(last.longitude, width).abs_diff(lon_to_col(next.longitude, width));
        let dx = dx.min(width - dx);
        let dist = (next.radius / self.dedup_radius_divisor.max(1)).max(1);
        within_distance(
            0.0,
            lat_to_row(last.latitude, height) as f64,
            (dx as f64 * compression).round(),
            lat_to_row(next.latitude, height) as f64,
            dist as f64,
        )
    }

    /// Turn a source's report into queued requests.
    ///
    /// When more than two scan intervals have passed since the source last
    /// scanned and retroactive scanning is on, one request is queued per
    /// missed interval boundary from `sampler`, up to and including `ut`.
    /// Otherwise only the current position is queued.
    pub fn observe<S>(
        &mut self,
        observation: SourceObservation,
        sampler: &S,
        registry: &ScanRegistry,
        scheduling: &SchedulingConfig,
    ) -> ObserveReport
    where
        S: TrajectorySampler + ?Sized,
    {
        let mut report = ObserveReport::default();
        let interval = scheduling.time_between_scans;
        let last = self.last_scan_ut(observation.source);

        match last {
            Some(last)
                if scheduling.retroactive_scanning
                    && interval > 0.0
                    && observation.ut - last > 2.0 * interval =>
            {
                tracing::debug!(
                    target: "orbital_survey::queue",
                    source = observation.source.0,
                    from = last,
                    to = observation.ut,
                    interval,
                    "queue.backfill START"
                );
                let mut step = 1u64;
                loop {
                    let t = last + interval * step as f64;
                    if t > observation.ut {
                        break;
                    }
                    step += 1;
                    report.backfilled += 1;
                    let Some(sample) = sampler.sample_at(t) else {
                        tracing::debug!(
                            target: "orbital_survey::queue",
                            source = observation.source.0,
                            ut = t,
                            "queue.backfill.sample_unavailable"
                        );
                        report.unavailable += 1;
                        continue;
                    };
                    let outcome = self.enqueue(request_at(&observation, sample, t), registry);
                    tally(outcome, &mut report);
                }
                tracing::debug!(
                    target: "orbital_survey::queue",
                    source = observation.source.0,
                    backfilled = report.backfilled,
                    queued = report.queued,
                    "queue.backfill END"
                );
            }
            _ => {
                let request = request_at(&observation, observation.position, observation.ut);
                let outcome = self.enqueue(request, registry);
                tally(outcome, &mut report);
            }
        }

        self.last_scan_ut.insert(observation.source, observation.ut);
        report
    }

    /// Paint up to `budget` requests in arrival order.
    pub fn drain(&mut self, registry: &mut ScanRegistry, budget: usize) -> DrainReport {
        let mut report = DrainReport::default();
        while report.processed + report.dropped < budget {
            let Some(request) = self.pending.pop_front() else {
                break;
            };
            match registry.update(
                request.body,
                request.reveal,
                request.longitude,
                request.latitude,
                request.radius,
            ) {
                Ok(delta) => {
                    report.processed += 1;
                    report.cells_changed += delta.cells_changed as u64;
                    if delta.auto_completed {
                        report.auto_completed.push(request.body);
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        target: "orbital_survey::queue",
                        source = request.source.0,
                        body = request.body.0,
                        error = %err,
                        "queue.drain.dropped"
                    );
                    report.dropped += 1;
                }
            }
        }
        self.stats.processed_total += report.processed as u64;
        self.stats.dropped_total += report.dropped as u64;
        self.stats.processed_last_drain = report.processed;
        report
    }

    /// Forget per-source scan times so the next report never backfills.
    pub fn reset_clock(&mut self) {
        self.last_scan_ut.clear();
    }

    /// Drop a source's dedup and timing state.
    pub fn forget_source(&mut self, source: SourceId) {
        self.last_requests.remove(&source);
        self.last_scan_ut.remove(&source);
    }

    /// Drop all pending requests and per-source state.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_requests.clear();
        self.last_scan_ut.clear();
    }
}

fn tally(outcome: EnqueueOutcome, report: &mut ObserveReport) {
    match outcome {
        EnqueueOutcome::Queued { .. } => report.queued += 1,
        EnqueueOutcome::Deduplicated => report.deduplicated += 1,
    }
}

fn request_at(observation: &SourceObservation, sample: GeoSample, ut: f64) -> ScanRequest {
    ScanRequest {
        body: sample.body,
        longitude: clamp_longitude(sample.longitude),
        latitude: clamp_latitude(sample.latitude),
        reveal: observation.reveal,
        radius: observation.radius,
        timestamp: ut,
        source: observation.source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyCatalog;
    use crate::coverage::ScanRules;
    use crate::survey_config::{AltitudeConfig, SizingConfig};

    const KERBIN: BodyId = BodyId(1);
    const MUN: BodyId = BodyId(2);
    const SAT: SourceId = SourceId(7);

    fn new_registry() -> ScanRegistry {
        ScanRegistry::new(
            BodyCatalog::builtin(SizingConfig::default(), AltitudeConfig::default()),
            ScanRules::default(),
        )
    }

    fn request(body: BodyId, lon: f64, lat: f64, radius: u32) -> ScanRequest {
        ScanRequest {
            body,
            longitude: lon,
            latitude: lat,
            reveal: true,
            radius,
            timestamp: 0.0,
            source: SAT,
        }
    }

    fn observation(lon: f64, ut: f64) -> SourceObservation {
        SourceObservation {
            source: SAT,
            position: GeoSample {
                body: KERBIN,
                longitude: lon,
                latitude: 0.0,
            },
            ut,
            reveal: true,
            radius: 4,
        }
    }

    #[test]
    fn dedup_discards_nearby_request() {
        let registry = new_registry();
        let mut queue = ScanQueue::new(4);
        assert_eq!(
            queue.enqueue(request(KERBIN, 0.0, 0.0, 4), &registry),
            EnqueueOutcome::Queued { depth: 1 }
        );
        // 0.5° is the same column on a 300-wide grid
        assert_eq!(
            queue.enqueue(request(KERBIN, 0.5, 0.0, 4), &registry),
            EnqueueOutcome::Deduplicated
        );
        assert_eq!(
            queue.enqueue(request(KERBIN, 30.0, 0.0, 4), &registry),
            EnqueueOutcome::Queued { depth: 2 }
        );
        // same spot on another body is never a duplicate
        assert_eq!(
            queue.enqueue(request(MUN, 30.0, 0.0, 4), &registry),
            EnqueueOutcome::Queued { depth: 3 }
        );
        assert_eq!(queue.stats().deduplicated_total, 1);
    }

    #[test]
    fn dedup_distance_wraps_at_the_date_line() {
        let registry = new_registry();
        let mut queue = ScanQueue::new(4);
        // columns 1 and 299 on a 300-wide grid are two cells apart
        queue.enqueue(request(KERBIN, 89.0, 0.0, 8), &registry);
        assert_eq!(
            queue.enqueue(request(KERBIN, 91.0, 0.0, 8), &registry),
            EnqueueOutcome::Deduplicated
        );
        assert_eq!(
            queue.enqueue(request(KERBIN, 95.0, 0.0, 8), &registry),
            EnqueueOutcome::Queued { depth: 2 }
        );
    }

    #[test]
    fn forgotten_source_starts_fresh() {
        let registry = new_registry();
        let scheduling = SchedulingConfig::default();
        let mut queue = ScanQueue::new(4);
        let sampler = |_ut: f64| -> Option<GeoSample> { panic!("sampler should not be used") };

        queue.observe(observation(0.0, 0.0), &sampler, &registry, &scheduling);
        queue.forget_source(SAT);
        assert_eq!(queue.last_scan_ut(SAT), None);

        // same spot, long gap: neither deduplicated nor backfilled
        let report = queue.observe(observation(0.0, 600.0), &sampler, &registry, &scheduling);
        assert_eq!(report.queued, 1);
        assert_eq!(report.deduplicated, 0);
        assert_eq!(report.backfilled, 0);
        assert_eq!(queue.depth(), 2);
    }

    #[test]
    fn dedup_compares_against_other_sources_independently() {
        let registry = new_registry();
        let mut queue = ScanQueue::new(4);
        queue.enqueue(request(KERBIN, 0.0, 0.0, 4), &registry);
        let mut other = request(KERBIN, 0.0, 0.0, 4);
        other.source = SourceId(8);
        assert!(matches!(
            queue.enqueue(other, &registry),
            EnqueueOutcome::Queued { .. }
        ));
    }

    #[test]
    fn drain_respects_budget_and_order() {
        let mut registry = new_registry();
        let mut queue = ScanQueue::new(4);
        for lon in [0.0, 60.0, 120.0] {
            queue.enqueue(request(KERBIN, lon, 0.0, 2), &registry);
        }
        let report = queue.drain(&mut registry, 2);
        assert_eq!(report.processed, 2);
        assert_eq!(queue.depth(), 1);
        assert_eq!(queue.pending().next().unwrap().longitude, 120.0);
        assert!(registry.scan_percent(KERBIN) > 0.0);

        let report = queue.drain(&mut registry, 2);
        assert_eq!(report.processed, 1);
        assert!(queue.is_empty());
        assert_eq!(queue.stats().processed_total, 3);
    }

    #[test]
    fn drain_drops_unknown_bodies() {
        let mut registry = new_registry();
        let mut queue = ScanQueue::new(4);
        queue.enqueue(request(BodyId(404), 0.0, 0.0, 2), &registry);
        queue.enqueue(request(KERBIN, 0.0, 0.0, 2), &registry);
        queue.enqueue(request(BodyId(0), 0.0, 0.0, 2), &registry);
        let report = queue.drain(&mut registry, 3);
        assert_eq!(report.dropped, 2);
        assert_eq!(report.processed, 1);
        assert_eq!(registry.bodies(), vec![KERBIN]);
    }

    #[test]
    fn backfill_queues_one_request_per_missed_interval() {
        let registry = new_registry();
        let scheduling = SchedulingConfig::default();
        let mut queue = ScanQueue::new(4);
        let sampler = |ut: f64| {
            Some(GeoSample {
                body: KERBIN,
                longitude: ut * 10.0,
                latitude: 0.0,
            })
        };

        let report = queue.observe(observation(0.0, 0.0), &sampler, &registry, &scheduling);
        assert_eq!(report.queued, 1);

        // 12s later with a 3s interval: boundaries at 3, 6, 9, 12
        let report = queue.observe(observation(120.0, 12.0), &sampler, &registry, &scheduling);
        assert_eq!(report.backfilled, 4);
        assert_eq!(report.queued, 4);
        let stamps: Vec<f64> = queue.pending().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![0.0, 3.0, 6.0, 9.0, 12.0]);
        assert_eq!(queue.last_scan_ut(SAT), Some(12.0));
    }

    #[test]
    fn short_gaps_and_disabled_backfill_queue_current_position() {
        let registry = new_registry();
        let mut queue = ScanQueue::new(4);
        let sampler = |_ut: f64| -> Option<GeoSample> { panic!("sampler should not be used") };

        let scheduling = SchedulingConfig::default();
        queue.observe(observation(0.0, 0.0), &sampler, &registry, &scheduling);
        // exactly two intervals is not a gap
        let report = queue.observe(observation(40.0, 6.0), &sampler, &registry, &scheduling);
        assert_eq!(report.queued, 1);
        assert_eq!(report.backfilled, 0);

        let scheduling = SchedulingConfig {
            retroactive_scanning: false,
            ..SchedulingConfig::default()
        };
        let report = queue.observe(observation(80.0, 600.0), &sampler, &registry, &scheduling);
        assert_eq!(report.queued, 1);
        assert_eq!(queue.pending().last().unwrap().timestamp, 600.0);
    }

    #[test]
    fn backfill_skips_unavailable_samples_and_clamps_positions() {
        let registry = new_registry();
        let scheduling = SchedulingConfig::default();
        let mut queue = ScanQueue::new(4);
        let sampler = |ut: f64| {
            (ut != 6.0).then_some(GeoSample {
                body: KERBIN,
                longitude: 170.0 + ut * 5.0,
                latitude: 95.0,
            })
        };
        queue.observe(observation(0.0, 0.0), &sampler, &registry, &scheduling);
        let report = queue.observe(observation(0.0, 9.0), &sampler, &registry, &scheduling);
        assert_eq!(report.backfilled, 3);
        assert_eq!(report.unavailable, 1);

        let backfilled: Vec<&ScanRequest> = queue.pending().skip(1).collect();
        assert!(backfilled
            .iter()
            .all(|r| r.longitude > -180.0 && r.longitude <= 180.0));
        assert!(backfilled.iter().all(|r| r.latitude == 85.0));
    }

    #[test]
    fn reset_clock_prevents_backfill() {
        let registry = new_registry();
        let scheduling = SchedulingConfig::default();
        let mut queue = ScanQueue::new(4);
        let sampler = |_ut: f64| -> Option<GeoSample> { None };
        queue.observe(observation(0.0, 0.0), &sampler, &registry, &scheduling);
        queue.reset_clock();
        let report = queue.observe(observation(90.0, 500.0), &sampler, &registry, &scheduling);
        assert_eq!(report.backfilled, 0);
        assert_eq!(report.queued, 1);
    }
}
