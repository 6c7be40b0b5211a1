use bevy::prelude::*;

use crate::{queue::ScanQueue, registry::ScanRegistry, systems::SurveyTick};

#[derive(Resource, Default, Debug, Clone)]
pub struct SurveyMetrics {
    pub tick: u64,
    pub queue_depth: usize,
    pub processed_last_tick: usize,
    pub processed_total: u64,
    pub deduplicated_total: u64,
    pub dropped_total: u64,
    pub tracked_bodies: usize,
    pub fully_scanned_bodies: usize,
    /// Unweighted mean coverage over tracked bodies.
    pub mean_scan_percent: f64,
}

pub fn collect_metrics(
    tick: Res<SurveyTick>,
    queue: Res<ScanQueue>,
    registry: Res<ScanRegistry>,
    mut metrics: ResMut<SurveyMetrics>,
) {
    let stats = queue.stats();
    metrics.tick = tick.0;
    metrics.queue_depth = queue.depth();
    metrics.processed_last_tick = stats.processed_last_drain;
    metrics.processed_total = stats.processed_total;
    metrics.deduplicated_total = stats.deduplicated_total;
    metrics.dropped_total = stats.dropped_total;

    let bodies = registry.bodies();
    metrics.tracked_bodies = bodies.len();
    metrics.fully_scanned_bodies = bodies
        .iter()
        .filter(|body| registry.is_fully_scanned(**body))
        .count();
    metrics.mean_scan_percent = if bodies.is_empty() {
        0.0
    } else {
        bodies
            .iter()
            .map(|body| registry.scan_percent(*body))
            .sum::<f64>()
            / bodies.len() as f64
    };
}
