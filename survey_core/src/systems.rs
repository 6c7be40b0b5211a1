use bevy::prelude::*;

use crate::{queue::ScanQueue, registry::ScanRegistry, survey_config::SurveyConfigHandle};

/// Number of survey ticks run so far.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurveyTick(pub u64);

/// Push a replaced configuration into the registry and queue.
pub fn apply_config_changes(
    config: Res<SurveyConfigHandle>,
    mut registry: ResMut<ScanRegistry>,
    mut queue: ResMut<ScanQueue>,
) {
    if !config.is_changed() {
        return;
    }
    let cfg = config.get();
    registry.apply_config(&cfg);
    queue.set_dedup_radius_divisor(cfg.sizing.dedup_radius_divisor);
    tracing::debug!(
        target: "orbital_survey::config",
        threshold = cfg.rules.auto_complete_threshold,
        processing_load = cfg.scheduling.processing_load,
        "survey_config.applied"
    );
}

/// Drain one batch of scan requests into the registry.
pub fn process_scan_queue(
    config: Res<SurveyConfigHandle>,
    tick: Res<SurveyTick>,
    mut queue: ResMut<ScanQueue>,
    mut registry: ResMut<ScanRegistry>,
) {
    let budget = config.0.scheduling.processing_load;
    let report = queue.drain(&mut registry, budget);
    if report.processed + report.dropped == 0 {
        return;
    }

    tracing::debug!(
        target: "orbital_survey::queue",
        tick = tick.0,
        processed = report.processed,
        dropped = report.dropped,
        cells_changed = report.cells_changed,
        remaining = queue.depth(),
        "queue.drain"
    );
    for body in &report.auto_completed {
        tracing::info!(
            target: "orbital_survey::queue",
            tick = tick.0,
            body = body.0,
            "queue.drain.auto_completed"
        );
    }
}

pub fn advance_tick(mut tick: ResMut<SurveyTick>) {
    tick.0 = tick.0.wrapping_add(1);
}
