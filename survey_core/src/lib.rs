//! Orbital surface survey engine.
//!
//! Tracks per-body scan coverage on equirectangular grids, paints
//! latitude-corrected footprints from a throttled request queue, and persists
//! coverage through a compact text codec. Everything runs inside a headless
//! Bevy [`App`]; one call to [`run_tick`] drains one batch of requests.

mod body;
pub mod codec;
pub mod coords;
mod cell_map;
mod coverage;
pub mod metrics;
mod queue;
mod registry;
mod survey_config;
mod systems;

use bevy::prelude::*;
use survey_schema::SurveySave;

pub use body::{
    derive_metrics, grid_dimensions, load_body_catalog_from_env, scan_altitude_window, total_mits,
    AltitudeStatus, BodyCatalog, BodyCatalogError, BodyId, BodyMetrics, BodyProfile,
    BUILTIN_BODY_CATALOG,
};
pub use cell_map::CellMap;
pub use codec::{decode, encode, CodecIssue, Decoded, EncodedForm, FULL_SENTINEL};
pub use coverage::{
    CoverageError, CoverageGrid, ScanDelta, ScanRules, TransmissionTicket,
    DEFAULT_AUTO_COMPLETE_THRESHOLD, DEFAULT_MAX_RADIUS_DIVISOR,
};
pub use metrics::SurveyMetrics;
pub use queue::{
    DrainReport, EnqueueOutcome, GeoSample, ObserveReport, QueueStats, ScanQueue, ScanRequest,
    SourceId, SourceObservation, TrajectorySampler,
};
pub use registry::{LoadReport, RegistryError, ScanRegistry};
pub use survey_config::{
    load_survey_config_from_env, AltitudeConfig, ScanRulesConfig, SchedulingConfig, SizingConfig,
    SurveyConfig, SurveyConfigError, SurveyConfigHandle, SurveyConfigMetadata,
    BUILTIN_SURVEY_CONFIG,
};
pub use systems::SurveyTick;

/// Installs the survey resources and the per-tick pipeline.
///
/// Resources already present in the world are kept, so a host can insert its
/// own configuration or registry before adding the plugin.
pub struct SurveyPlugin;

impl Plugin for SurveyPlugin {
    fn build(&self, app: &mut App) {
        if !app.world.contains_resource::<SurveyConfigHandle>() {
            let (config, metadata) = load_survey_config_from_env();
            app.insert_resource(SurveyConfigHandle::new(config))
                .insert_resource(metadata);
        }
        let config = app.world.resource::<SurveyConfigHandle>().get();
        if !app.world.contains_resource::<ScanRegistry>() {
            app.insert_resource(ScanRegistry::from_config(&config));
        }
        if !app.world.contains_resource::<ScanQueue>() {
            app.insert_resource(ScanQueue::new(config.sizing.dedup_radius_divisor));
        }

        app.init_resource::<SurveyTick>()
            .init_resource::<SurveyMetrics>()
            .add_systems(
                Update,
                (
                    systems::apply_config_changes,
                    systems::process_scan_queue,
                    systems::advance_tick,
                    metrics::collect_metrics,
                )
                    .chain(),
            );
    }
}

/// Construct a headless Bevy [`App`] running the survey pipeline.
pub fn build_headless_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins).add_plugins(SurveyPlugin);
    app
}

/// Execute a single survey tick.
///
/// Applies configuration changes, drains up to `processing_load` requests,
/// advances the tick counter and refreshes [`SurveyMetrics`].
pub fn run_tick(app: &mut App) {
    app.update();
}

/// Queue the requests for one source report.
pub fn submit_observation<S>(
    world: &mut World,
    observation: SourceObservation,
    sampler: &S,
) -> ObserveReport
where
    S: TrajectorySampler + ?Sized,
{
    let config = world.resource::<SurveyConfigHandle>().get();
    world.resource_scope(|world, mut queue: Mut<ScanQueue>| {
        let registry = world.resource::<ScanRegistry>();
        queue.observe(observation, sampler, registry, &config.scheduling)
    })
}

/// Replace all coverage with `save`. Pending requests and per-source state
/// are discarded.
pub fn load_survey(world: &mut World, save: &SurveySave) -> LoadReport {
    world.resource_mut::<ScanQueue>().clear();
    world.resource_mut::<ScanRegistry>().load_all(save)
}

pub fn save_survey(world: &World) -> SurveySave {
    world.resource::<ScanRegistry>().save_all()
}

/// Forget when each source last scanned, e.g. after a scene change, so the
/// next report never backfills.
pub fn reset_scan_clock(world: &mut World) {
    world.resource_mut::<ScanQueue>().reset_clock();
}
