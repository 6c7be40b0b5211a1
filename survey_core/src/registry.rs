//! Registry of coverage grids keyed by body.
//!
//! Grids are created lazily on the first update for a body, never removed
//! during a session, and replaced wholesale when a save is loaded.

use std::collections::HashMap;

use bevy::prelude::Resource;
use survey_schema::{BodyScanRecord, SurveySave};
use thiserror::Error;

use crate::{
    body::{load_body_catalog_from_env, BodyCatalog, BodyId, BodyMetrics},
    cell_map::CellMap,
    codec::{self, Decoded},
    coverage::{CoverageError, CoverageGrid, ScanDelta, ScanRules, TransmissionTicket},
    survey_config::SurveyConfig,
};

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("body {0} is not in the catalog")]
    UnknownBody(BodyId),
    #[error("body {0} cannot be scanned")]
    Unscannable(BodyId),
    #[error("no coverage grid exists for body {0}")]
    NoGrid(BodyId),
    #[error(transparent)]
    Coverage(#[from] CoverageError),
}

/// Summary of a bulk load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub bodies_loaded: usize,
    pub unknown_bodies: Vec<String>,
    /// Missing fields, bad dimensions and decode problems, one per occurrence.
    pub warnings: usize,
}

/// All coverage grids of the current session.
#[derive(Resource, Debug, Clone)]
pub struct ScanRegistry {
    grids: HashMap<BodyId, CoverageGrid>,
    catalog: BodyCatalog,
    rules: ScanRules,
}

impl ScanRegistry {
    pub fn new(catalog: BodyCatalog, rules: ScanRules) -> Self {
        Self {
            grids: HashMap::new(),
            catalog,
            rules,
        }
    }

    /// Registry over the catalog named by the environment, or the builtin one.
    pub fn from_config(config: &SurveyConfig) -> Self {
        let catalog = load_body_catalog_from_env(config.sizing.clone(), config.altitude.clone());
        Self::new(catalog, ScanRules::from(config))
    }

    pub fn catalog(&self) -> &BodyCatalog {
        &self.catalog
    }

    pub fn rules(&self) -> ScanRules {
        self.rules
    }

    /// Push new rules to the catalog and every live grid. Existing grids keep
    /// their dimensions.
    pub fn apply_config(&mut self, config: &SurveyConfig) {
        self.catalog
            .reconfigure(config.sizing.clone(), config.altitude.clone());
        self.rules = ScanRules::from(config);
        for grid in self.grids.values_mut() {
            grid.set_rules(self.rules);
        }
    }

    pub fn get(&self, body: BodyId) -> Option<&CoverageGrid> {
        self.grids.get(&body)
    }

    pub fn get_mut(&mut self, body: BodyId) -> Option<&mut CoverageGrid> {
        self.grids.get_mut(&body)
    }

    /// Width and height a grid for `body` has, or would have if created now.
    pub fn dimensions_for(&self, body: BodyId) -> Option<(u32, u32)> {
        match self.grids.get(&body) {
            Some(grid) => Some((grid.width(), grid.height())),
            None => self
                .catalog
                .metrics(body)
                .map(|metrics| (metrics.width, metrics.height)),
        }
    }

    fn metrics(&self, body: BodyId) -> Result<BodyMetrics, RegistryError> {
        let metrics = self
            .catalog
            .metrics(body)
            .ok_or(RegistryError::UnknownBody(body))?;
        if !self.catalog.is_scannable(body) {
            return Err(RegistryError::Unscannable(body));
        }
        Ok(metrics)
    }

    /// Fetch the grid for `body`, creating it at the catalog size.
    pub fn ensure_grid(&mut self, body: BodyId) -> Result<&mut CoverageGrid, RegistryError> {
        if !self.grids.contains_key(&body) {
            let metrics = self.metrics(body)?;
            tracing::debug!(
                target: "orbital_survey::registry",
                body = body.0,
                width = metrics.width,
                height = metrics.height,
                total_mits = metrics.total_mits,
                "registry.grid.created"
            );
            let grid = CoverageGrid::new(body, metrics.width, metrics.height, metrics.total_mits)
                .with_rules(self.rules);
            self.grids.insert(body, grid);
        }
        self.grids
            .get_mut(&body)
            .ok_or(RegistryError::NoGrid(body))
    }

    /// Paint a footprint onto `body`, creating its grid on first use.
    pub fn update(
        &mut self,
        body: BodyId,
        is_scanned: bool,
        lon: f64,
        lat: f64,
        radius: u32,
    ) -> Result<ScanDelta, RegistryError> {
        let grid = self.ensure_grid(body)?;
        Ok(grid.update_scan_data(is_scanned, lon, lat, radius))
    }

    /// Coverage of `body`, 0 when nothing has been scanned there.
    pub fn scan_percent(&self, body: BodyId) -> f64 {
        self.grids
            .get(&body)
            .map(CoverageGrid::scan_percent)
            .unwrap_or(0.0)
    }

    pub fn is_fully_scanned(&self, body: BodyId) -> bool {
        self.grids
            .get(&body)
            .is_some_and(CoverageGrid::is_fully_scanned)
    }

    pub fn available_mits(&self, body: BodyId) -> f32 {
        self.grids
            .get(&body)
            .map(CoverageGrid::available_mits)
            .unwrap_or(0.0)
    }

    /// Bodies with a live grid, in id order.
    pub fn bodies(&self) -> Vec<BodyId> {
        let mut bodies: Vec<_> = self.grids.keys().copied().collect();
        bodies.sort();
        bodies
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    pub fn begin_transmission(&self, body: BodyId) -> Result<TransmissionTicket, RegistryError> {
        self.grids
            .get(&body)
            .map(CoverageGrid::begin_transmission)
            .ok_or(RegistryError::NoGrid(body))
    }

    pub fn complete_transmission(
        &mut self,
        ticket: TransmissionTicket,
        mits_received: f32,
    ) -> Result<f32, RegistryError> {
        let grid = self
            .grids
            .get_mut(&ticket.body)
            .ok_or(RegistryError::NoGrid(ticket.body))?;
        Ok(grid.complete_transmission(ticket, mits_received)?)
    }

    pub fn clear(&mut self) {
        self.grids.clear();
    }

    /// Replace every grid with the contents of `save`.
    ///
    /// Records for names missing from the catalog are skipped. Missing or
    /// damaged fields are logged once each and defaulted.
    pub fn load_all(&mut self, save: &SurveySave) -> LoadReport {
        self.grids.clear();
        let mut report = LoadReport::default();

        for (name, record) in &save.bodies {
            let Some(body) = self.catalog.id_by_name(name) else {
                tracing::warn!(
                    target: "orbital_survey::registry",
                    body = %name,
                    "registry.load.unknown_body"
                );
                report.unknown_bodies.push(name.clone());
                continue;
            };
            let metrics = match self.metrics(body) {
                Ok(metrics) => metrics,
                Err(err) => {
                    tracing::warn!(
                        target: "orbital_survey::registry",
                        body = %name,
                        error = %err,
                        "registry.load.skipped"
                    );
                    report.warnings += 1;
                    continue;
                }
            };
            let grid = self.load_record(name, body, metrics, record, &mut report.warnings);
            self.grids.insert(body, grid);
            report.bodies_loaded += 1;
        }

        tracing::info!(
            target: "orbital_survey::registry",
            version = save.version,
            loaded = report.bodies_loaded,
            skipped = report.unknown_bodies.len(),
            warnings = report.warnings,
            "registry.load.complete"
        );
        report
    }

    fn load_record(
        &self,
        name: &str,
        body: BodyId,
        metrics: BodyMetrics,
        record: &BodyScanRecord,
        warnings: &mut usize,
    ) -> CoverageGrid {
        let computed = (metrics.width, metrics.height);
        if record.data_width.is_none() {
            missing_field(name, "dataWidth", warnings);
        }
        if record.data_height.is_none() {
            missing_field(name, "dataHeight", warnings);
        }
        let (width, height) = match record.dimensions() {
            Some((0, _)) | Some((_, 0)) => {
                tracing::warn!(
                    target: "orbital_survey::registry",
                    body = %name,
                    "registry.load.zero_dimensions"
                );
                *warnings += 1;
                computed
            }
            Some(saved) => {
                if saved != computed {
                    tracing::info!(
                        target: "orbital_survey::registry",
                        body = %name,
                        saved_width = saved.0,
                        saved_height = saved.1,
                        width = computed.0,
                        height = computed.1,
                        "registry.load.legacy_size"
                    );
                }
                saved
            }
            None => computed,
        };

        let mut grid =
            CoverageGrid::new(body, width, height, metrics.total_mits).with_rules(self.rules);

        match record.data.as_deref() {
            Some(text) => {
                let map = decode_layer(name, "data", text, width, height, warnings);
                if let Err(err) = grid.set_scanned_map(map) {
                    layer_rejected(name, "data", &err, warnings);
                }
            }
            None => missing_field(name, "data", warnings),
        }
        match record.revealed.as_deref() {
            Some(text) => {
                let map = decode_layer(name, "revealed", text, width, height, warnings);
                if let Err(err) = grid.set_revealed_map(map) {
                    layer_rejected(name, "revealed", &err, warnings);
                }
            }
            None => missing_field(name, "revealed", warnings),
        }
        match record.mits_transmitted {
            Some(mits) => grid.set_mits_gleaned(mits),
            None => missing_field(name, "mitsTransmitted", warnings),
        }

        grid.recompute_scan_percent();
        grid
    }

    /// Persist every live grid, keyed by body name.
    pub fn save_all(&self) -> SurveySave {
        let mut save = SurveySave::new();
        for body in self.bodies() {
            let (Some(grid), Some(profile)) = (self.grids.get(&body), self.catalog.profile(body))
            else {
                continue;
            };
            save.insert(
                profile.name.clone(),
                BodyScanRecord::new(
                    grid.width(),
                    grid.height(),
                    codec::encode(grid.scanned()),
                    codec::encode(grid.revealed()),
                    grid.mits_gleaned(),
                ),
            );
        }
        save
    }
}

fn missing_field(body: &str, field: &'static str, warnings: &mut usize) {
    tracing::warn!(
        target: "orbital_survey::registry",
        body = %body,
        field,
        "registry.load.missing_field"
    );
    *warnings += 1;
}

fn layer_rejected(body: &str, field: &'static str, err: &CoverageError, warnings: &mut usize) {
    tracing::error!(
        target: "orbital_survey::registry",
        body = %body,
        field,
        error = %err,
        "registry.load.layer_rejected"
    );
    *warnings += 1;
}

fn decode_layer(
    body: &str,
    field: &'static str,
    text: &str,
    width: u32,
    height: u32,
    warnings: &mut usize,
) -> CellMap {
    let Decoded { map, form, issues } = codec::decode(text, width, height);
    for issue in &issues {
        tracing::warn!(
            target: "orbital_survey::codec",
            body = %body,
            field,
            form = form.label(),
            issue = %issue,
            "codec.decode.issue"
        );
    }
    *warnings += issues.len();
    map
}
