//! Celestial bodies known to the survey engine and the values derived from
//! their physical size.

use std::{
    collections::HashMap,
    env, f64::consts::PI, fmt, fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

use crate::survey_config::{AltitudeConfig, SizingConfig};

pub const BUILTIN_BODY_CATALOG: &str = include_str!("data/bodies.json");

/// Stable small-integer identifier of a celestial body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct BodyId(pub u32);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical description of a body as supplied by the host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BodyProfile {
    pub id: BodyId,
    pub name: String,
    /// Mean radius in meters.
    pub radius_m: f64,
    /// Stars and other bodies without a surface never get a coverage grid.
    #[serde(default = "default_scannable")]
    pub scannable: bool,
}

fn default_scannable() -> bool {
    true
}

impl BodyProfile {
    pub fn new(id: BodyId, name: impl Into<String>, radius_m: f64) -> Self {
        Self {
            id,
            name: name.into(),
            radius_m,
            scannable: true,
        }
    }

    pub fn unscannable(mut self) -> Self {
        self.scannable = false;
        self
    }
}

/// Values derived from a body profile and the current sizing rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyMetrics {
    pub width: u32,
    pub height: u32,
    pub total_mits: f32,
    pub min_altitude: f64,
    pub max_altitude: f64,
}

/// Where an altitude sits relative to a body's scan window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltitudeStatus {
    TooLow,
    InRange,
    TooHigh,
}

/// Grid dimensions for a body: height follows the circumference, width is
/// always twice the height.
pub fn grid_dimensions(radius_m: f64, sizing: &SizingConfig) -> (u32, u32) {
    let radius_km = radius_m / 1000.0;
    let height = ((2.0 * PI * radius_km) / sizing.width_divisor_km) as u32;
    let height = height.max(sizing.min_height);
    (height * 2, height)
}

/// Mits budget for a body, including the reserved completion unit.
pub fn total_mits(radius_m: f64, sizing: &SizingConfig) -> f32 {
    let radius_km = radius_m / 1000.0;
    let mits = ((4.0 * PI * radius_km * radius_km) / sizing.mits_divisor_km2) as u32;
    (mits.max(sizing.min_mits) + sizing.reserved_mits) as f32
}

/// Lowest and highest altitude (meters) from which a body can be scanned.
pub fn scan_altitude_window(radius_m: f64, altitude: &AltitudeConfig) -> (f64, f64) {
    let min = (radius_m * altitude.min_factor).max(altitude.min_absolute);
    let max = (radius_m * altitude.max_factor).min(altitude.max_absolute);
    (min, max)
}

pub fn derive_metrics(
    profile: &BodyProfile,
    sizing: &SizingConfig,
    altitude: &AltitudeConfig,
) -> BodyMetrics {
    let (width, height) = grid_dimensions(profile.radius_m, sizing);
    let (min_altitude, max_altitude) = scan_altitude_window(profile.radius_m, altitude);
    BodyMetrics {
        width,
        height,
        total_mits: total_mits(profile.radius_m, sizing),
        min_altitude,
        max_altitude,
    }
}

#[derive(Debug, Error)]
pub enum BodyCatalogError {
    #[error("failed to parse body catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read body catalog from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("body catalog lists id {0} more than once")]
    DuplicateId(BodyId),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    bodies: Vec<BodyProfile>,
}

/// Known bodies with their derived metrics memoized per id.
///
/// Metrics are computed once at registration and recomputed only when the
/// sizing or altitude rules change.
#[derive(Debug, Clone, Default)]
pub struct BodyCatalog {
    profiles: HashMap<BodyId, BodyProfile>,
    names: HashMap<String, BodyId>,
    metrics: HashMap<BodyId, BodyMetrics>,
    sizing: SizingConfig,
    altitude: AltitudeConfig,
}

impl BodyCatalog {
    pub fn new(sizing: SizingConfig, altitude: AltitudeConfig) -> Self {
        Self {
            sizing,
            altitude,
            ..Default::default()
        }
    }

    pub fn builtin(sizing: SizingConfig, altitude: AltitudeConfig) -> Self {
        Self::from_json_str(BUILTIN_BODY_CATALOG, sizing, altitude)
            .expect("builtin body catalog should parse")
    }

    pub fn from_json_str(
        json: &str,
        sizing: SizingConfig,
        altitude: AltitudeConfig,
    ) -> Result<Self, BodyCatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let mut catalog = Self::new(sizing, altitude);
        for profile in file.bodies {
            if catalog.profiles.contains_key(&profile.id) {
                return Err(BodyCatalogError::DuplicateId(profile.id));
            }
            catalog.register(profile);
        }
        Ok(catalog)
    }

    pub fn from_file(
        path: &Path,
        sizing: SizingConfig,
        altitude: AltitudeConfig,
    ) -> Result<Self, BodyCatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| BodyCatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents, sizing, altitude)
    }

    /// Add or replace a body.
    pub fn register(&mut self, profile: BodyProfile) {
        let metrics = derive_metrics(&profile, &self.sizing, &self.altitude);
        if let Some(previous) = self.profiles.get(&profile.id) {
            self.names.remove(&previous.name);
        }
        self.names.insert(profile.name.clone(), profile.id);
        self.metrics.insert(profile.id, metrics);
        self.profiles.insert(profile.id, profile);
    }

    /// Swap sizing/altitude rules, recomputing cached metrics if they changed.
    pub fn reconfigure(&mut self, sizing: SizingConfig, altitude: AltitudeConfig) {
        if sizing == self.sizing && altitude == self.altitude {
            return;
        }
        self.sizing = sizing;
        self.altitude = altitude;
        for (id, profile) in &self.profiles {
            self.metrics
                .insert(*id, derive_metrics(profile, &self.sizing, &self.altitude));
        }
    }

    pub fn profile(&self, id: BodyId) -> Option<&BodyProfile> {
        self.profiles.get(&id)
    }

    /// False for unknown bodies as well as those flagged unscannable.
    pub fn is_scannable(&self, id: BodyId) -> bool {
        self.profiles.get(&id).is_some_and(|profile| profile.scannable)
    }

    pub fn id_by_name(&self, name: &str) -> Option<BodyId> {
        self.names.get(name).copied()
    }

    pub fn metrics(&self, id: BodyId) -> Option<BodyMetrics> {
        self.metrics.get(&id).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.profiles.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Classify `altitude` (meters) against the body's scan window.
    pub fn altitude_status(&self, id: BodyId, altitude: f64) -> Option<AltitudeStatus> {
        let metrics = self.metrics(id)?;
        let status = if altitude < metrics.min_altitude {
            AltitudeStatus::TooLow
        } else if altitude > metrics.max_altitude {
            AltitudeStatus::TooHigh
        } else {
            AltitudeStatus::InRange
        };
        Some(status)
    }
}

/// Load the body catalog from `SURVEY_BODIES_PATH`, falling back to the
/// builtin catalog.
pub fn load_body_catalog_from_env(sizing: SizingConfig, altitude: AltitudeConfig) -> BodyCatalog {
    if let Ok(path) = env::var("SURVEY_BODIES_PATH").map(PathBuf::from) {
        match BodyCatalog::from_file(&path, sizing.clone(), altitude.clone()) {
            Ok(catalog) => {
                tracing::info!(
                    target: "orbital_survey::config",
                    path = %path.display(),
                    bodies = catalog.len(),
                    "body_catalog.loaded=file"
                );
                return catalog;
            }
            Err(err) => {
                tracing::warn!(
                    target: "orbital_survey::config",
                    path = %path.display(),
                    error = %err,
                    "body_catalog.load_failed"
                );
            }
        }
    }
    BodyCatalog::builtin(sizing, altitude)
}
