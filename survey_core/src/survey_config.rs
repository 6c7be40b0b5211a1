//! Configuration for surveying: scan rules, queue scheduling, grid sizing and
//! the altitude window.
//!
//! Loaded from `survey_config.json` with support for an environment variable
//! override.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bevy::prelude::Resource;
use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_SURVEY_CONFIG: &str = include_str!("data/survey_config.json");

/// Root configuration for the survey engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    pub rules: ScanRulesConfig,
    pub scheduling: SchedulingConfig,
    pub sizing: SizingConfig,
    pub altitude: AltitudeConfig,
}

impl SurveyConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_SURVEY_CONFIG)
                .expect("builtin survey config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, SurveyConfigError> {
        let config: SurveyConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, SurveyConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| SurveyConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        SurveyConfig::from_json_str(&contents)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), SurveyConfigError> {
        let threshold = self.rules.auto_complete_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SurveyConfigError::Invalid {
                field: "rules.auto_complete_threshold",
                reason: format!("{threshold} is outside [0, 1]"),
            });
        }
        if self.scheduling.processing_load == 0 {
            return Err(SurveyConfigError::Invalid {
                field: "scheduling.processing_load",
                reason: "must drain at least one request per tick".to_string(),
            });
        }
        if !(self.scheduling.time_between_scans > 0.0) {
            return Err(SurveyConfigError::Invalid {
                field: "scheduling.time_between_scans",
                reason: format!("{} is not positive", self.scheduling.time_between_scans),
            });
        }
        if !(self.sizing.width_divisor_km > 0.0) || !(self.sizing.mits_divisor_km2 > 0.0) {
            return Err(SurveyConfigError::Invalid {
                field: "sizing",
                reason: "divisors must be positive".to_string(),
            });
        }
        if self.sizing.min_height == 0 || self.sizing.max_radius_divisor == 0 {
            return Err(SurveyConfigError::Invalid {
                field: "sizing",
                reason: "min_height and max_radius_divisor must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Rules applied when painting and reading coverage grids.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanRulesConfig {
    /// Overlays stay shrouded until scan data has been transmitted.
    pub overlay_requires_transmit: bool,
    /// Coverage fraction at which a body snaps to fully scanned.
    pub auto_complete_threshold: f64,
    /// Whether the host keeps reporting sources that are not loaded.
    /// Read by the host when it decides which sources to observe; the
    /// engine queues whatever it is given.
    pub background_scan: bool,
}

impl Default for ScanRulesConfig {
    fn default() -> Self {
        Self {
            overlay_requires_transmit: true,
            auto_complete_threshold: 0.95,
            background_scan: true,
        }
    }
}

/// Queue cadence and throughput.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Seconds of universal time between two scans from one source.
    pub time_between_scans: f64,
    pub retroactive_scanning: bool,
    /// Requests drained from the queue per tick.
    pub processing_load: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            time_between_scans: 3.0,
            retroactive_scanning: true,
            processing_load: 2,
        }
    }
}

/// Constants deriving grid size and mits budget from a body radius.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    pub width_divisor_km: f64,
    pub min_height: u32,
    pub mits_divisor_km2: f64,
    pub min_mits: u32,
    pub reserved_mits: u32,
    pub max_radius_divisor: u32,
    pub dedup_radius_divisor: u32,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            width_divisor_km: 25.0,
            min_height: 10,
            mits_divisor_km2: 50_000.0,
            min_mits: 5,
            reserved_mits: 1,
            max_radius_divisor: 7,
            dedup_radius_divisor: 4,
        }
    }
}

/// Altitude band inside which a source may scan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AltitudeConfig {
    pub min_factor: f64,
    pub min_absolute: f64,
    pub max_factor: f64,
    pub max_absolute: f64,
}

impl Default for AltitudeConfig {
    fn default() -> Self {
        Self {
            min_factor: 0.1,
            min_absolute: 25_000.0,
            max_factor: 5.0,
            max_absolute: 15_000_000.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum SurveyConfigError {
    #[error("failed to parse survey config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read survey config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid survey config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Handle for accessing the survey configuration.
#[derive(Resource, Debug, Clone)]
pub struct SurveyConfigHandle(pub Arc<SurveyConfig>);

impl SurveyConfigHandle {
    pub fn new(config: Arc<SurveyConfig>) -> Self {
        Self(config)
    }

    pub fn get(&self) -> Arc<SurveyConfig> {
        Arc::clone(&self.0)
    }

    pub fn replace(&mut self, config: Arc<SurveyConfig>) {
        self.0 = config;
    }
}

/// Where the active survey configuration came from.
#[derive(Resource, Debug, Clone)]
pub struct SurveyConfigMetadata {
    path: Option<PathBuf>,
}

impl SurveyConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Load survey configuration from `SURVEY_CONFIG_PATH` or the default path,
/// falling back to the builtin copy.
pub fn load_survey_config_from_env() -> (Arc<SurveyConfig>, SurveyConfigMetadata) {
    let override_path = env::var("SURVEY_CONFIG_PATH").ok().map(PathBuf::from);
    let path = override_path.unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/survey_config.json")
    });

    match SurveyConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "orbital_survey::config",
                path = %path.display(),
                "survey_config.loaded=file"
            );
            return (Arc::new(config), SurveyConfigMetadata::new(Some(path)));
        }
        Err(err) => {
            tracing::warn!(
                target: "orbital_survey::config",
                path = %path.display(),
                error = %err,
                "survey_config.load_failed"
            );
        }
    }

    let config = SurveyConfig::builtin();
    tracing::info!(
        target: "orbital_survey::config",
        "survey_config.loaded=builtin"
    );
    (config, SurveyConfigMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_matches_defaults() {
        let config = SurveyConfig::builtin();
        let defaults = SurveyConfig::default();
        assert_eq!(config.sizing, defaults.sizing);
        assert_eq!(config.altitude, defaults.altitude);
        assert_eq!(config.scheduling.processing_load, 2);
        assert!(config.rules.overlay_requires_transmit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = SurveyConfig::from_json_str(
            r#"{ "scheduling": { "processing_load": 8 }, "rules": { "auto_complete_threshold": 0.9, "background_scan": false } }"#,
        )
        .expect("partial config parses");
        assert_eq!(config.scheduling.processing_load, 8);
        assert!(!config.rules.background_scan);
        assert!(config.rules.overlay_requires_transmit);
        assert_eq!(config.scheduling.time_between_scans, 3.0);
        assert_eq!(config.rules.auto_complete_threshold, 0.9);
        assert_eq!(config.sizing.min_height, 10);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = SurveyConfig::from_json_str(r#"{ "rules": { "auto_complete_threshold": 1.5 } }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            SurveyConfigError::Invalid {
                field: "rules.auto_complete_threshold",
                ..
            }
        ));

        let err = SurveyConfig::from_json_str(r#"{ "scheduling": { "processing_load": 0 } }"#)
            .unwrap_err();
        assert!(matches!(err, SurveyConfigError::Invalid { .. }));

        let err = SurveyConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, SurveyConfigError::Parse(_)));
    }
}
