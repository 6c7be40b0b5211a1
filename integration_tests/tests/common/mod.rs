#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use survey_core::{BodyId, GeoSample, SourceId, SourceObservation};

static INIT: Once = Once::new();

pub const KERBIN: BodyId = BodyId(1);
pub const MUN: BodyId = BodyId(2);

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_survey_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test survey config at {}",
            config_path.display()
        );

        std::env::set_var("SURVEY_CONFIG_PATH", &config_path);
    });
}

/// Equatorial orbit sweeping `degrees_per_second` of longitude.
pub fn equatorial_orbit(body: BodyId, degrees_per_second: f64) -> impl Fn(f64) -> Option<GeoSample> {
    move |ut| {
        Some(GeoSample {
            body,
            longitude: ut * degrees_per_second,
            latitude: 0.0,
        })
    }
}

pub fn observation(source: SourceId, position: GeoSample, ut: f64, radius: u32) -> SourceObservation {
    SourceObservation {
        source,
        position,
        ut,
        reveal: true,
        radius,
    }
}
