mod common;

use anyhow::Context;
use common::{ensure_test_config, observation, MUN};
use survey_core::{
    build_headless_app, coords::{lat_to_row, lon_to_col}, run_tick, submit_observation, GeoSample,
    RegistryError, ScanRegistry, SourceId, SurveyConfigHandle,
};

fn scan_mun(app: &mut bevy::app::App, longitude: f64, ut: f64) {
    let position = GeoSample {
        body: MUN,
        longitude,
        latitude: 0.0,
    };
    let fixed = move |_ut: f64| Some(position);
    submit_observation(&mut app.world, observation(SourceId(1), position, ut, 3), &fixed);
    run_tick(app);
}

#[test]
fn overlay_reveals_only_transmitted_snapshot() -> anyhow::Result<()> {
    ensure_test_config();
    let mut app = build_headless_app();
    let requires_transmit = app
        .world
        .resource::<SurveyConfigHandle>()
        .get()
        .rules
        .overlay_requires_transmit;
    assert!(requires_transmit);

    scan_mun(&mut app, 0.0, 0.0);

    let (first, second, ticket) = {
        let registry = app.world.resource::<ScanRegistry>();
        let grid = registry.get(MUN).context("Mun grid created")?;
        let row = lat_to_row(0.0, grid.height());
        let first = (lon_to_col(0.0, grid.width()), row);
        let second = (lon_to_col(90.0, grid.width()), row);
        assert!(grid.is_point_scanned(first.0, first.1));
        assert!(!grid.is_point_revealed(first.0, first.1, requires_transmit));
        assert!(grid.is_point_revealed(first.0, first.1, false));
        (first, second, registry.begin_transmission(MUN)?)
    };
    let offered = ticket.mits_offered;
    assert!(offered > 0.0);

    // scanned while the transmission is in flight
    scan_mun(&mut app, 90.0, 1.0);

    let mut registry = app.world.resource_mut::<ScanRegistry>();
    let credited = registry.complete_transmission(ticket, offered)?;
    assert_eq!(credited, offered);

    let grid = registry.get(MUN).context("Mun grid")?;
    assert!(grid.is_point_revealed(first.0, first.1, requires_transmit));
    assert!(grid.is_point_scanned(second.0, second.1));
    assert!(!grid.is_point_revealed(second.0, second.1, requires_transmit));
    assert_eq!(grid.mits_gleaned(), offered);
    assert!(grid.available_mits() >= 0.0);
    Ok(())
}

#[test]
fn dropped_ticket_changes_nothing() -> anyhow::Result<()> {
    ensure_test_config();
    let mut app = build_headless_app();
    scan_mun(&mut app, 30.0, 0.0);

    let registry = app.world.resource::<ScanRegistry>();
    let before = registry.get(MUN).context("Mun grid")?.clone();
    drop(registry.begin_transmission(MUN)?);

    let after = registry.get(MUN).context("Mun grid")?;
    assert_eq!(after.revealed(), before.revealed());
    assert_eq!(after.mits_gleaned(), before.mits_gleaned());
    Ok(())
}

#[test]
fn transmission_needs_a_scanned_body() {
    ensure_test_config();
    let app = build_headless_app();
    let registry = app.world.resource::<ScanRegistry>();
    assert_eq!(
        registry.begin_transmission(MUN).err(),
        Some(RegistryError::NoGrid(MUN))
    );
}
