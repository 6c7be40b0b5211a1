//! Per-body coverage grid.
//!
//! Tracks two layers for one celestial body:
//! - `scanned`: cells a source has sampled
//! - `revealed`: cells whose data has been transmitted home and may be shown
//!
//! Scan coverage is weighted by true surface area and maintained
//! incrementally as cells flip, so reading the percentage never walks the
//! grid.

use thiserror::Error;

use crate::{
    body::BodyId,
    cell_map::CellMap,
    coords::{cell_area, lat_to_row, lon_to_col, mercator_scale, total_grid_area, wrap_index},
    survey_config::SurveyConfig,
};

pub const DEFAULT_AUTO_COMPLETE_THRESHOLD: f64 = 0.95;
pub const DEFAULT_MAX_RADIUS_DIVISOR: u32 = 7;

/// Painting rules applied by [`CoverageGrid::update_scan_data`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanRules {
    /// Coverage at or above this snaps the body to fully scanned.
    pub auto_complete_threshold: f64,
    /// A footprint radius is capped at `width / max_radius_divisor` cells.
    pub max_radius_divisor: u32,
}

impl Default for ScanRules {
    fn default() -> Self {
        Self {
            auto_complete_threshold: DEFAULT_AUTO_COMPLETE_THRESHOLD,
            max_radius_divisor: DEFAULT_MAX_RADIUS_DIVISOR,
        }
    }
}

impl From<&SurveyConfig> for ScanRules {
    fn from(config: &SurveyConfig) -> Self {
        Self {
            auto_complete_threshold: config.rules.auto_complete_threshold,
            max_radius_divisor: config.sizing.max_radius_divisor,
        }
    }
}

/// Outcome of a single paint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanDelta {
    pub cells_changed: u32,
    pub percent_before: f64,
    pub percent_after: f64,
    pub auto_completed: bool,
}

impl ScanDelta {
    fn unchanged(percent: f64) -> Self {
        Self {
            cells_changed: 0,
            percent_before: percent,
            percent_after: percent,
            auto_completed: false,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CoverageError {
    #[error("map is {found_width}x{found_height}, grid is {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },
    #[error("transmission ticket for body {ticket} presented to body {grid}")]
    WrongBody { ticket: BodyId, grid: BodyId },
}

/// Scanned-map snapshot taken when a transmission starts.
///
/// Completing the transmission reveals exactly what was scanned at the time
/// it began, not anything scanned while it was in flight.
#[derive(Debug, Clone)]
pub struct TransmissionTicket {
    pub body: BodyId,
    pub mits_offered: f32,
    snapshot: CellMap,
}

impl TransmissionTicket {
    pub fn snapshot(&self) -> &CellMap {
        &self.snapshot
    }
}

/// Scan and reveal state for one body.
#[derive(Debug, Clone)]
pub struct CoverageGrid {
    body: BodyId,
    scanned: CellMap,
    revealed: CellMap,
    scanned_count: usize,
    scan_percent: f64,
    total_area: f64,
    total_mits: f32,
    mits_gleaned: f32,
    rules: ScanRules,
}

impl CoverageGrid {
    /// Create an unscanned grid. Zero dimensions are raised to one.
    pub fn new(body: BodyId, width: u32, height: u32, total_mits: f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            body,
            scanned: CellMap::new(width, height),
            revealed: CellMap::new(width, height),
            scanned_count: 0,
            scan_percent: 0.0,
            total_area: total_grid_area(width, height),
            total_mits: total_mits.max(0.0),
            mits_gleaned: 0.0,
            rules: ScanRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: ScanRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn set_rules(&mut self, rules: ScanRules) {
        self.rules = rules;
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.scanned.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.scanned.height()
    }

    pub fn scan_percent(&self) -> f64 {
        self.scan_percent
    }

    pub fn is_fully_scanned(&self) -> bool {
        self.scan_percent >= 1.0
    }

    pub fn total_mits(&self) -> f32 {
        self.total_mits
    }

    pub fn mits_gleaned(&self) -> f32 {
        self.mits_gleaned
    }

    /// Read-only view of the scanned layer.
    pub fn scanned(&self) -> &CellMap {
        &self.scanned
    }

    /// Read-only view of the revealed layer.
    pub fn revealed(&self) -> &CellMap {
        &self.revealed
    }

    /// Paint (or erase) a latitude-corrected elliptical footprint centred on
    /// `(lon, lat)`.
    ///
    /// The row half-axis is the clamped `radius`; the column half-axis is
    /// stretched by the Mercator factor of `lat` so the footprint keeps its
    /// surface width near the poles, capped at half the grid width.
    pub fn update_scan_data(&mut self, is_scanned: bool, lon: f64, lat: f64, radius: u32) -> ScanDelta {
        let percent_before = self.scan_percent;
        if !lon.is_finite() || !lat.is_finite() {
            tracing::warn!(
                target: "orbital_survey::coverage",
                body = self.body.0,
                lon,
                lat,
                "coverage.update.non_finite_position"
            );
            return ScanDelta::unchanged(percent_before);
        }

        let width = self.width();
        let height = self.height();
        let center_col = lon_to_col(lon, width) as i64;
        let center_row = lat_to_row(lat, height) as i64;

        let radius = radius.min(width / self.rules.max_radius_divisor.max(1));
        let semi_minor = radius as i64;
        let semi_major = semi_major_axis(radius, lat, width) as i64;

        let mut cells_changed = 0u32;
        for j in -semi_minor..=semi_minor {
            for i in -semi_major..=semi_major {
                if !inside_ellipse(i, j, semi_major, semi_minor) {
                    continue;
                }
                let (col, row) = (center_col + i, center_row + j);
                let Some(cell) = wrap_index(col, row, width, height) else {
                    tracing::error!(
                        target: "orbital_survey::coverage",
                        body = self.body.0,
                        width,
                        height,
                        col,
                        row,
                        "coverage.update.cell_out_of_range"
                    );
                    continue;
                };
                if self.apply_cell(cell.x, cell.y, is_scanned) {
                    cells_changed += 1;
                }
            }
        }

        let mut auto_completed = false;
        if cells_changed > 0
            && self.scan_percent < 1.0
            && self.scan_percent >= self.rules.auto_complete_threshold
        {
            tracing::info!(
                target: "orbital_survey::coverage",
                body = self.body.0,
                percent = self.scan_percent,
                threshold = self.rules.auto_complete_threshold,
                "coverage.auto_complete"
            );
            self.complete_scan();
            auto_completed = true;
        }

        tracing::trace!(
            target: "orbital_survey::coverage",
            body = self.body.0,
            center_col,
            center_row,
            semi_major,
            semi_minor,
            cells_changed,
            percent = self.scan_percent,
            "coverage.update"
        );

        ScanDelta {
            cells_changed,
            percent_before,
            percent_after: self.scan_percent,
            auto_completed,
        }
    }

    /// Flip one scanned cell, keeping the running percentage in step.
    fn apply_cell(&mut self, x: u32, y: u32, value: bool) -> bool {
        match self.scanned.set(x, y, value) {
            Some(previous) if previous != value => {
                let weight = cell_area(y, self.height()) / self.total_area;
                if value {
                    self.scanned_count += 1;
                    self.scan_percent += weight;
                } else {
                    self.scanned_count -= 1;
                    self.scan_percent -= weight;
                }
                self.settle_percent();
                true
            }
            Some(_) => false,
            None => {
                tracing::error!(
                    target: "orbital_survey::coverage",
                    body = self.body.0,
                    x,
                    y,
                    "coverage.update.cell_out_of_range"
                );
                false
            }
        }
    }

    /// Pin the percentage to its exact bounds when the count allows it and
    /// keep floating drift from reading as complete early.
    fn settle_percent(&mut self) {
        let total = self.scanned.cell_count();
        if self.scanned_count == total {
            self.scan_percent = 1.0;
        } else if self.scanned_count == 0 {
            self.scan_percent = 0.0;
        } else {
            self.scan_percent = self.scan_percent.clamp(0.0, 1.0 - f64::EPSILON);
        }
    }

    /// Mark every cell scanned.
    pub fn complete_scan(&mut self) {
        self.scanned.fill(true);
        self.scanned_count = self.scanned.cell_count();
        self.scan_percent = 1.0;
    }

    /// Recompute coverage from scratch. Does not auto-complete.
    pub fn recompute_scan_percent(&mut self) -> f64 {
        self.scanned_count = self.scanned.count_set();
        self.scan_percent = self.scanned.area_weighted_fraction();
        self.settle_percent();
        self.scan_percent
    }

    /// Mits that may be claimed right now.
    ///
    /// One mit stays in reserve until the body is fully scanned so completion
    /// always pays out something.
    pub fn available_mits(&self) -> f32 {
        if self.scan_percent == 1.0 {
            return self.total_mits - self.mits_gleaned;
        }
        (self.scan_percent * (self.total_mits as f64 - 1.0)) as f32 - self.mits_gleaned
    }

    /// Record claimed mits, clamped to the remaining budget. Returns the
    /// amount actually recorded.
    pub fn claim_mits(&mut self, mits: f32) -> f32 {
        let remaining = (self.total_mits - self.mits_gleaned).max(0.0);
        let claimed = if mits.is_finite() {
            mits.clamp(0.0, remaining)
        } else {
            0.0
        };
        if claimed >= remaining {
            self.mits_gleaned = self.total_mits;
        } else {
            self.mits_gleaned = (self.mits_gleaned + claimed).min(self.total_mits);
        }
        claimed
    }

    /// Restore a persisted gleaned value, clamped to `[0, total_mits]`.
    pub fn set_mits_gleaned(&mut self, mits: f32) {
        let clamped = if mits.is_finite() {
            mits.clamp(0.0, self.total_mits)
        } else {
            0.0
        };
        if clamped != mits {
            tracing::warn!(
                target: "orbital_survey::coverage",
                body = self.body.0,
                requested = mits,
                total = self.total_mits,
                "coverage.mits_gleaned.clamped"
            );
        }
        self.mits_gleaned = clamped;
    }

    pub fn is_point_scanned(&self, x: u32, y: u32) -> bool {
        self.scanned.get(x, y)
    }

    /// Whether a cell may be shown. Under `requires_transmit` only revealed
    /// cells count; otherwise anything scanned is shown.
    pub fn is_point_revealed(&self, x: u32, y: u32, requires_transmit: bool) -> bool {
        if requires_transmit {
            self.revealed.get(x, y)
        } else {
            self.scanned.get(x, y)
        }
    }

    /// Replace the scanned layer wholesale and recompute coverage.
    pub fn set_scanned_map(&mut self, map: CellMap) -> Result<(), CoverageError> {
        self.check_dimensions(&map)?;
        self.scanned = map;
        self.recompute_scan_percent();
        Ok(())
    }

    /// Replace the revealed layer wholesale.
    pub fn set_revealed_map(&mut self, map: CellMap) -> Result<(), CoverageError> {
        self.check_dimensions(&map)?;
        self.revealed = map;
        Ok(())
    }

    fn check_dimensions(&self, map: &CellMap) -> Result<(), CoverageError> {
        if map.same_dimensions(&self.scanned) {
            Ok(())
        } else {
            Err(CoverageError::DimensionMismatch {
                width: self.width(),
                height: self.height(),
                found_width: map.width(),
                found_height: map.height(),
            })
        }
    }

    /// Snapshot the scanned layer and the mits currently on offer.
    pub fn begin_transmission(&self) -> TransmissionTicket {
        TransmissionTicket {
            body: self.body,
            mits_offered: self.available_mits().max(0.0),
            snapshot: self.scanned.clone(),
        }
    }

    /// Apply a successful transmission: credit the mits received and reveal
    /// the snapshot. Returns the mits actually credited.
    pub fn complete_transmission(
        &mut self,
        ticket: TransmissionTicket,
        mits_received: f32,
    ) -> Result<f32, CoverageError> {
        if ticket.body != self.body {
            return Err(CoverageError::WrongBody {
                ticket: ticket.body,
                grid: self.body,
            });
        }
        self.check_dimensions(&ticket.snapshot)?;
        let credited = self.claim_mits(mits_received);
        self.revealed = ticket.snapshot;
        tracing::info!(
            target: "orbital_survey::coverage",
            body = self.body.0,
            credited,
            mits_gleaned = self.mits_gleaned,
            "coverage.transmission.completed"
        );
        Ok(credited)
    }
}

/// Column half-axis of a footprint at `lat`, in cells.
fn semi_major_axis(radius: u32, lat: f64, width: u32) -> u32 {
    let half_width = width / 2;
    if lat.abs() >= 90.0 {
        return half_width;
    }
    let stretched = (radius as f64 * mercator_scale(lat)).round();
    if stretched.is_finite() && stretched >= 0.0 {
        stretched.min(half_width as f64) as u32
    } else {
        half_width
    }
}

/// `i²/a² + j²/b² <= 1` in exact integer arithmetic. A zero axis admits only
/// the zero offset along it.
fn inside_ellipse(i: i64, j: i64, a: i64, b: i64) -> bool {
    match (a, b) {
        (0, 0) => i == 0 && j == 0,
        (0, _) => i == 0 && j.abs() <= b,
        (_, 0) => j == 0 && i.abs() <= a,
        _ => {
            let (i, j, a, b) = (i as i128, j as i128, a as i128, b as i128);
            i * i * b * b + j * j * a * a <= a * a * b * b
        }
    }
}
