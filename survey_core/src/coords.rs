//! Longitude/latitude addressing for equirectangular coverage grids.
//!
//! Every grid row spans the full circle of longitude, so cells shrink in true
//! surface area toward the poles. [`cell_area`] gives the relative surface
//! weight of a row and [`mercator_scale`] the east-west stretch needed to keep
//! a footprint round on the body surface.
//!
//! Columns run east-to-west starting a quarter turn from the prime meridian;
//! this layout is shared with every previously saved grid and must not change.

use bevy::math::UVec2;

/// Map a longitude in degrees to a grid column in `[0, width)`.
pub fn lon_to_col(lon: f64, width: u32) -> u32 {
    let width = width.max(1);
    let shifted = (lon + 270.0).rem_euclid(360.0);
    let scale = 1.0 - shifted / 360.0;
    let col = (scale * width as f64).round() as i64;
    col.rem_euclid(width as i64) as u32
}

/// Inverse of [`lon_to_col`], exact up to the rounding of the forward mapping.
pub fn col_to_lon(col: u32, width: u32) -> f64 {
    let scale = col as f64 / width.max(1) as f64;
    clamp_longitude((1.0 - scale) * 360.0 - 270.0)
}

/// Map a latitude in degrees to a grid row in `[0, height]`.
///
/// The upper bound is inclusive: `+90°` lands one past the last row and is
/// folded back by [`wrap_index`].
pub fn lat_to_row(lat: f64, height: u32) -> u32 {
    let scale = (lat + 90.0) / 180.0;
    let row = (scale * height as f64).round();
    row.clamp(0.0, height as f64) as u32
}

/// Inverse of [`lat_to_row`].
pub fn row_to_lat(row: u32, height: u32) -> f64 {
    row as f64 / height.max(1) as f64 * 180.0 - 90.0
}

/// East-west stretch factor at `lat`. Diverges at the poles; callers must
/// special-case `|lat| >= 90`.
pub fn mercator_scale(lat: f64) -> f64 {
    1.0 / lat.to_radians().cos()
}

/// Relative surface weight of one cell in `row`: the reciprocal of
/// [`mercator_scale`] at the row latitude, 1 at the equator and approaching
/// 0 at the poles.
pub fn cell_area(row: u32, height: u32) -> f64 {
    row_to_lat(row, height).to_radians().cos().max(0.0)
}

/// Sum of [`cell_area`] over every cell of a `width x height` grid.
pub fn total_grid_area(width: u32, height: u32) -> f64 {
    let column: f64 = (0..height).map(|row| cell_area(row, height)).sum();
    column * width as f64
}

/// Normalize any longitude into `(-180, 180]`.
pub fn clamp_longitude(lon: f64) -> f64 {
    let lon = lon.rem_euclid(360.0);
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Normalize any latitude into `[-90, 90]`, folding values that run past a
/// pole back down the far side.
pub fn clamp_latitude(lat: f64) -> f64 {
    let lat = lat.rem_euclid(360.0);
    if lat <= 90.0 {
        lat
    } else if lat < 270.0 {
        180.0 - lat
    } else {
        lat - 360.0
    }
}

/// Resolve a possibly out-of-range cell offset to a real grid cell.
///
/// Columns wrap around the date line. A row past either pole is reflected
/// back into the grid (`-row` below, `2 * height - row - 1` above) and the
/// column moves half-way around the body, since a point "behind" the pole
/// lies on the opposite meridian. Returns `None` only if the row is still out
/// of range after a single reflection.
pub fn wrap_index(col: i64, row: i64, width: u32, height: u32) -> Option<UVec2> {
    if width == 0 || height == 0 {
        return None;
    }
    let w = width as i64;
    let h = height as i64;

    let mut col = col.rem_euclid(w);
    let mut row = row;
    if row < 0 {
        row = -row;
        col = (col + w / 2).rem_euclid(w);
    } else if row >= h {
        row = 2 * h - row - 1;
        col = (col + w / 2).rem_euclid(w);
    }

    if (0..h).contains(&row) {
        Some(UVec2::new(col as u32, row as u32))
    } else {
        None
    }
}

#[inline]
pub fn within_distance(x1: f64, y1: f64, x2: f64, y2: f64, dist: f64) -> bool {
    let dx = x2 - x1;
    let dy = y2 - y1;
    dx * dx + dy * dy <= dist * dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longitude_maps_onto_columns() {
        assert_eq!(lon_to_col(0.0, 20), 5);
        assert_eq!(lon_to_col(-90.0, 20), 10);
        assert_eq!(lon_to_col(180.0, 20), 15);
        // 90° lands exactly on `width` and wraps to column 0
        assert_eq!(lon_to_col(90.0, 20), 0);
        assert_eq!(lon_to_col(360.0, 20), lon_to_col(0.0, 20));
        assert_eq!(lon_to_col(-720.0, 20), lon_to_col(0.0, 20));
    }

    #[test]
    fn column_round_trip_is_within_one_cell() {
        let width = 300;
        for col in 0..width {
            let lon = col_to_lon(col, width);
            assert!(lon > -180.0 && lon <= 180.0);
            assert_eq!(lon_to_col(lon, width), col, "column {col} via {lon}");
        }
    }

    #[test]
    fn latitude_maps_onto_rows() {
        assert_eq!(lat_to_row(0.0, 10), 5);
        assert_eq!(lat_to_row(-90.0, 10), 0);
        assert_eq!(lat_to_row(90.0, 10), 10);
        assert_eq!(lat_to_row(-85.0, 10), 0);
        for row in 0..=10 {
            assert_eq!(lat_to_row(row_to_lat(row, 10), 10), row);
        }
    }

    #[test]
    fn area_model_peaks_at_equator() {
        assert!((cell_area(5, 10) - 1.0).abs() < 1e-12);
        assert!(cell_area(0, 10) < 1e-9);
        assert!((cell_area(4, 10) - cell_area(6, 10)).abs() < 1e-12);
        assert!((mercator_scale(60.0) - 2.0).abs() < 1e-9);

        let expected = 20.0 * (0..10).map(|row| cell_area(row, 10)).sum::<f64>();
        assert!((total_grid_area(20, 10) - expected).abs() < 1e-12);
    }

    #[test]
    fn clamps_normalize_into_canonical_ranges() {
        assert_eq!(clamp_longitude(190.0), -170.0);
        assert_eq!(clamp_longitude(-180.0), 180.0);
        assert_eq!(clamp_longitude(180.0), 180.0);
        assert_eq!(clamp_longitude(-540.0), 180.0);
        assert_eq!(clamp_latitude(45.0), 45.0);
        assert_eq!(clamp_latitude(100.0), 80.0);
        assert_eq!(clamp_latitude(-100.0), -80.0);
        assert_eq!(clamp_latitude(270.0), -90.0);
        assert_eq!(clamp_latitude(-90.0), -90.0);
    }

    #[test]
    fn wrap_index_handles_date_line_and_poles() {
        assert_eq!(wrap_index(-1, 3, 20, 10), Some(UVec2::new(19, 3)));
        assert_eq!(wrap_index(21, 3, 20, 10), Some(UVec2::new(1, 3)));
        // below the south pole: reflect and rotate half-way round
        assert_eq!(wrap_index(5, -1, 20, 10), Some(UVec2::new(15, 1)));
        assert_eq!(wrap_index(12, -2, 20, 10), Some(UVec2::new(2, 2)));
        // past the north pole
        assert_eq!(wrap_index(5, 10, 20, 10), Some(UVec2::new(15, 9)));
        assert_eq!(wrap_index(5, 11, 20, 10), Some(UVec2::new(15, 8)));
        // a second reflection is never attempted
        assert_eq!(wrap_index(0, -11, 20, 10), None);
        assert_eq!(wrap_index(0, 0, 0, 10), None);
    }
}
