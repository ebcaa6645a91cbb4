//! Extraction of a regular lat/lon box from a (possibly rotated) cube.
//!
//! The box perimeter is sampled in geographic coordinates and converted to
//! the cube's frame. The rotated latitude range is the min/max of the
//! samples; the rotated longitude range is the shortest arc covering every
//! sample, re-expressed near the centre of the cube's own x coordinate.
//! On a circular x axis a selection that runs off either end wraps into a
//! single run whose coordinate values are shifted by 360 degrees so they
//! stay monotonic.

use cube_common::{Coord, Cube, LatLonBox};
use tracing::debug;

use crate::error::{GridProcessorError, Result};
use crate::metadata::rotated_pole;

/// Samples per box edge when mapping the box into the cube frame.
const PERIMETER_SAMPLES: usize = 33;

/// Extract the cells of `cube` covering a regular lat/lon box.
///
/// `lon_bounds.0 > lon_bounds.1` selects a box crossing the antimeridian.
pub fn extract_rotated_subset(
    cube: &Cube,
    lat_bounds: (f64, f64),
    lon_bounds: (f64, f64),
) -> Result<Cube> {
    let bbox = LatLonBox::new(lat_bounds, lon_bounds)?;
    extract_box(cube, &bbox)
}

/// [`extract_rotated_subset`] taking a [`LatLonBox`].
pub fn extract_box(cube: &Cube, bbox: &LatLonBox) -> Result<Cube> {
    let cs = cube.coord_system().ok_or_else(|| {
        GridProcessorError::NotRotated(format!(
            "'{}' has no coordinate system to extract a lat/lon box from",
            cube.name
        ))
    })?;
    let pole = rotated_pole(&cs)?;
    let (y, x) = cube.horizontal_coords()?;
    let (y_dim, x_dim) = cube.horizontal_dims()?;

    let samples: Vec<(f64, f64)> = bbox
        .perimeter(PERIMETER_SAMPLES)
        .into_iter()
        .map(|(lat, lon)| pole.to_rotated(lat, lon))
        .collect();

    let mut rlat_min = samples.iter().map(|s| s.0).fold(f64::INFINITY, f64::min);
    let mut rlat_max = samples.iter().map(|s| s.0).fold(f64::NEG_INFINITY, f64::max);

    // A box containing a rotated pole wraps all the way round it.
    let (plat, plon, _) = cs.pole();
    let contains_north = bbox.contains_point(plat, plon);
    let contains_south = bbox.contains_point(-plat, plon + 180.0);
    if contains_north {
        rlat_max = 90.0;
    }
    if contains_south {
        rlat_min = -90.0;
    }
    let lon_arc = if contains_north || contains_south {
        None
    } else {
        covering_arc(samples.iter().map(|s| s.1).collect())
    };

    let y_edges = cell_edges(y)?;
    let y_indices: Vec<usize> = y_edges
        .iter()
        .enumerate()
        .filter(|&(_, &(lo, hi))| intervals_overlap(lo, hi, rlat_min, rlat_max))
        .map(|(i, _)| i)
        .collect();

    let x_points = x.values();
    let x_edges = cell_edges(x)?;
    let selected: Vec<(usize, f64)> = match lon_arc {
        None => (0..x_points.len()).map(|i| (i, 0.0)).collect(),
        Some((start, extent)) => {
            let centre = 0.5 * (x_points[0] + x_points[x_points.len() - 1]);
            let mid = start + 0.5 * extent;
            let a = start + 360.0 * ((centre - mid) / 360.0).round();
            let b = a + extent;
            x_edges
                .iter()
                .enumerate()
                .filter_map(|(i, &(lo, hi))| {
                    [0.0, -360.0, 360.0]
                        .into_iter()
                        .find(|s| intervals_overlap(lo + s, hi + s, a, b))
                        .map(|s| (i, s))
                })
                .collect()
        }
    };

    if y_indices.is_empty() || selected.is_empty() {
        return Err(GridProcessorError::out_of_bounds(
            format!(
                "lat ({}, {}) lon ({}, {})",
                bbox.lat_min, bbox.lat_max, bbox.lon_min, bbox.lon_max
            ),
            format!(
                "{} [{}, {}] x {} [{}, {}] on {}",
                y.name,
                y_edges.first().map_or(f64::NAN, |e| e.0),
                y_edges.last().map_or(f64::NAN, |e| e.1),
                x.name,
                x_edges.first().map_or(f64::NAN, |e| e.0),
                x_edges.last().map_or(f64::NAN, |e| e.1),
                cs
            ),
        ));
    }

    let x_name = x.name.clone();
    let subset = cube.subset(y_dim, &y_indices)?;

    if !x.is_circular() {
        let x_indices: Vec<usize> = selected.iter().map(|&(i, _)| i).collect();
        debug!(rows = y_indices.len(), cols = x_indices.len(), "Extracted box");
        return Ok(subset.subset(x_dim, &x_indices)?);
    }

    // Order the wrapped run along the axis direction and unwrap its values.
    let increasing = x_points.len() < 2 || x_points[1] > x_points[0];
    let mut ordered = selected;
    ordered.sort_by(|p, q| {
        let vp = x_points[p.0] + p.1;
        let vq = x_points[q.0] + q.1;
        if increasing {
            vp.total_cmp(&vq)
        } else {
            vq.total_cmp(&vp)
        }
    });
    let x_indices: Vec<usize> = ordered.iter().map(|&(i, _)| i).collect();
    let shifts: Vec<f64> = ordered.iter().map(|&(_, s)| s).collect();

    let subset = subset.subset(x_dim, &x_indices)?;
    let unwrapped = shift_coord(subset.coord(&x_name)?, &shifts);
    debug!(rows = y_indices.len(), cols = x_indices.len(), "Extracted wrapped box");
    Ok(subset.replace_coord(unwrapped)?)
}

/// Shortest arc `(start, extent)` covering every longitude, or `None` when
/// the samples go all the way round.
fn covering_arc(lons: Vec<f64>) -> Option<(f64, f64)> {
    let mut lons: Vec<f64> = lons
        .into_iter()
        .map(projection::normalize_longitude)
        .collect();
    lons.sort_by(f64::total_cmp);
    let n = lons.len();
    if n == 0 {
        return None;
    }

    let mut widest = (0, lons[0] + 360.0 - lons[n - 1]);
    for i in 0..n - 1 {
        let gap = lons[i + 1] - lons[i];
        if gap > widest.1 {
            widest = (i + 1, gap);
        }
    }
    let (start_index, gap) = widest;
    if gap <= f64::EPSILON {
        return None;
    }
    Some((lons[start_index % n], 360.0 - gap))
}

/// Lower and upper edge of every cell, from bounds or half the spacing.
fn cell_edges(coord: &Coord) -> Result<Vec<(f64, f64)>> {
    let bounds = match &coord.bounds {
        Some(b) => b.clone(),
        None if coord.len() >= 2 => coord.guess_bounds(0.5)?,
        None => {
            let v = coord.values();
            return Ok(v.into_iter().map(|p| (p, p)).collect());
        }
    };
    Ok(bounds
        .outer_iter()
        .map(|row| (row[0].min(row[1]), row[0].max(row[1])))
        .collect())
}

fn intervals_overlap(lo: f64, hi: f64, a: f64, b: f64) -> bool {
    if a == b || lo == hi {
        lo <= b && a <= hi
    } else {
        lo.max(a) < hi.min(b)
    }
}

fn shift_coord(coord: &Coord, shifts: &[f64]) -> Coord {
    let mut coord = coord.clone();
    for (p, s) in coord.points.iter_mut().zip(shifts) {
        *p += s;
    }
    if let Some(bounds) = coord.bounds.as_mut() {
        for (mut row, s) in bounds.outer_iter_mut().zip(shifts) {
            row += *s;
        }
    }
    coord
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use test_utils::{axis_points, regular_cube, rotated_cube};

    #[test]
    fn test_covering_arc() {
        let (start, extent) = covering_arc(vec![170.0, 175.0, -175.0, -170.0]).unwrap();
        assert_eq!(start, 170.0);
        assert_eq!(extent, 20.0);

        let (start, extent) = covering_arc(vec![-10.0, 0.0, 10.0]).unwrap();
        assert_eq!((start, extent), (-10.0, 20.0));

        let all: Vec<f64> = (0..360).map(|d| d as f64).collect();
        let (_, extent) = covering_arc(all).unwrap();
        assert_eq!(extent, 359.0);
    }

    #[test]
    fn test_intervals_overlap() {
        assert!(intervals_overlap(0.0, 1.0, 0.5, 2.0));
        assert!(!intervals_overlap(0.0, 1.0, 1.0, 2.0));
        assert!(intervals_overlap(0.0, 1.0, 1.0, 1.0));
        assert!(!intervals_overlap(0.0, 1.0, 1.5, 1.5));
    }

    #[test]
    fn test_extract_regular_box() {
        let cube = regular_cube(axis_points(-10.0, 1.0, 21), axis_points(-20.0, 1.0, 41));
        let out = extract_rotated_subset(&cube, (-2.5, 2.5), (-4.5, 4.5)).unwrap();
        assert_eq!(out.coord("latitude").unwrap().values(), axis_points(-2.0, 1.0, 5));
        assert_eq!(out.coord("longitude").unwrap().values(), axis_points(-4.0, 1.0, 9));
    }

    #[test]
    fn test_extract_wraps_circular_grid() {
        let cube = regular_cube(axis_points(-10.0, 1.0, 21), axis_points(0.0, 5.0, 72));
        let out = extract_rotated_subset(&cube, (-2.5, 2.5), (-12.0, 12.0)).unwrap();
        assert_eq!(
            out.coord("longitude").unwrap().values(),
            vec![-10.0, -5.0, 0.0, 5.0, 10.0]
        );
        // Columns 70, 71, 0, 1, 2 of source row 8 (latitude -2).
        let first_row: Vec<f32> = (0..5).map(|c| out.data()[IxDyn(&[0, c])]).collect();
        assert_eq!(first_row, vec![8070.0, 8071.0, 8000.0, 8001.0, 8002.0]);
    }

    #[test]
    fn test_extract_antimeridian_box() {
        let cube = regular_cube(axis_points(-10.0, 1.0, 21), axis_points(0.0, 5.0, 72));
        let out = extract_rotated_subset(&cube, (0.0, 0.0), (172.0, -172.0)).unwrap();
        assert_eq!(
            out.coord("longitude").unwrap().values(),
            vec![170.0, 175.0, 180.0, 185.0, 190.0]
        );
    }

    #[test]
    fn test_extract_rotated_around_grid_origin() {
        let cube = rotated_cube(axis_points(-5.0, 0.5, 21), axis_points(-5.0, 0.5, 21), 37.5, 177.5);
        // Rotated (0, 0) is geographic (-52.5, 177.5).
        let out = extract_rotated_subset(&cube, (-53.0, -52.0), (177.0, 178.0)).unwrap();
        let rlat = out.coord("grid_latitude").unwrap().values();
        let rlon = out.coord("grid_longitude").unwrap().values();
        assert!(rlat.contains(&0.0));
        assert!(rlon.contains(&0.0));
        assert!(rlat.len() < 21 && rlon.len() < 21);
    }

    #[test]
    fn test_extract_out_of_bounds() {
        let cube = rotated_cube(axis_points(-5.0, 0.5, 21), axis_points(-5.0, 0.5, 21), 37.5, 177.5);
        let err = extract_rotated_subset(&cube, (40.0, 50.0), (0.0, 10.0)).unwrap_err();
        match err {
            GridProcessorError::OutOfBounds { requested, grid } => {
                assert!(requested.contains("40"));
                assert!(grid.contains("grid_latitude"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_extract_needs_coord_system() {
        let mut cube = regular_cube(axis_points(0.0, 1.0, 3), axis_points(0.0, 1.0, 3));
        for name in ["latitude", "longitude"] {
            let mut coord = cube.coord(name).unwrap().clone();
            coord.coord_system = None;
            cube = cube.replace_coord(coord).unwrap();
        }
        assert!(matches!(
            extract_rotated_subset(&cube, (0.0, 1.0), (0.0, 1.0)),
            Err(GridProcessorError::NotRotated(_))
        ));
    }
}
