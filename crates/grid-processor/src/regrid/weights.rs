//! Spherical overlap-area weights between two rectilinear grids.
//!
//! A cell bounded by longitudes `[λ0, λ1]` and latitudes `[φ0, φ1]` covers
//! `R² · Δλ · (sin φ1 − sin φ0)` on the sphere, so the overlap of two cells
//! separates into a longitude term and a latitude term. Longitude overlaps
//! are taken modulo 360 degrees.

use ndarray::Array2;
use rayon::prelude::*;

/// Mean Earth radius used for cell areas (metres).
pub const EARTH_RADIUS: f64 = 6_371_229.0;

/// Sparse weights of one target cell: `(source flat index, weight)`.
pub type CellWeights = Vec<(usize, f64)>;

/// Overlap-area weights of every target cell.
///
/// Bounds are `(n, 2)` arrays in degrees. The result has one entry per
/// target cell in row-major `(y, x)` order; each entry lists the
/// overlapping source cells (row-major flat index) with their overlap area
/// on the unit sphere. Weights are not normalised.
pub fn area_weights(
    src_x_bounds: &Array2<f64>,
    src_y_bounds: &Array2<f64>,
    tgt_x_bounds: &Array2<f64>,
    tgt_y_bounds: &Array2<f64>,
) -> Vec<CellWeights> {
    area_weights_with(src_x_bounds, src_y_bounds, tgt_x_bounds, tgt_y_bounds, true)
}

/// [`area_weights`] with explicit control over rayon parallelism.
///
/// Every target cell accumulates its source cells in the same order either
/// way, so the result does not depend on `parallel`.
pub fn area_weights_with(
    src_x_bounds: &Array2<f64>,
    src_y_bounds: &Array2<f64>,
    tgt_x_bounds: &Array2<f64>,
    tgt_y_bounds: &Array2<f64>,
    parallel: bool,
) -> Vec<CellWeights> {
    let src_x = edges(src_x_bounds);
    let src_y: Vec<(f64, f64)> = edges(src_y_bounds).into_iter().map(clamp_lat).collect();
    let tgt_x = edges(tgt_x_bounds);
    let tgt_y: Vec<(f64, f64)> = edges(tgt_y_bounds).into_iter().map(clamp_lat).collect();
    let nsx = src_x.len();

    // Longitude overlaps only depend on the column pair.
    let x_overlaps: Vec<Vec<(usize, f64)>> = tgt_x
        .iter()
        .map(|&t| {
            src_x
                .iter()
                .enumerate()
                .filter_map(|(j, &s)| {
                    let o = lon_overlap(t, s);
                    (o > 0.0).then(|| (j, o.to_radians()))
                })
                .collect()
        })
        .collect();

    let row = |ty: &(f64, f64)| -> Vec<CellWeights> {
        let y_overlaps: Vec<(usize, f64)> = src_y
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| {
                let o = sin_lat_overlap(*ty, s);
                (o > 0.0).then_some((i, o))
            })
            .collect();
        x_overlaps
            .iter()
            .map(|xs| {
                let mut cell = Vec::with_capacity(y_overlaps.len() * xs.len());
                for &(i, wy) in &y_overlaps {
                    for &(j, wx) in xs {
                        cell.push((i * nsx + j, wx * wy));
                    }
                }
                cell
            })
            .collect()
    };

    let rows: Vec<Vec<CellWeights>> = if parallel {
        tgt_y.par_iter().map(row).collect()
    } else {
        tgt_y.iter().map(row).collect()
    };
    rows.into_iter().flatten().collect()
}

/// Area of every cell of a rectilinear grid in square metres, shaped
/// `(ny, nx)`.
pub fn cell_areas(x_bounds: &Array2<f64>, y_bounds: &Array2<f64>) -> Array2<f64> {
    let x = edges(x_bounds);
    let y: Vec<(f64, f64)> = edges(y_bounds).into_iter().map(clamp_lat).collect();
    Array2::from_shape_fn((y.len(), x.len()), |(i, j)| {
        let (lo, hi) = y[i];
        let dsin = hi.to_radians().sin() - lo.to_radians().sin();
        let dlon = (x[j].1 - x[j].0).min(360.0).to_radians();
        EARTH_RADIUS * EARTH_RADIUS * dlon * dsin
    })
}

fn edges(bounds: &Array2<f64>) -> Vec<(f64, f64)> {
    bounds
        .outer_iter()
        .map(|b| (b[0].min(b[1]), b[0].max(b[1])))
        .collect()
}

fn clamp_lat((lo, hi): (f64, f64)) -> (f64, f64) {
    (lo.clamp(-90.0, 90.0), hi.clamp(-90.0, 90.0))
}

/// Overlap in degrees of two longitude intervals on the circle.
fn lon_overlap(a: (f64, f64), b: (f64, f64)) -> f64 {
    let base = 360.0 * ((a.0 - b.0) / 360.0).round();
    [-360.0, 0.0, 360.0]
        .iter()
        .map(|k| {
            let lo = a.0.max(b.0 + base + k);
            let hi = a.1.min(b.1 + base + k);
            (hi - lo).max(0.0)
        })
        .sum()
}

fn sin_lat_overlap(a: (f64, f64), b: (f64, f64)) -> f64 {
    let lo = a.0.max(b.0);
    let hi = a.1.min(b.1);
    if hi <= lo {
        return 0.0;
    }
    hi.to_radians().sin() - lo.to_radians().sin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_lon_overlap_wraps() {
        assert_eq!(lon_overlap((0.0, 10.0), (5.0, 15.0)), 5.0);
        assert_eq!(lon_overlap((-5.0, 5.0), (355.0, 365.0)), 10.0);
        assert_eq!(lon_overlap((350.0, 370.0), (0.0, 5.0)), 5.0);
        assert_eq!(lon_overlap((0.0, 10.0), (20.0, 30.0)), 0.0);
    }

    #[test]
    fn test_identical_grids_map_one_to_one() {
        let xb = array![[0.0, 10.0], [10.0, 20.0]];
        let yb = array![[0.0, 5.0], [5.0, 10.0], [10.0, 15.0]];
        let weights = area_weights(&xb, &yb, &xb, &yb);
        assert_eq!(weights.len(), 6);
        for (t, cell) in weights.iter().enumerate() {
            assert_eq!(cell.len(), 1);
            assert_eq!(cell[0].0, t);
        }
    }

    #[test]
    fn test_coarse_target_collects_fine_cells() {
        let src_x = array![[0.0, 1.0], [1.0, 2.0]];
        let src_y = array![[0.0, 1.0], [1.0, 2.0]];
        let tgt_x = array![[0.0, 2.0]];
        let tgt_y = array![[0.0, 2.0]];
        let weights = area_weights(&src_x, &src_y, &tgt_x, &tgt_y);
        assert_eq!(weights.len(), 1);
        let sources: Vec<usize> = weights[0].iter().map(|w| w.0).collect();
        assert_eq!(sources, vec![0, 1, 2, 3]);

        // The four overlaps add up to the target cell's area.
        let total: f64 = weights[0].iter().map(|w| w.1).sum();
        let area = cell_areas(&tgt_x, &tgt_y)[[0, 0]] / (EARTH_RADIUS * EARTH_RADIUS);
        assert_approx_eq!(total, area, 1e-15);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let src_x = array![[0.0, 3.0], [3.0, 6.0], [6.0, 9.0]];
        let src_y = array![[-3.0, 0.0], [0.0, 3.0]];
        let tgt_x = array![[1.0, 5.0], [5.0, 8.0]];
        let tgt_y = array![[-2.0, 2.0]];
        assert_eq!(
            area_weights_with(&src_x, &src_y, &tgt_x, &tgt_y, true),
            area_weights_with(&src_x, &src_y, &tgt_x, &tgt_y, false)
        );
    }

    #[test]
    fn test_global_cell_areas_sum_to_sphere() {
        let x = Array2::from_shape_fn((36, 2), |(i, j)| (i + j) as f64 * 10.0);
        let y = Array2::from_shape_fn((18, 2), |(i, j)| -90.0 + (i + j) as f64 * 10.0);
        let total: f64 = cell_areas(&x, &y).sum();
        let sphere = 4.0 * std::f64::consts::PI * EARTH_RADIUS * EARTH_RADIUS;
        assert_approx_eq!(total / sphere, 1.0, 1e-12);
    }
}
