//! Regridding between horizontal grids.
//!
//! A [`Regridder`] is built once for a (source grid, target grid, method)
//! triple and then applied to any number of cubes on the source grid.
//!
//! - **Area-weighted**: each target cell is the overlap-area weighted mean
//!   of the source cells it intersects (see [`area_weights`]). Both grids
//!   must share a coordinate system; missing bounds are guessed.
//! - **Linear / nearest**: target cell centres are located in the source
//!   grid. Grids on different coordinate systems are related through the
//!   rotated-pole transform.
//!
//! Construction is the expensive part. Callers regridding many cubes on
//! the same grid pair should reuse one regridder, e.g. through a
//! [`crate::RegridderCache`].

mod interpolation;
mod regridder;
mod weights;

pub use regridder::Regridder;
pub use weights::{area_weights, area_weights_with, cell_areas, CellWeights, EARTH_RADIUS};

use cube_common::{Coord, CoordSystem, Cube};
use ndarray::Array2;
use rayon::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{info, warn};

use crate::config::ProcessorConfig;
use crate::error::{GridProcessorError, Result};
use crate::metadata::rotated_pole;
use crate::types::{ExtrapolationMode, RegridMethod};
use interpolation::AxisLocator;
use regridder::HorizontalDim;

/// Options controlling regridder construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegridOptions {
    pub method: RegridMethod,
    /// Missing-data tolerance, area-weighted only.
    pub mdtol: f64,
    pub extrapolation: ExtrapolationMode,
    /// Build weights on the rayon thread pool.
    pub parallel: bool,
}

impl Default for RegridOptions {
    fn default() -> Self {
        ProcessorConfig::default().regrid_options()
    }
}

/// Identity of a horizontal grid: its shape plus a hash of the horizontal
/// coordinate names, units, points, bounds and coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridSignature {
    /// `[ny, nx]`
    pub shape: [usize; 2],
    pub fingerprint: u64,
}

impl GridSignature {
    pub fn of(cube: &Cube) -> Result<Self> {
        let (y, x) = cube.horizontal_coords()?;
        let mut hasher = DefaultHasher::new();
        for coord in [y, x] {
            coord.name.hash(&mut hasher);
            coord.units.hash(&mut hasher);
            for v in coord.points.iter() {
                v.to_bits().hash(&mut hasher);
            }
            if let Some(bounds) = &coord.bounds {
                for v in bounds.iter() {
                    v.to_bits().hash(&mut hasher);
                }
            }
        }
        match cube.coord_system() {
            None => 0u8.hash(&mut hasher),
            Some(cs) => {
                let (lat, lon, central) = cs.pole();
                (1u8, cs.is_rotated()).hash(&mut hasher);
                for v in [lat, lon, central] {
                    v.to_bits().hash(&mut hasher);
                }
            }
        }
        Ok(Self {
            shape: [y.len(), x.len()],
            fingerprint: hasher.finish(),
        })
    }
}

/// Build a regridder from `source`'s horizontal grid to `target`'s.
pub fn build_regridder(
    source: &Cube,
    target: &Cube,
    method: RegridMethod,
    mdtol: f64,
) -> Result<Regridder> {
    let options = RegridOptions {
        method,
        mdtol,
        ..RegridOptions::default()
    };
    build_regridder_with(source, target, &options)
}

/// [`build_regridder`] with full options.
pub fn build_regridder_with(source: &Cube, target: &Cube, options: &RegridOptions) -> Result<Regridder> {
    if !(0.0..=1.0).contains(&options.mdtol) {
        return Err(GridProcessorError::invalid_parameter(
            "mdtol",
            format!("{} is outside [0, 1]", options.mdtol),
        ));
    }
    let source_sig = GridSignature::of(source)?;
    let target_sig = GridSignature::of(target)?;
    let (ty, tx) = target.horizontal_coords()?;

    let weights = match options.method {
        RegridMethod::AreaWeighted => area_weighted_weights(source, target, options.parallel)?,
        RegridMethod::Linear | RegridMethod::Nearest => point_weights(source, target, options)?,
    };

    let unmapped = weights.iter().filter(|w| w.is_empty()).count();
    if unmapped > 0 && options.extrapolation == ExtrapolationMode::Error {
        return Err(GridProcessorError::Extrapolation(format!(
            "{} of {} target cells of '{}' lie outside the source grid of '{}'",
            unmapped,
            weights.len(),
            target.name,
            source.name
        )));
    }

    let (ty_dim, tx_dim) = target.horizontal_dims()?;
    let target_aux = target
        .aux_coords()
        .iter()
        .filter(|a| !a.dims.is_empty() && a.dims.iter().all(|&d| d == ty_dim || d == tx_dim))
        .map(|a| {
            let dims = a
                .dims
                .iter()
                .map(|&d| if d == ty_dim { HorizontalDim::Y } else { HorizontalDim::X })
                .collect();
            (a.coord.clone(), dims)
        })
        .collect();

    let regridder = Regridder {
        method: options.method,
        mdtol: options.mdtol,
        source: source_sig,
        target: target_sig,
        weights,
        target_y: ty.clone(),
        target_x: tx.clone(),
        target_aux,
    };
    info!(
        method = %options.method,
        source = ?source_sig.shape,
        target = ?target_sig.shape,
        weights = regridder.weight_count(),
        unmapped,
        "Built regridder"
    );
    Ok(regridder)
}

/// Build a one-off regridder and apply it to `cube`.
pub fn regrid_to_target(cube: &Cube, target: &Cube, method: RegridMethod, mdtol: f64) -> Result<Cube> {
    build_regridder(cube, target, method, mdtol)?.apply(cube)
}

fn describe(cs: Option<CoordSystem>) -> String {
    cs.map_or_else(|| "no coordinate system".to_string(), |cs| cs.to_string())
}

fn bounds_for(coord: &Coord) -> Result<Array2<f64>> {
    if let Some(bounds) = &coord.bounds {
        return Ok(bounds.clone());
    }
    warn!(coord = %coord.name, "Guessing bounds for area-weighted regridding");
    Ok(coord.guess_bounds(0.5)?)
}

fn area_weighted_weights(source: &Cube, target: &Cube, parallel: bool) -> Result<Vec<CellWeights>> {
    let (src_cs, tgt_cs) = (source.coord_system(), target.coord_system());
    if src_cs != tgt_cs {
        return Err(GridProcessorError::IncompatibleCoordSystem(format!(
            "area-weighted regridding needs one coordinate system, source has {}, target has {}",
            describe(src_cs),
            describe(tgt_cs)
        )));
    }
    let (sy, sx) = source.horizontal_coords()?;
    let (ty, tx) = target.horizontal_coords()?;
    Ok(area_weights_with(
        &bounds_for(sx)?,
        &bounds_for(sy)?,
        &bounds_for(tx)?,
        &bounds_for(ty)?,
        parallel,
    ))
}

fn point_weights(source: &Cube, target: &Cube, options: &RegridOptions) -> Result<Vec<CellWeights>> {
    let (src_cs, tgt_cs) = (source.coord_system(), target.coord_system());
    let transform = match (src_cs, tgt_cs) {
        (a, b) if a == b => None,
        (Some(src), Some(tgt)) => Some((rotated_pole(&tgt)?, rotated_pole(&src)?)),
        (a, b) => {
            return Err(GridProcessorError::IncompatibleCoordSystem(format!(
                "cannot relate source with {} to target with {}",
                describe(a),
                describe(b)
            )))
        }
    };

    let (sy, sx) = source.horizontal_coords()?;
    let (ty, tx) = target.horizontal_coords()?;
    let y_axis = AxisLocator::new(&sy.values(), false, false);
    let x_axis = AxisLocator::new(&sx.values(), sx.units.starts_with("degree"), sx.is_circular());
    let nsx = sx.len();
    let tgt_x = tx.values();
    let method = options.method;

    let row = |&t_lat: &f64| -> Vec<CellWeights> {
        tgt_x
            .iter()
            .map(|&t_lon| {
                let (lat, lon) = match &transform {
                    Some((tgt, src)) => {
                        let (lat, lon) = tgt.to_regular(t_lat, t_lon);
                        src.to_rotated(lat, lon)
                    }
                    None => (t_lat, t_lon),
                };
                locate(method, &y_axis, &x_axis, lat, lon, nsx)
            })
            .collect()
    };

    let tgt_y = ty.values();
    let rows: Vec<Vec<CellWeights>> = if options.parallel {
        tgt_y.par_iter().map(row).collect()
    } else {
        tgt_y.iter().map(row).collect()
    };
    Ok(rows.into_iter().flatten().collect())
}

fn locate(
    method: RegridMethod,
    y_axis: &AxisLocator,
    x_axis: &AxisLocator,
    y: f64,
    x: f64,
    nsx: usize,
) -> CellWeights {
    match method {
        RegridMethod::Nearest => match (y_axis.nearest(y), x_axis.nearest(x)) {
            (Some(i), Some(j)) => vec![(i * nsx + j, 1.0)],
            _ => Vec::new(),
        },
        _ => match (y_axis.linear(y), x_axis.linear(x)) {
            (Some(ys), Some(xs)) => {
                let mut cell = Vec::with_capacity(4);
                for &(i, wy) in &ys {
                    for &(j, wx) in &xs {
                        let w = wy * wx;
                        if w > 0.0 {
                            cell.push((i * nsx + j, w));
                        }
                    }
                }
                cell
            }
            _ => Vec::new(),
        },
    }
}
