//! A prepared source-to-target weight operator.

use cube_common::{Coord, Cube};
use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;

use super::weights::CellWeights;
use super::GridSignature;
use crate::error::{GridProcessorError, Result};
use crate::types::RegridMethod;

/// Which horizontal dimension of the target an auxiliary coordinate spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HorizontalDim {
    Y,
    X,
}

/// Sparse regridding operator bound to one source grid, one target grid
/// and one method.
///
/// Built once with [`super::build_regridder`] and applied to any number of
/// cubes on the source grid, with any number of extra dimensions.
#[derive(Debug, Clone)]
pub struct Regridder {
    pub(crate) method: RegridMethod,
    pub(crate) mdtol: f64,
    pub(crate) source: GridSignature,
    pub(crate) target: GridSignature,
    /// One entry per target cell, row-major.
    pub(crate) weights: Vec<CellWeights>,
    pub(crate) target_y: Coord,
    pub(crate) target_x: Coord,
    pub(crate) target_aux: Vec<(Coord, Vec<HorizontalDim>)>,
}

impl Regridder {
    pub fn method(&self) -> RegridMethod {
        self.method
    }

    pub fn mdtol(&self) -> f64 {
        self.mdtol
    }

    pub fn source_signature(&self) -> &GridSignature {
        &self.source
    }

    pub fn target_signature(&self) -> &GridSignature {
        &self.target
    }

    /// Number of stored (target, source) weight pairs.
    pub fn weight_count(&self) -> usize {
        self.weights.iter().map(Vec::len).sum()
    }

    /// Number of target cells no source cell contributes to.
    pub fn unmapped_count(&self) -> usize {
        self.weights.iter().filter(|w| w.is_empty()).count()
    }

    /// Regrid `cube`, whose horizontal shape must equal the source grid's.
    pub fn apply(&self, cube: &Cube) -> Result<Cube> {
        let (y_dim, x_dim) = cube.horizontal_dims()?;
        let shape = cube.shape();
        let actual = [shape[y_dim], shape[x_dim]];
        if actual != self.source.shape {
            return Err(GridProcessorError::shape_mismatch(
                format!("horizontal grid of '{}'", cube.name),
                &self.source.shape,
                &actual,
            ));
        }

        // Move (y, x) to the end so every horizontal slice is contiguous.
        let mut perm: Vec<usize> = (0..cube.ndim()).filter(|&d| d != y_dim && d != x_dim).collect();
        perm.push(y_dim);
        perm.push(x_dim);
        let src: Vec<f32> = cube.data().view().permuted_axes(IxDyn(&perm)).iter().copied().collect();

        let n_src = actual[0] * actual[1];
        let [tny, tnx] = self.target.shape;
        let n_tgt = tny * tnx;
        let n_slices = if n_src == 0 { 0 } else { src.len() / n_src };

        let mut out = vec![f32::NAN; n_slices * n_tgt];
        if n_src > 0 && n_tgt > 0 {
            out.par_chunks_mut(n_tgt)
                .zip(src.par_chunks(n_src))
                .for_each(|(o, s)| self.apply_slice(s, o));
        }

        let mut out_shape: Vec<usize> = perm[..perm.len() - 2].iter().map(|&d| shape[d]).collect();
        out_shape.push(tny);
        out_shape.push(tnx);
        let permuted = ArrayD::from_shape_vec(IxDyn(&out_shape), out).map_err(|e| {
            GridProcessorError::invalid_parameter("data", format!("cannot shape regridded data: {}", e))
        })?;
        let mut inverse = vec![0; perm.len()];
        for (i, &d) in perm.iter().enumerate() {
            inverse[d] = i;
        }
        let data = permuted
            .permuted_axes(IxDyn(&inverse))
            .as_standard_layout()
            .into_owned();

        self.rebuild(cube, data, y_dim, x_dim)
    }

    fn apply_slice(&self, src: &[f32], out: &mut [f32]) {
        let mdtol = match self.method {
            RegridMethod::AreaWeighted => self.mdtol,
            RegridMethod::Linear | RegridMethod::Nearest => 0.0,
        };
        for (value, cell) in out.iter_mut().zip(&self.weights) {
            *value = weighted_mean(cell, src, mdtol);
        }
    }

    fn rebuild(&self, cube: &Cube, data: ArrayD<f32>, y_dim: usize, x_dim: usize) -> Result<Cube> {
        let mut out = Cube::new(cube.name.clone(), cube.units.clone(), data);
        out.attributes = cube.attributes.clone();

        for d in cube.dim_coords() {
            let coord = if d.dim == y_dim {
                self.target_y.clone()
            } else if d.dim == x_dim {
                self.target_x.clone()
            } else {
                d.coord.clone()
            };
            out = out.with_dim_coord(coord, d.dim)?;
        }
        for a in cube.aux_coords() {
            if a.dims.iter().any(|&d| d == y_dim || d == x_dim) {
                continue;
            }
            out = out.with_aux_coord(a.coord.clone(), &a.dims)?;
        }
        for (coord, dims) in &self.target_aux {
            let dims: Vec<usize> = dims
                .iter()
                .map(|h| match h {
                    HorizontalDim::Y => y_dim,
                    HorizontalDim::X => x_dim,
                })
                .collect();
            out = out.with_aux_coord(coord.clone(), &dims)?;
        }
        Ok(out)
    }
}

/// Weighted mean of the valid contributions, or NaN when nothing
/// contributes or the missing share of the total weight exceeds `mdtol`.
fn weighted_mean(cell: &[(usize, f64)], src: &[f32], mdtol: f64) -> f32 {
    let mut total = 0.0;
    let mut valid = 0.0;
    let mut sum = 0.0;
    for &(i, w) in cell {
        total += w;
        let v = src[i];
        if !v.is_nan() {
            valid += w;
            sum += w * v as f64;
        }
    }
    if total <= 0.0 || valid <= 0.0 || (total - valid) / total > mdtol {
        return f32::NAN;
    }
    (sum / valid) as f32
}
