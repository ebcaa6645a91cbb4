//! The cube: an N-dimensional data array described by named coordinates.
//!
//! A [`Cube`] owns an `f32` data array (missing data is `NaN`), dimension
//! coordinates bound to exactly one data dimension each, auxiliary
//! coordinates bound to any number of data dimensions, and a string
//! attribute map. Shape invariants are checked whenever a coordinate is
//! attached, so every operation downstream can index coordinates and data
//! together without re-checking.
//!
//! Cubes are values: every transforming method consumes or borrows `self`
//! and returns a new cube.

use ndarray::{Array1, Array2, ArrayD, Axis as ArrayAxis, IxDyn};
use std::collections::BTreeMap;
use std::fmt;

use crate::crs::{Axis, CoordSystem};
use crate::error::{CubeError, CubeResult};
use crate::time::{Calendar, DateRange, ModelDateTime, TimeUnits};

/// A named coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Coord {
    pub name: String,
    pub axis: Option<Axis>,
    pub points: ArrayD<f64>,
    /// `(n, 2)` cell bounds, only for 1-D coordinates.
    pub bounds: Option<Array2<f64>>,
    pub units: String,
    pub coord_system: Option<CoordSystem>,
    pub calendar: Option<Calendar>,
}

impl Coord {
    /// Create a 1-D coordinate. The axis is guessed from the name.
    pub fn new(name: impl Into<String>, points: Vec<f64>, units: impl Into<String>) -> Self {
        Self::from_array(name, Array1::from(points).into_dyn(), units)
    }

    /// Create a coordinate of any dimensionality.
    pub fn from_array(name: impl Into<String>, points: ArrayD<f64>, units: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            axis: Axis::guess(&name),
            name,
            points,
            bounds: None,
            units: units.into(),
            coord_system: None,
            calendar: None,
        }
    }

    /// Single-valued coordinate.
    pub fn scalar(name: impl Into<String>, value: f64, units: impl Into<String>) -> Self {
        Self::new(name, vec![value], units)
    }

    /// Attach `(n, 2)` bounds to a 1-D coordinate.
    pub fn with_bounds(mut self, bounds: Array2<f64>) -> CubeResult<Self> {
        if self.points.ndim() != 1 {
            return Err(CubeError::invalid_parameter(
                "bounds",
                format!("'{}' is {}-D, bounds need a 1-D coordinate", self.name, self.points.ndim()),
            ));
        }
        let expected = [self.len(), 2];
        if bounds.shape() != expected.as_slice() {
            return Err(CubeError::shape_mismatch(
                format!("bounds of '{}'", self.name),
                &expected,
                bounds.shape(),
            ));
        }
        self.check_bounds(&bounds)?;
        self.bounds = Some(bounds);
        Ok(self)
    }

    /// Bounds must be finite, contain their point, run in one direction and
    /// leave no gaps or overlaps between neighbouring cells.
    fn check_bounds(&self, bounds: &Array2<f64>) -> CubeResult<()> {
        let points = self.values();
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0);

        for (i, row) in bounds.outer_iter().enumerate() {
            let (lo, hi) = (row[0], row[1]);
            if !lo.is_finite() || !hi.is_finite() {
                return Err(CubeError::ambiguous_bounds(
                    &self.name,
                    format!("cell {} has non-finite bounds [{}, {}]", i, lo, hi),
                ));
            }
            let (p, min, max) = (points[i], lo.min(hi), lo.max(hi));
            if (p < min && !close(p, min)) || (p > max && !close(p, max)) {
                return Err(CubeError::ambiguous_bounds(
                    &self.name,
                    format!("cell {} bounds [{}, {}] do not contain point {}", i, lo, hi, p),
                ));
            }
        }

        let n = points.len();
        if n < 2 {
            return Ok(());
        }
        let direction = (bounds[[n - 1, 1]] - bounds[[0, 0]]).signum();
        for i in 0..n {
            if (bounds[[i, 1]] - bounds[[i, 0]]) * direction < 0.0 {
                return Err(CubeError::ambiguous_bounds(
                    &self.name,
                    format!("cell {} bounds run against the other cells", i),
                ));
            }
        }
        for i in 0..n - 1 {
            let (upper, next_lower) = (bounds[[i, 1]], bounds[[i + 1, 0]]);
            if !close(upper, next_lower) {
                return Err(CubeError::ambiguous_bounds(
                    &self.name,
                    format!(
                        "cells {} and {} are not contiguous ({} vs {})",
                        i,
                        i + 1,
                        upper,
                        next_lower
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = Some(axis);
        self
    }

    pub fn with_coord_system(mut self, coord_system: CoordSystem) -> Self {
        self.coord_system = Some(coord_system);
        self
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn shape(&self) -> &[usize] {
        self.points.shape()
    }

    pub fn ndim(&self) -> usize {
        self.points.ndim()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn has_bounds(&self) -> bool {
        self.bounds.is_some()
    }

    /// Points in logical (row-major) order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().copied().collect()
    }

    /// Bounds, or a [`CubeError::MissingBounds`] error.
    pub fn bounds_or_err(&self) -> CubeResult<&Array2<f64>> {
        self.bounds.as_ref().ok_or_else(|| CubeError::MissingBounds {
            coord: self.name.clone(),
        })
    }

    /// Strictly increasing or strictly decreasing 1-D points.
    pub fn is_monotonic(&self) -> bool {
        if self.ndim() != 1 {
            return false;
        }
        let values = self.values();
        let increasing = values.windows(2).all(|w| w[1] > w[0]);
        let decreasing = values.windows(2).all(|w| w[1] < w[0]);
        increasing || decreasing
    }

    /// Whether a 1-D longitude-like coordinate covers the full circle, i.e.
    /// its span plus one step is 360 degrees.
    pub fn is_circular(&self) -> bool {
        if self.ndim() != 1 || self.len() < 2 || !self.units.starts_with("degree") {
            return false;
        }
        let values = self.values();
        let n = values.len();
        let step = (values[n - 1] - values[0]) / (n - 1) as f64;
        ((values[n - 1] - values[0]).abs() + step.abs() - 360.0).abs() < 1e-6 * 360.0
    }

    /// Guess contiguous bounds from point spacing.
    ///
    /// `bound_position` is the fraction of each gap that falls below a
    /// point (0.5 puts bounds halfway between neighbours). The outermost
    /// bounds reuse the neighbouring spacing.
    pub fn guess_bounds(&self, bound_position: f64) -> CubeResult<Array2<f64>> {
        if self.ndim() != 1 {
            return Err(CubeError::ambiguous_bounds(
                &self.name,
                format!("coordinate is {}-D", self.ndim()),
            ));
        }
        if self.len() < 2 {
            return Err(CubeError::ambiguous_bounds(
                &self.name,
                "at least two points are needed",
            ));
        }
        if !self.is_monotonic() {
            return Err(CubeError::ambiguous_bounds(
                &self.name,
                "point spacing is not monotonic",
            ));
        }
        if !(0.0..=1.0).contains(&bound_position) {
            return Err(CubeError::invalid_parameter(
                "bound_position",
                format!("{} is outside [0, 1]", bound_position),
            ));
        }

        let points = self.values();
        let n = points.len();
        let diffs: Vec<f64> = points.windows(2).map(|w| w[1] - w[0]).collect();
        let mut bounds = Array2::zeros((n, 2));
        for i in 0..n {
            let before = if i == 0 { diffs[0] } else { diffs[i - 1] };
            let after = if i == n - 1 { diffs[n - 2] } else { diffs[i] };
            bounds[[i, 0]] = points[i] - before * bound_position;
            bounds[[i, 1]] = points[i] + after * (1.0 - bound_position);
        }
        Ok(bounds)
    }

    /// Select points (and bounds) of a 1-D coordinate.
    pub fn select(&self, indices: &[usize]) -> CubeResult<Coord> {
        self.select_along(0, indices)
    }

    /// Select along one of the coordinate's own axes.
    pub fn select_along(&self, axis: usize, indices: &[usize]) -> CubeResult<Coord> {
        if axis >= self.ndim() {
            return Err(CubeError::invalid_parameter(
                "axis",
                format!("'{}' has no axis {}", self.name, axis),
            ));
        }
        check_indices(&self.name, self.shape()[axis], indices)?;
        let mut coord = self.clone();
        coord.points = self.points.select(ArrayAxis(axis), indices);
        coord.bounds = self
            .bounds
            .as_ref()
            .map(|b| b.select(ArrayAxis(0), indices));
        Ok(coord)
    }

    /// Time units of a time coordinate, using its calendar (Gregorian if unset).
    pub fn time_units(&self) -> CubeResult<TimeUnits> {
        TimeUnits::parse(&self.units, self.calendar.unwrap_or_default())
    }

    /// Points of a time coordinate as timestamps.
    pub fn dates(&self) -> CubeResult<Vec<ModelDateTime>> {
        let units = self.time_units()?;
        self.points.iter().map(|v| units.num2date(*v)).collect()
    }

    /// Bounds of a time coordinate as `[start, end)` ranges.
    pub fn bound_ranges(&self) -> CubeResult<Vec<DateRange>> {
        let units = self.time_units()?;
        let bounds = self.bounds_or_err()?;
        bounds
            .outer_iter()
            .map(|row| {
                let (a, b) = (units.num2date(row[0])?, units.num2date(row[1])?);
                DateRange::new(a.min(b), a.max(b))
            })
            .collect()
    }
}

fn check_indices(name: &str, len: usize, indices: &[usize]) -> CubeResult<()> {
    if let Some(bad) = indices.iter().find(|&&i| i >= len) {
        return Err(CubeError::invalid_parameter(
            "indices",
            format!("index {} out of range for '{}' of length {}", bad, name, len),
        ));
    }
    Ok(())
}

/// A coordinate describing exactly one data dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct DimCoord {
    pub coord: Coord,
    pub dim: usize,
}

/// A coordinate spanning zero or more data dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxCoord {
    pub coord: Coord,
    pub dims: Vec<usize>,
}

/// An N-dimensional data array with named coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    pub name: String,
    pub units: String,
    data: ArrayD<f32>,
    dim_coords: Vec<DimCoord>,
    aux_coords: Vec<AuxCoord>,
    pub attributes: BTreeMap<String, String>,
}

impl Cube {
    pub fn new(name: impl Into<String>, units: impl Into<String>, data: ArrayD<f32>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            data,
            dim_coords: Vec::new(),
            aux_coords: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attach a 1-D dimension coordinate to `dim`.
    pub fn with_dim_coord(mut self, coord: Coord, dim: usize) -> CubeResult<Self> {
        if coord.ndim() != 1 {
            return Err(CubeError::invalid_parameter(
                "dim_coord",
                format!("'{}' must be 1-D, got {:?}", coord.name, coord.shape()),
            ));
        }
        if dim >= self.ndim() {
            return Err(CubeError::invalid_parameter(
                "dim",
                format!("cube '{}' has no dimension {}", self.name, dim),
            ));
        }
        if coord.len() != self.data.shape()[dim] {
            return Err(CubeError::shape_mismatch(
                &coord.name,
                &[self.data.shape()[dim]],
                coord.shape(),
            ));
        }
        if let Some(existing) = self.dim_coords.iter().find(|d| d.dim == dim) {
            return Err(CubeError::invalid_parameter(
                "dim",
                format!(
                    "dimension {} already described by '{}'",
                    dim, existing.coord.name
                ),
            ));
        }
        self.ensure_name_free(&coord.name)?;
        self.dim_coords.push(DimCoord { coord, dim });
        self.dim_coords.sort_by_key(|d| d.dim);
        Ok(self)
    }

    /// Attach an auxiliary coordinate spanning `dims`, replacing any
    /// auxiliary coordinate of the same name.
    ///
    /// A coordinate with `dims` empty must hold a single value.
    pub fn with_aux_coord(mut self, coord: Coord, dims: &[usize]) -> CubeResult<Self> {
        if dims.is_empty() {
            if coord.len() != 1 {
                return Err(CubeError::shape_mismatch(&coord.name, &[1], coord.shape()));
            }
        } else {
            if let Some(&bad) = dims.iter().find(|&&d| d >= self.ndim()) {
                return Err(CubeError::invalid_parameter(
                    "dims",
                    format!("cube '{}' has no dimension {}", self.name, bad),
                ));
            }
            let expected: Vec<usize> = dims.iter().map(|&d| self.data.shape()[d]).collect();
            if coord.shape() != expected.as_slice() {
                return Err(CubeError::shape_mismatch(&coord.name, &expected, coord.shape()));
            }
        }
        if self.dim_coords.iter().any(|d| d.coord.name == coord.name) {
            return Err(CubeError::invalid_parameter(
                "aux_coord",
                format!("'{}' is already a dimension coordinate", coord.name),
            ));
        }
        self.aux_coords.retain(|a| a.coord.name != coord.name);
        self.aux_coords.push(AuxCoord {
            coord,
            dims: dims.to_vec(),
        });
        Ok(self)
    }

    fn ensure_name_free(&self, name: &str) -> CubeResult<()> {
        if self.find_coord(name).is_some() {
            return Err(CubeError::invalid_parameter(
                "coord",
                format!("cube '{}' already has a coordinate named '{}'", self.name, name),
            ));
        }
        Ok(())
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }

    /// Replace the data array, keeping coordinates. The shape must not change.
    pub fn with_data(mut self, data: ArrayD<f32>) -> CubeResult<Self> {
        if data.shape() != self.data.shape() {
            return Err(CubeError::shape_mismatch(
                format!("data of '{}'", self.name),
                self.data.shape(),
                data.shape(),
            ));
        }
        self.data = data;
        Ok(self)
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn dim_coords(&self) -> &[DimCoord] {
        &self.dim_coords
    }

    pub fn aux_coords(&self) -> &[AuxCoord] {
        &self.aux_coords
    }

    /// All coordinates, dimension coordinates first.
    pub fn coords(&self) -> impl Iterator<Item = &Coord> {
        self.dim_coords
            .iter()
            .map(|d| &d.coord)
            .chain(self.aux_coords.iter().map(|a| &a.coord))
    }

    pub fn coord_names(&self) -> Vec<String> {
        self.coords().map(|c| c.name.clone()).collect()
    }

    pub fn find_coord(&self, name: &str) -> Option<&Coord> {
        self.coords().find(|c| c.name == name)
    }

    pub fn has_coord(&self, name: &str) -> bool {
        self.find_coord(name).is_some()
    }

    /// Look up a coordinate by name.
    pub fn coord(&self, name: &str) -> CubeResult<&Coord> {
        self.find_coord(name)
            .ok_or_else(|| CubeError::missing_coordinate(name, self.coord_names()))
    }

    /// Data dimensions spanned by a coordinate.
    pub fn coord_dims(&self, name: &str) -> CubeResult<Vec<usize>> {
        if let Some(d) = self.dim_coords.iter().find(|d| d.coord.name == name) {
            return Ok(vec![d.dim]);
        }
        self.aux_coords
            .iter()
            .find(|a| a.coord.name == name)
            .map(|a| a.dims.clone())
            .ok_or_else(|| CubeError::missing_coordinate(name, self.coord_names()))
    }

    /// Dimension coordinate describing `dim`, if any.
    pub fn dim_coord_for(&self, dim: usize) -> Option<&Coord> {
        self.dim_coords.iter().find(|d| d.dim == dim).map(|d| &d.coord)
    }

    /// Dimension coordinate with the given axis and the dimension it describes.
    pub fn dim_coord_by_axis(&self, axis: Axis) -> Option<(&Coord, usize)> {
        self.dim_coords
            .iter()
            .find(|d| d.coord.axis == Some(axis))
            .map(|d| (&d.coord, d.dim))
    }

    /// `(y_dim, x_dim)` of the horizontal dimension coordinates.
    pub fn horizontal_dims(&self) -> CubeResult<(usize, usize)> {
        let (y, x) = self.horizontal_coords()?;
        Ok((self.coord_dims(&y.name)?[0], self.coord_dims(&x.name)?[0]))
    }

    /// `(y, x)` horizontal dimension coordinates.
    pub fn horizontal_coords(&self) -> CubeResult<(&Coord, &Coord)> {
        let y = self.dim_coord_by_axis(Axis::Y);
        let x = self.dim_coord_by_axis(Axis::X);
        match (y, x) {
            (Some((y, _)), Some((x, _))) => Ok((y, x)),
            (None, _) => Err(CubeError::missing_coordinate("latitude", self.coord_names())),
            (_, None) => Err(CubeError::missing_coordinate("longitude", self.coord_names())),
        }
    }

    /// Coordinate system of the horizontal coordinates.
    pub fn coord_system(&self) -> Option<CoordSystem> {
        self.dim_coord_by_axis(Axis::X)
            .and_then(|(c, _)| c.coord_system)
            .or_else(|| self.dim_coord_by_axis(Axis::Y).and_then(|(c, _)| c.coord_system))
    }

    /// Replace a coordinate by a new one with the same name and shape.
    pub fn replace_coord(mut self, coord: Coord) -> CubeResult<Self> {
        if let Some(d) = self.dim_coords.iter_mut().find(|d| d.coord.name == coord.name) {
            if coord.shape() != d.coord.shape() {
                return Err(CubeError::shape_mismatch(&coord.name, d.coord.shape(), coord.shape()));
            }
            d.coord = coord;
            return Ok(self);
        }
        if let Some(a) = self.aux_coords.iter_mut().find(|a| a.coord.name == coord.name) {
            if coord.shape() != a.coord.shape() {
                return Err(CubeError::shape_mismatch(&coord.name, a.coord.shape(), coord.shape()));
            }
            a.coord = coord;
            return Ok(self);
        }
        Err(CubeError::missing_coordinate(coord.name.clone(), self.coord_names()))
    }

    /// Remove a coordinate by name.
    pub fn remove_coord(mut self, name: &str) -> CubeResult<Self> {
        let before = self.dim_coords.len() + self.aux_coords.len();
        self.dim_coords.retain(|d| d.coord.name != name);
        self.aux_coords.retain(|a| a.coord.name != name);
        if self.dim_coords.len() + self.aux_coords.len() == before {
            return Err(CubeError::missing_coordinate(name, self.coord_names()));
        }
        Ok(self)
    }

    /// Select `indices` along data dimension `dim`, subsetting every
    /// coordinate that spans it.
    pub fn subset(&self, dim: usize, indices: &[usize]) -> CubeResult<Cube> {
        if dim >= self.ndim() {
            return Err(CubeError::invalid_parameter(
                "dim",
                format!("cube '{}' has no dimension {}", self.name, dim),
            ));
        }
        check_indices(&self.name, self.shape()[dim], indices)?;

        let mut cube = self.clone();
        cube.data = self.data.select(ArrayAxis(dim), indices);
        for d in cube.dim_coords.iter_mut().filter(|d| d.dim == dim) {
            d.coord = d.coord.select(indices)?;
        }
        for a in cube.aux_coords.iter_mut() {
            if let Some(pos) = a.dims.iter().position(|&d| d == dim) {
                a.coord = a.coord.select_along(pos, indices)?;
            }
        }
        Ok(cube)
    }

    /// Contiguous `[start, end)` index range along `dim`.
    pub fn slice_range(&self, dim: usize, start: usize, end: usize) -> CubeResult<Cube> {
        let indices: Vec<usize> = (start..end).collect();
        self.subset(dim, &indices)
    }

    /// Reorder the cube along a 1-D coordinate so its points ascend.
    pub fn sorted_by(&self, name: &str) -> CubeResult<Cube> {
        let coord = self.coord(name)?;
        let dims = self.coord_dims(name)?;
        if dims.len() != 1 || coord.ndim() != 1 {
            return Err(CubeError::invalid_parameter(
                "coord",
                format!("'{}' must span exactly one dimension to sort by it", name),
            ));
        }
        let values = coord.values();
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        self.subset(dims[0], &order)
    }

    /// Time dimension coordinate (axis T) and its dimension.
    pub fn time_coord(&self) -> CubeResult<(&Coord, usize)> {
        if let Some(found) = self.dim_coord_by_axis(Axis::T) {
            return Ok(found);
        }
        Err(CubeError::missing_coordinate("time", self.coord_names()))
    }

    /// Build an empty data array shaped like this cube with `shape[dim]`
    /// replaced by `len`.
    pub fn shape_with(&self, dim: usize, len: usize) -> Vec<usize> {
        let mut shape = self.shape().to_vec();
        if dim < shape.len() {
            shape[dim] = len;
        }
        shape
    }

    /// Count of non-missing data values.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Data array filled with `NaN`, shaped `shape`.
    pub fn nan_array(shape: &[usize]) -> ArrayD<f32> {
        ArrayD::from_elem(IxDyn(shape), f32::NAN)
    }
}

impl fmt::Display for Cube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / ({}) {:?}", self.name, self.units, self.shape())?;
        for d in &self.dim_coords {
            write!(f, "\n    dim {}: {} ({})", d.dim, d.coord.name, d.coord.len())?;
        }
        for a in &self.aux_coords {
            write!(f, "\n    aux {:?}: {}", a.dims, a.coord.name)?;
        }
        Ok(())
    }
}
