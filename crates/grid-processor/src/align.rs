//! Time-period alignment and coordinate compatibility checks between cubes.
//!
//! Comparison functions never fail on a mismatch: they return a report and
//! leave it to the caller whether to warn, abort or carry on.

use std::collections::BTreeSet;
use std::fmt;

use cube_common::{Coord, Cube, CubeError, DateRange, Granularity, ModelDateTime};
use tracing::{debug, warn};

use crate::error::{GridProcessorError, Result};

/// Relative tolerance for coordinate and data value comparisons.
const VALUE_RTOL: f64 = 1e-9;

// ============================================================================
// Time periods
// ============================================================================

/// Time extent of a cube: from the earliest lower time bound to the latest
/// upper one.
pub fn date_range(cube: &Cube) -> Result<DateRange> {
    let (time, _) = cube.time_coord()?;
    let cells = time.bound_ranges()?;
    let start = cells.iter().map(|c| c.start).min();
    let end = cells.iter().map(|c| c.end).max();
    match (start, end) {
        (Some(start), Some(end)) => Ok(DateRange::new(start, end)?),
        _ => Err(GridProcessorError::invalid_parameter(
            "time",
            format!("'{}' has an empty time coordinate", cube.name),
        )),
    }
}

/// Overlap of the time extents of two cubes.
///
/// Disjoint extents give an empty range (`is_empty()`) positioned at the
/// later start, not an error. Both cubes need bounded time coordinates on
/// the same calendar.
pub fn common_time_period(a: &Cube, b: &Cube) -> Result<DateRange> {
    let range_a = date_range(a)?;
    let range_b = date_range(b)?;
    if range_a.start.calendar != range_b.start.calendar {
        return Err(CubeError::InvalidTime(format!(
            "'{}' uses the {} calendar and '{}' the {} calendar",
            a.name, range_a.start.calendar, b.name, range_b.start.calendar
        ))
        .into());
    }
    Ok(range_a.intersection(&range_b))
}

/// Time steps of `cube` whose time point lies in `range`.
pub fn extract_time_range(cube: &Cube, range: &DateRange) -> Result<Cube> {
    let (time, dim) = cube.time_coord()?;
    let dates = time.dates()?;
    let indices: Vec<usize> = dates
        .iter()
        .enumerate()
        .filter(|(_, dt)| range.contains(dt))
        .map(|(i, _)| i)
        .collect();
    if indices.is_empty() {
        let extent = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => format!("time points {} to {} of '{}'", first, last, cube.name),
            _ => format!("empty time coordinate of '{}'", cube.name),
        };
        return Err(GridProcessorError::out_of_bounds(range.to_string(), extent));
    }
    Ok(cube.subset(dim, &indices)?)
}

/// Restrict both cubes to their common time period.
///
/// Returns the period and the two restricted cubes. A warning is logged if
/// the restricted cubes still cover different extents, e.g. monthly data
/// against daily data.
pub fn extract_common_time_period(a: &Cube, b: &Cube) -> Result<(DateRange, Cube, Cube)> {
    let period = common_time_period(a, b)?;
    if period.is_empty() {
        return Err(GridProcessorError::out_of_bounds(
            format!("common period of '{}' and '{}'", a.name, b.name),
            format!("{} and {} do not overlap", date_range(a)?, date_range(b)?),
        ));
    }
    let a = extract_time_range(a, &period)?;
    let b = extract_time_range(b, &period)?;

    let (extent_a, extent_b) = (date_range(&a)?, date_range(&b)?);
    if extent_a != extent_b {
        warn!(
            period = %period,
            first = %extent_a,
            second = %extent_b,
            "Extracted time extents differ"
        );
    }
    Ok((period, a, b))
}

/// Partition `[start, end)` into calendar-aligned chunks.
///
/// Chunks are consecutive with no gaps or overlaps; the last one is cut at
/// `end`.
pub fn date_chunks(
    start: ModelDateTime,
    end: ModelDateTime,
    granularity: Granularity,
) -> Result<Vec<DateRange>> {
    if end <= start {
        return Err(GridProcessorError::invalid_parameter(
            "end",
            format!("end {} must be after start {}", end, start),
        ));
    }
    Ok(DateRange::new(start, end)?.chunks(granularity)?)
}

// ============================================================================
// Coordinate comparison
// ============================================================================

/// What differs between two same-named coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MismatchKind {
    Shape,
    Points,
    BoundsPresence,
    Bounds,
    Units,
    Calendar,
    CoordSystem,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MismatchKind::Shape => "shape",
            MismatchKind::Points => "points",
            MismatchKind::BoundsPresence => "bounds presence",
            MismatchKind::Bounds => "bounds",
            MismatchKind::Units => "units",
            MismatchKind::Calendar => "calendar",
            MismatchKind::CoordSystem => "coordinate system",
        };
        write!(f, "{}", s)
    }
}

/// First difference found for one shared coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordMismatch {
    pub coord: String,
    pub kind: MismatchKind,
    pub detail: String,
}

impl fmt::Display for CoordMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} differs in {}: {}", self.coord, self.kind, self.detail)
    }
}

/// Result of [`compare_coordinates`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompatibilityReport {
    /// One entry per shared coordinate that differs, in the first cube's
    /// coordinate order.
    pub mismatches: Vec<CoordMismatch>,
    pub only_in_a: Vec<String>,
    pub only_in_b: Vec<String>,
}

impl CompatibilityReport {
    pub fn first_mismatch(&self) -> Option<&CoordMismatch> {
        self.mismatches.first()
    }

    /// No shared coordinate differs and both cubes have the same set.
    pub fn is_compatible(&self) -> bool {
        self.mismatches.is_empty() && self.only_in_a.is_empty() && self.only_in_b.is_empty()
    }
}

/// Compare every coordinate the two cubes share.
///
/// Checks shape, points, bounds presence, bound values, units, calendar
/// and coordinate system, in that order, and records the first difference
/// of each coordinate. All coordinates are checked.
pub fn compare_coordinates(a: &Cube, b: &Cube) -> CompatibilityReport {
    let names_a: BTreeSet<String> = a.coords().map(|c| c.name.clone()).collect();
    let names_b: BTreeSet<String> = b.coords().map(|c| c.name.clone()).collect();

    let mut report = CompatibilityReport {
        only_in_a: names_a.difference(&names_b).cloned().collect(),
        only_in_b: names_b.difference(&names_a).cloned().collect(),
        ..Default::default()
    };
    for coord_a in a.coords() {
        let Some(coord_b) = b.find_coord(&coord_a.name) else {
            continue;
        };
        if let Some((kind, detail)) = coord_difference(coord_a, coord_b) {
            debug!(coord = %coord_a.name, kind = %kind, "Coordinate mismatch");
            report.mismatches.push(CoordMismatch {
                coord: coord_a.name.clone(),
                kind,
                detail,
            });
        }
    }
    report
}

fn coord_difference(a: &Coord, b: &Coord) -> Option<(MismatchKind, String)> {
    if a.shape() != b.shape() {
        return Some((MismatchKind::Shape, format!("{:?} vs {:?}", a.shape(), b.shape())));
    }
    if let Some(i) = first_difference(a.points.iter(), b.points.iter()) {
        return Some((MismatchKind::Points, format!("first differs at flat index {}", i)));
    }
    match (&a.bounds, &b.bounds) {
        (Some(ba), Some(bb)) => {
            if ba.shape() != bb.shape() {
                return Some((MismatchKind::Bounds, format!("{:?} vs {:?}", ba.shape(), bb.shape())));
            }
            if let Some(i) = first_difference(ba.iter(), bb.iter()) {
                return Some((MismatchKind::Bounds, format!("first differs at flat index {}", i)));
            }
        }
        (None, None) => {}
        (ba, bb) => {
            return Some((
                MismatchKind::BoundsPresence,
                format!("bounded: {} vs {}", ba.is_some(), bb.is_some()),
            ))
        }
    }
    if a.units != b.units {
        return Some((MismatchKind::Units, format!("'{}' vs '{}'", a.units, b.units)));
    }
    if a.calendar.unwrap_or_default() != b.calendar.unwrap_or_default() {
        return Some((
            MismatchKind::Calendar,
            format!("{} vs {}", a.calendar.unwrap_or_default(), b.calendar.unwrap_or_default()),
        ));
    }
    if a.coord_system != b.coord_system {
        return Some((
            MismatchKind::CoordSystem,
            format!("{} vs {}", describe(a.coord_system), describe(b.coord_system)),
        ));
    }
    None
}

fn describe(cs: Option<cube_common::CoordSystem>) -> String {
    cs.map_or_else(|| "none".to_string(), |cs| cs.to_string())
}

fn values_match(a: f64, b: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    (a - b).abs() <= VALUE_RTOL * a.abs().max(b.abs()).max(1.0)
}

fn first_difference<'a>(
    a: impl Iterator<Item = &'a f64>,
    b: impl Iterator<Item = &'a f64>,
) -> Option<usize> {
    a.zip(b).position(|(x, y)| !values_match(*x, *y))
}

/// Result of [`compare_cubes`].
#[derive(Debug, Clone, PartialEq)]
pub struct CubeComparison {
    pub name_matches: bool,
    pub units_match: bool,
    pub shape_matches: bool,
    /// `None` when the shapes differ.
    pub data_matches: Option<bool>,
    pub coords: CompatibilityReport,
}

impl CubeComparison {
    pub fn is_compatible(&self) -> bool {
        self.name_matches && self.units_match && self.shape_matches && self.coords.is_compatible()
    }

    pub fn is_identical(&self) -> bool {
        self.is_compatible() && self.data_matches == Some(true)
    }
}

/// [`compare_coordinates`] plus name, units, shape and data checks.
pub fn compare_cubes(a: &Cube, b: &Cube) -> CubeComparison {
    let shape_matches = a.shape() == b.shape();
    let data_matches = shape_matches.then(|| {
        a.data()
            .iter()
            .zip(b.data().iter())
            .all(|(x, y)| values_match(*x as f64, *y as f64))
    });
    CubeComparison {
        name_matches: a.name == b.name,
        units_match: a.units == b.units,
        shape_matches,
        data_matches,
        coords: compare_coordinates(a, b),
    }
}
