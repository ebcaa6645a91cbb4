//! Time categorisation coordinates and seasonal time statistics.

use std::fmt;

use cube_common::{months_name, Coord, Cube, ModelDateTime};
use ndarray::{arr2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GridProcessorError, Result};

/// MAM, JJA, SON and DJF.
pub const DEFAULT_SEASONS: [[u32; 3]; 4] = [[3, 4, 5], [6, 7, 8], [9, 10, 11], [12, 1, 2]];

pub fn default_seasons() -> Vec<Vec<u32>> {
    DEFAULT_SEASONS.iter().map(|s| s.to_vec()).collect()
}

/// Statistic used to collapse the time dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatMetric {
    Mean,
    /// Sample standard deviation (one delta degree of freedom).
    StdDev,
    Min,
    Max,
    /// Percentile in `[0, 100]`, linearly interpolated between ranks.
    Percentile(f64),
}

impl StatMetric {
    fn validate(&self) -> Result<()> {
        if let StatMetric::Percentile(p) = self {
            if !(0.0..=100.0).contains(p) {
                return Err(GridProcessorError::invalid_parameter(
                    "percentile",
                    format!("{} is outside [0, 100]", p),
                ));
            }
        }
        Ok(())
    }

    /// Statistic of the non-missing values, NaN if there are none.
    fn apply(&self, lane: ArrayView1<f32>) -> f32 {
        let mut values: Vec<f64> = lane.iter().filter(|v| !v.is_nan()).map(|&v| v as f64).collect();
        let n = values.len();
        if n == 0 {
            return f32::NAN;
        }
        let result = match *self {
            StatMetric::Mean => values.iter().sum::<f64>() / n as f64,
            StatMetric::StdDev => {
                if n < 2 {
                    return f32::NAN;
                }
                let mean = values.iter().sum::<f64>() / n as f64;
                let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
                (ss / (n - 1) as f64).sqrt()
            }
            StatMetric::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            StatMetric::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            StatMetric::Percentile(p) => {
                values.sort_by(f64::total_cmp);
                let rank = p / 100.0 * (n - 1) as f64;
                let lo = rank.floor() as usize;
                let hi = rank.ceil() as usize;
                values[lo] + (values[hi] - values[lo]) * (rank - lo as f64)
            }
        };
        result as f32
    }
}

impl fmt::Display for StatMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatMetric::Mean => write!(f, "mean"),
            StatMetric::StdDev => write!(f, "std_dev"),
            StatMetric::Min => write!(f, "min"),
            StatMetric::Max => write!(f, "max"),
            StatMetric::Percentile(p) => write!(f, "percentile({})", p),
        }
    }
}

/// Three-letter month names run together, e.g. `[12, 1, 2]` -> "decjanfeb".
pub fn months_fullname(months: &[u32]) -> String {
    const NAMES: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    months
        .iter()
        .filter(|m| (1..=12).contains(*m))
        .map(|m| NAMES[(*m - 1) as usize])
        .collect()
}

const TIME_CATEGORIES: [&str; 5] = ["day_of_month", "day_of_year", "month_number", "season_number", "year"];

fn time_category(name: &str, dt: &ModelDateTime) -> f64 {
    match name {
        "day_of_month" => dt.day as f64,
        "day_of_year" => dt.day_of_year() as f64,
        "month_number" => dt.month as f64,
        "season_number" => dt.season().index() as f64,
        _ => dt.year as f64,
    }
}

/// Add numeric time categorisation coordinates along the time dimension:
/// `day_of_month`, `day_of_year`, `month_number`, `season_number`
/// (DJF=0, MAM=1, JJA=2, SON=3) and `year`.
///
/// Categories the cube already has are left alone.
pub fn add_time_coord_cats(cube: Cube) -> Result<Cube> {
    let (time, dim) = cube.time_coord()?;
    let dates = time.dates()?;

    let mut cube = cube;
    for name in TIME_CATEGORIES {
        if cube.has_coord(name) {
            debug!(coord = name, "Time category already present");
            continue;
        }
        let values = dates.iter().map(|dt| time_category(name, dt)).collect();
        cube = cube.with_aux_coord(Coord::new(name, values, "1"), &[dim])?;
    }
    Ok(cube)
}

/// Collapse the time dimension per season.
///
/// Each season is a list of month numbers; every time step whose point
/// falls in one of those months and in the inclusive year range counts,
/// so a season spanning the year end pools all its months. Without
/// `years` the range runs from the year of the first time cell to that of
/// the last one, read from the lower bounds, which needs a bounded time
/// coordinate.
///
/// Returns one cube per season with a scalar `time` coordinate covering
/// the selected steps and `season`/`season_fullname` attributes.
pub fn seasonal_statistic(
    cube: &Cube,
    seasons: &[Vec<u32>],
    metric: StatMetric,
    years: Option<(i32, i32)>,
) -> Result<Vec<Cube>> {
    metric.validate()?;
    let (time, dim) = cube.time_coord()?;
    let (first_year, last_year) = match years {
        Some((first, last)) if first > last => {
            return Err(GridProcessorError::invalid_parameter(
                "years",
                format!("start year {} is after end year {}", first, last),
            ))
        }
        Some(range) => range,
        None => bounded_years(cube)?,
    };
    let dates = time.dates()?;

    let mut results = Vec::with_capacity(seasons.len());
    for season in seasons {
        if season.is_empty() || season.iter().any(|m| !(1..=12).contains(m)) {
            return Err(GridProcessorError::invalid_parameter(
                "seasons",
                format!("{:?} is not a list of month numbers", season),
            ));
        }
        let name = months_name(season);
        let indices: Vec<usize> = dates
            .iter()
            .enumerate()
            .filter(|(_, dt)| season.contains(&dt.month) && (first_year..=last_year).contains(&dt.year))
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return Err(GridProcessorError::out_of_bounds(
                format!("season {} of {}-{}", name, first_year, last_year),
                format!("time points of '{}'", cube.name),
            ));
        }
        info!(
            metric = %metric,
            season = %name,
            first_year,
            last_year,
            steps = indices.len(),
            "Calculating seasonal statistic"
        );
        let selected = cube.subset(dim, &indices)?;
        let collapsed = collapse_time(&selected, dim, metric)?
            .with_attribute("season", name)
            .with_attribute("season_fullname", months_fullname(season));
        results.push(collapsed);
    }
    Ok(results)
}

/// Years of the first and last time cell, taken from their lower bounds so
/// a cell ending on 1 January does not add the following year.
fn bounded_years(cube: &Cube) -> Result<(i32, i32)> {
    let (time, _) = cube.time_coord()?;
    let cells = time.bound_ranges()?;
    match (cells.first(), cells.last()) {
        (Some(first), Some(last)) => Ok((first.start.year, last.start.year)),
        _ => Err(GridProcessorError::invalid_parameter(
            "time",
            format!("'{}' has an empty time coordinate", cube.name),
        )),
    }
}

fn collapse_time(cube: &Cube, dim: usize, metric: StatMetric) -> Result<Cube> {
    collapse_time_with(cube, dim, |lane| metric.apply(lane))
}

/// Remove time dimension `dim` by reducing each lane along it, turning the
/// time coordinate into a scalar one spanning all collapsed steps.
pub(crate) fn collapse_time_with<F>(cube: &Cube, dim: usize, reduce: F) -> Result<Cube>
where
    F: FnMut(ArrayView1<f32>) -> f32,
{
    let data = cube.data().map_axis(Axis(dim), reduce);
    let mut out = Cube::new(cube.name.clone(), cube.units.clone(), data);
    out.attributes = cube.attributes.clone();

    let shift = |d: usize| if d > dim { d - 1 } else { d };
    for d in cube.dim_coords().iter().filter(|d| d.dim != dim) {
        out = out.with_dim_coord(d.coord.clone(), shift(d.dim))?;
    }
    for a in cube.aux_coords() {
        if a.dims.contains(&dim) {
            continue;
        }
        let dims: Vec<usize> = a.dims.iter().map(|&d| shift(d)).collect();
        out = out.with_aux_coord(a.coord.clone(), &dims)?;
    }

    let (time, _) = cube.time_coord()?;
    let edges: Vec<f64> = match &time.bounds {
        Some(bounds) => bounds.iter().copied().collect(),
        None => time.values(),
    };
    let lo = edges.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = edges.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut scalar = Coord::scalar(time.name.clone(), 0.5 * (lo + hi), time.units.clone());
    scalar.axis = time.axis;
    scalar.calendar = time.calendar;
    let scalar = scalar.with_bounds(arr2(&[[lo, hi]]))?;
    Ok(out.with_aux_coord(scalar, &[])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::Calendar;
    use ndarray::{ArrayD, IxDyn};
    use test_utils::{assert_approx_eq, monthly_cube};

    #[test]
    fn test_add_time_coord_cats() {
        let cube = monthly_cube(Calendar::Gregorian, 2000, 11, 4);
        let cube = add_time_coord_cats(cube).unwrap();
        assert_eq!(cube.coord("month_number").unwrap().values(), vec![11.0, 12.0, 1.0, 2.0]);
        assert_eq!(cube.coord("season_number").unwrap().values(), vec![3.0, 0.0, 0.0, 0.0]);
        assert_eq!(cube.coord("year").unwrap().values(), vec![2000.0, 2000.0, 2001.0, 2001.0]);
        assert_eq!(cube.coord_dims("day_of_year").unwrap(), vec![0]);

        // Adding again is a no-op.
        let again = add_time_coord_cats(cube.clone()).unwrap();
        assert_eq!(again.aux_coords().len(), cube.aux_coords().len());
    }

    #[test]
    fn test_seasonal_mean_default_seasons() {
        // Two full years: Jan 2000 to Dec 2001, value = time index.
        let cube = monthly_cube(Calendar::Day360, 2000, 1, 24);
        let results = seasonal_statistic(&cube, &default_seasons(), StatMetric::Mean, None).unwrap();
        assert_eq!(results.len(), 4);

        let names: Vec<&str> = results.iter().map(|c| c.attribute("season").unwrap()).collect();
        assert_eq!(names, vec!["mam", "jja", "son", "djf"]);
        assert_eq!(results[3].attribute("season_fullname"), Some("decjanfeb"));

        // MAM indices 2, 3, 4, 14, 15, 16.
        assert_eq!(results[0].shape(), &[2, 3]);
        assert_approx_eq!(results[0].data()[IxDyn(&[0, 0])], 9.0, 1e-6);
        // DJF pools indices 0, 1, 11, 12, 13, 23.
        assert_approx_eq!(results[3].data()[IxDyn(&[1, 2])], 10.0, 1e-6);

        let time = results[0].coord("time").unwrap();
        assert_eq!(time.len(), 1);
        assert!(time.has_bounds());
    }

    #[test]
    fn test_seasonal_year_range_and_metrics() {
        let cube = monthly_cube(Calendar::Gregorian, 2000, 1, 24);
        let jja = vec![vec![6, 7, 8]];

        let max = seasonal_statistic(&cube, &jja, StatMetric::Max, Some((2000, 2000))).unwrap();
        assert_eq!(max[0].data()[IxDyn(&[0, 0])], 7.0);

        let min = seasonal_statistic(&cube, &jja, StatMetric::Min, None).unwrap();
        assert_eq!(min[0].data()[IxDyn(&[0, 0])], 5.0);

        // Values 5, 6, 7, 17, 18, 19.
        let std = seasonal_statistic(&cube, &jja, StatMetric::StdDev, None).unwrap();
        assert_approx_eq!(std[0].data()[IxDyn(&[0, 0])], 6.63325, 1e-4);

        let median = seasonal_statistic(&cube, &jja, StatMetric::Percentile(50.0), None).unwrap();
        assert_approx_eq!(median[0].data()[IxDyn(&[0, 0])], 12.0, 1e-6);
    }

    #[test]
    fn test_default_years_end_in_december() {
        // Last cell is December 2001, ending on 2002-01-01.
        let cube = monthly_cube(Calendar::Gregorian, 2000, 1, 24);
        assert_eq!(bounded_years(&cube).unwrap(), (2000, 2001));

        let cube = monthly_cube(Calendar::Day360, 1999, 12, 13);
        assert_eq!(bounded_years(&cube).unwrap(), (1999, 2000));
        let djf = seasonal_statistic(&cube, &[vec![12, 1, 2]], StatMetric::Max, None).unwrap();
        assert_eq!(djf[0].data()[IxDyn(&[0, 0])], 12.0);
    }

    #[test]
    fn test_seasonal_no_matching_steps() {
        let cube = monthly_cube(Calendar::Gregorian, 2000, 1, 3);
        assert!(matches!(
            seasonal_statistic(&cube, &[vec![7]], StatMetric::Mean, None),
            Err(GridProcessorError::OutOfBounds { .. })
        ));
        assert!(seasonal_statistic(&cube, &[vec![13]], StatMetric::Mean, None).is_err());
        assert!(seasonal_statistic(&cube, &[vec![1]], StatMetric::Percentile(120.0), None).is_err());
    }

    #[test]
    fn test_metric_ignores_missing() {
        let lane = ArrayD::from_shape_vec(IxDyn(&[4]), vec![1.0, f32::NAN, 3.0, 5.0]).unwrap();
        let lane = lane.into_dimensionality::<ndarray::Ix1>().unwrap();
        assert_eq!(StatMetric::Mean.apply(lane.view()), 3.0);
        assert_eq!(StatMetric::Percentile(25.0).apply(lane.view()), 2.0);
        assert!(StatMetric::StdDev.apply(lane.slice(ndarray::s![..1])).is_nan());
    }

    #[test]
    fn test_months_fullname() {
        assert_eq!(months_fullname(&[6, 7, 8, 9]), "junjulaugsep");
    }
}
