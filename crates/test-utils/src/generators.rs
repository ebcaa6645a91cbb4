//! Synthetic cube generators.
//!
//! These generators create small, predictable cubes that can be used across
//! the test suite. Horizontal data values encode their position so that
//! subsetting and reordering can be checked exactly.

use cube_common::{Calendar, Coord, CoordSystem, Cube, ModelDateTime, TimeUnits};
use ndarray::{Array2, Array3};

/// Evenly spaced axis values: `start, start + step, ...` (`n` values).
pub fn axis_points(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Creates a 2-D regular lat/lon cube with predictable values.
///
/// Each cell value is `row * 1000 + col`, so `data[[row, col]]` identifies
/// its own source position after any subsetting.
///
/// # Example
///
/// ```
/// use test_utils::{axis_points, regular_cube};
///
/// let cube = regular_cube(axis_points(-10.0, 5.0, 5), axis_points(0.0, 10.0, 4));
/// assert_eq!(cube.shape(), &[5, 4]);
/// assert_eq!(cube.data()[ndarray::IxDyn(&[1, 2])], 1002.0);
/// ```
pub fn regular_cube(lats: Vec<f64>, lons: Vec<f64>) -> Cube {
    let data = Array2::from_shape_fn((lats.len(), lons.len()), |(r, c)| (r * 1000 + c) as f32);
    Cube::new("air_temperature", "K", data.into_dyn())
        .with_dim_coord(
            Coord::new("latitude", lats, "degrees").with_coord_system(CoordSystem::Regular),
            0,
        )
        .and_then(|cube| {
            cube.with_dim_coord(
                Coord::new("longitude", lons, "degrees").with_coord_system(CoordSystem::Regular),
                1,
            )
        })
        .expect("generator coordinates match data shape")
}

/// Creates a 2-D rotated-pole cube with the same value pattern as
/// [`regular_cube`].
pub fn rotated_cube(rlats: Vec<f64>, rlons: Vec<f64>, pole_lat: f64, pole_lon: f64) -> Cube {
    let cs = CoordSystem::rotated(pole_lat, pole_lon).expect("valid test pole");
    let data = Array2::from_shape_fn((rlats.len(), rlons.len()), |(r, c)| (r * 1000 + c) as f32);
    Cube::new("air_temperature", "K", data.into_dyn())
        .with_dim_coord(Coord::new("grid_latitude", rlats, "degrees").with_coord_system(cs), 0)
        .and_then(|cube| {
            cube.with_dim_coord(Coord::new("grid_longitude", rlons, "degrees").with_coord_system(cs), 1)
        })
        .expect("generator coordinates match data shape")
}

/// Replaces the data of a 2-D cube with a smooth temperature-like field
/// in Kelvin (250 K to 310 K).
pub fn with_temperature_field(cube: Cube) -> Cube {
    let shape = cube.shape().to_vec();
    let (ny, nx) = (shape[0], shape[1]);
    let data = Array2::from_shape_fn((ny, nx), |(r, c)| {
        let y = r as f32 / ny.max(1) as f32;
        let x = c as f32 / nx.max(1) as f32;
        250.0 + 30.0 * x + 30.0 * y
    });
    cube.with_data(data.into_dyn())
        .expect("temperature field matches cube shape")
}

/// Creates a `[time, 2, 3]` cube whose time cells are the given
/// `[start, end)` pairs, with points at each cell midpoint.
///
/// Every value in time slice `t` equals `t`.
pub fn time_cube(cells: &[(ModelDateTime, ModelDateTime)], calendar: Calendar) -> Cube {
    let units = TimeUnits::parse("days since 1970-01-01", calendar).expect("valid units");
    let bounds = Array2::from_shape_fn((cells.len(), 2), |(i, j)| {
        let dt = if j == 0 { &cells[i].0 } else { &cells[i].1 };
        units.date2num(dt)
    });
    let points: Vec<f64> = (0..cells.len())
        .map(|i| 0.5 * (bounds[[i, 0]] + bounds[[i, 1]]))
        .collect();
    let time = Coord::new("time", points, units.to_string())
        .with_calendar(calendar)
        .with_bounds(bounds)
        .expect("bounds match points");

    let data = Array3::from_shape_fn((cells.len(), 2, 3), |(t, _, _)| t as f32);
    Cube::new("air_temperature", "K", data.into_dyn())
        .with_dim_coord(time, 0)
        .and_then(|cube| cube.with_dim_coord(Coord::new("latitude", vec![0.0, 10.0], "degrees"), 1))
        .and_then(|cube| {
            cube.with_dim_coord(Coord::new("longitude", vec![0.0, 10.0, 20.0], "degrees"), 2)
        })
        .expect("generator coordinates match data shape")
}

/// Monthly cells starting at `year`-`month`-01.
pub fn monthly_cells(
    calendar: Calendar,
    year: i32,
    month: u32,
    n_months: usize,
) -> Vec<(ModelDateTime, ModelDateTime)> {
    let first = ModelDateTime::ymd(calendar, year, month, 1).expect("valid start month");
    (0..n_months)
        .map(|i| {
            let start = first.add_months(i as i32).expect("month in range");
            let end = start.add_months(1).expect("month in range");
            (start, end)
        })
        .collect()
}

/// Daily cells starting at `start`.
pub fn daily_cells(start: ModelDateTime, n_days: usize) -> Vec<(ModelDateTime, ModelDateTime)> {
    (0..n_days)
        .map(|i| {
            let day = start.add_days(i as i64).expect("day in range");
            let next = day.add_days(1).expect("day in range");
            (day, next)
        })
        .collect()
}

/// Creates a monthly `[time, 2, 3]` cube; see [`time_cube`].
pub fn monthly_cube(calendar: Calendar, year: i32, month: u32, n_months: usize) -> Cube {
    time_cube(&monthly_cells(calendar, year, month, n_months), calendar)
}

/// Creates a daily `[time, 2, 3]` cube; see [`time_cube`].
pub fn daily_cube(start: ModelDateTime, n_days: usize) -> Cube {
    time_cube(&daily_cells(start, n_days), start.calendar)
}
