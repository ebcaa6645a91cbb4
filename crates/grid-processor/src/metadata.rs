//! Coordinate-system, auxiliary-coordinate and bounds metadata.

use cube_common::{Axis, CoordSystem, Coord, Cube, CubeError};
use ndarray::Array2;
use projection::RotatedPole;
use tracing::info;

use crate::error::{GridProcessorError, Result};

/// Transform between geographic and `cs` coordinates.
///
/// A regular system gives the identity transform.
pub fn rotated_pole(cs: &CoordSystem) -> Result<RotatedPole> {
    let (lat, lon, central) = cs.pole();
    Ok(RotatedPole::with_central_rotated_longitude(lat, lon, central)?)
}

/// Attach `cs` to the cube's horizontal coordinates.
///
/// The coordinates are looked up by the names the system implies
/// (`grid_latitude`/`grid_longitude` for a rotated pole,
/// `latitude`/`longitude` for a regular grid). Re-attaching the same
/// system is a no-op; attaching a different one is an error.
pub fn add_coord_system(cube: Cube, cs: CoordSystem) -> Result<Cube> {
    let (y_name, x_name) = cs.horizontal_names();
    let mut updated = Vec::with_capacity(2);
    for (name, axis) in [(y_name, Axis::Y), (x_name, Axis::X)] {
        let coord = cube.coord(name)?;
        if let Some(existing) = coord.coord_system {
            if existing != cs {
                return Err(CubeError::CoordSystemConflict {
                    existing: existing.to_string(),
                    requested: cs.to_string(),
                }
                .into());
            }
        }
        updated.push(coord.clone().with_coord_system(cs).with_axis(axis));
    }

    let mut cube = cube;
    for coord in updated {
        cube = cube.replace_coord(coord)?;
    }
    Ok(cube)
}

/// Attach a rotated-pole system with the pole at (`pole_lat`, `pole_lon`)
/// to `grid_latitude` and `grid_longitude`.
pub fn add_rotated_coord_system(cube: Cube, pole_lat: f64, pole_lon: f64) -> Result<Cube> {
    let cs = CoordSystem::rotated(pole_lat, pole_lon)?;
    add_coord_system(cube, cs)
}

/// Attach the regular system to `latitude` and `longitude`.
pub fn add_regular_coord_system(cube: Cube) -> Result<Cube> {
    add_coord_system(cube, CoordSystem::Regular)
}

/// Add 2-D true `latitude`/`longitude` auxiliary coordinates to a
/// rotated-pole cube.
///
/// Existing `latitude`/`longitude` auxiliary coordinates are replaced.
pub fn add_unrotated_aux_coords(cube: Cube) -> Result<Cube> {
    let cs = match cube.coord_system() {
        Some(cs) if cs.is_rotated() => cs,
        Some(cs) => {
            return Err(GridProcessorError::NotRotated(format!(
                "'{}' is on {}",
                cube.name, cs
            )))
        }
        None => {
            return Err(GridProcessorError::NotRotated(format!(
                "'{}' has no coordinate system",
                cube.name
            )))
        }
    };
    let pole = rotated_pole(&cs)?;

    let (y, x) = cube.horizontal_coords()?;
    let (y_dim, x_dim) = cube.horizontal_dims()?;
    let rlat = y.values();
    let rlon = x.values();

    let mut lat = Array2::zeros((rlat.len(), rlon.len()));
    let mut lon = Array2::zeros((rlat.len(), rlon.len()));
    for (i, &ry) in rlat.iter().enumerate() {
        for (j, &rx) in rlon.iter().enumerate() {
            let (a, b) = pole.to_regular(ry, rx);
            lat[[i, j]] = a;
            lon[[i, j]] = b;
        }
    }

    let lat = Coord::from_array("latitude", lat.into_dyn(), "degrees")
        .with_coord_system(CoordSystem::Regular);
    let lon = Coord::from_array("longitude", lon.into_dyn(), "degrees")
        .with_coord_system(CoordSystem::Regular);
    Ok(cube
        .with_aux_coord(lat, &[y_dim, x_dim])?
        .with_aux_coord(lon, &[y_dim, x_dim])?)
}

/// Guess contiguous bounds for `coord_name` with bounds halfway between
/// points.
pub fn add_bounds(cube: Cube, coord_name: &str) -> Result<Cube> {
    add_bounds_at(cube, coord_name, 0.5)
}

/// Guess contiguous bounds for `coord_name`; `bound_position` is the
/// fraction of each gap placed below a point.
///
/// Coordinates that already have bounds are left untouched.
pub fn add_bounds_at(cube: Cube, coord_name: &str, bound_position: f64) -> Result<Cube> {
    let coord = cube.coord(coord_name)?;
    if coord.has_bounds() {
        info!(coord = coord_name, cube = %cube.name, "Bounds already present, leaving as is");
        return Ok(cube);
    }
    let bounds = coord.guess_bounds(bound_position)?;
    let coord = coord.clone().with_bounds(bounds)?;
    Ok(cube.replace_coord(coord)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use test_utils::{assert_approx_eq, axis_points, regular_cube, rotated_cube};

    fn bare_rotated() -> Cube {
        let mut cube =
            rotated_cube(axis_points(-2.0, 1.0, 5), axis_points(-3.0, 1.0, 7), 37.5, 177.5);
        for name in ["grid_latitude", "grid_longitude"] {
            let mut coord = cube.coord(name).unwrap().clone();
            coord.coord_system = None;
            cube = cube.replace_coord(coord).unwrap();
        }
        cube
    }

    #[test]
    fn test_add_rotated_coord_system() {
        let cube = add_rotated_coord_system(bare_rotated(), 37.5, 177.5).unwrap();
        let cs = cube.coord_system().unwrap();
        assert_eq!(cs.pole(), (37.5, 177.5, 0.0));
        assert_eq!(cube.coord("grid_latitude").unwrap().coord_system, Some(cs));

        // Same system again is fine.
        assert!(add_rotated_coord_system(cube.clone(), 37.5, 177.5).is_ok());
        // A different one is not.
        let err = add_rotated_coord_system(cube, 39.25, 198.0).unwrap_err();
        assert!(matches!(
            err,
            GridProcessorError::Cube(CubeError::CoordSystemConflict { .. })
        ));
    }

    #[test]
    fn test_add_rotated_coord_system_errors() {
        let regular = regular_cube(axis_points(0.0, 1.0, 3), axis_points(0.0, 1.0, 3));
        assert!(matches!(
            add_rotated_coord_system(regular, 37.5, 177.5),
            Err(GridProcessorError::Cube(CubeError::MissingCoordinate { .. }))
        ));
        assert!(matches!(
            add_rotated_coord_system(bare_rotated(), 95.0, 0.0),
            Err(GridProcessorError::Cube(CubeError::InvalidParameter { .. }))
        ));
    }

    #[test]
    fn test_unrotated_aux_coords() {
        let cube = add_rotated_coord_system(bare_rotated(), 37.5, 177.5).unwrap();
        let cube = add_unrotated_aux_coords(cube).unwrap();
        let lat = cube.coord("latitude").unwrap();
        let lon = cube.coord("longitude").unwrap();
        assert_eq!(lat.shape(), &[5, 7]);
        assert_eq!(cube.coord_dims("longitude").unwrap(), vec![0, 1]);

        // grid (0, 0) is at row 2, column 3 and sits at (pole_lat - 90, pole_lon).
        assert_approx_eq!(lat.points[IxDyn(&[2, 3])], -52.5, 1e-9);
        assert_approx_eq!(lon.points[IxDyn(&[2, 3])], 177.5, 1e-9);

        // Idempotent: replaced, not duplicated.
        let again = add_unrotated_aux_coords(cube.clone()).unwrap();
        assert_eq!(again.aux_coords().len(), cube.aux_coords().len());
    }

    #[test]
    fn test_unrotated_aux_coords_needs_rotated_pole() {
        let regular = regular_cube(axis_points(0.0, 1.0, 3), axis_points(0.0, 1.0, 3));
        assert!(matches!(
            add_unrotated_aux_coords(regular),
            Err(GridProcessorError::NotRotated(_))
        ));
        assert!(matches!(
            add_unrotated_aux_coords(bare_rotated()),
            Err(GridProcessorError::NotRotated(_))
        ));
    }

    #[test]
    fn test_add_bounds() {
        let cube = regular_cube(axis_points(0.0, 2.0, 3), axis_points(10.0, 1.0, 2));
        let cube = add_bounds(cube, "latitude").unwrap();
        let bounds = cube.coord("latitude").unwrap().bounds.clone().unwrap();
        assert_eq!(bounds.row(0).to_vec(), vec![-1.0, 1.0]);
        assert_eq!(bounds.row(2).to_vec(), vec![3.0, 5.0]);

        // Present bounds are kept.
        let again = add_bounds_at(cube.clone(), "latitude", 0.0).unwrap();
        assert_eq!(again.coord("latitude").unwrap().bounds, Some(bounds));

        assert!(matches!(
            add_bounds(cube, "height"),
            Err(GridProcessorError::Cube(CubeError::MissingCoordinate { .. }))
        ));
    }

    #[test]
    fn test_add_bounds_single_point() {
        let cube = regular_cube(vec![0.0], axis_points(10.0, 1.0, 2));
        assert!(matches!(
            add_bounds(cube, "latitude"),
            Err(GridProcessorError::Cube(CubeError::AmbiguousBounds { .. }))
        ));
    }
}
