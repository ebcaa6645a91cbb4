//! Lateral-boundary rim removal for regional model output.

use cube_common::Cube;
use tracing::{info, warn};

use crate::config::ProcessorConfig;
use crate::error::{GridProcessorError, Result};

/// Attribute recording that a rim has been stripped.
pub const RIM_REMOVED_ATTRIBUTE: &str = "rim_removed";

/// Strip `rim_width` cells from every horizontal edge of the cube.
///
/// Auxiliary coordinates on the horizontal dimensions are trimmed with the
/// data. The result carries a `rim_removed` attribute; removing a rim twice
/// is allowed but logged.
pub fn remove_rim(cube: &Cube, rim_width: usize) -> Result<Cube> {
    if rim_width == 0 {
        return Err(GridProcessorError::invalid_width(
            rim_width,
            "rim width must be a positive integer",
        ));
    }
    if cube.attribute(RIM_REMOVED_ATTRIBUTE).is_some() {
        warn!(cube = %cube.name, "This cube has already had its rim removed");
    }

    let (y_dim, x_dim) = cube.horizontal_dims()?;
    let ny = cube.shape()[y_dim];
    let nx = cube.shape()[x_dim];
    if 2 * rim_width >= ny.min(nx) {
        return Err(GridProcessorError::invalid_width(
            rim_width,
            format!(
                "horizontal extent {}x{} leaves no interior after removing {} cells per edge",
                ny, nx, rim_width
            ),
        ));
    }

    let trimmed = cube
        .slice_range(y_dim, rim_width, ny - rim_width)?
        .slice_range(x_dim, rim_width, nx - rim_width)?
        .with_attribute(
            RIM_REMOVED_ATTRIBUTE,
            format!("{} point rim removed", rim_width),
        );

    info!(cube = %cube.name, rim_width, "Removed rim");
    Ok(trimmed)
}

/// [`remove_rim`] with the configured default width.
pub fn remove_configured_rim(cube: &Cube, config: &ProcessorConfig) -> Result<Cube> {
    remove_rim(cube, config.rim_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{add_rotated_coord_system, add_unrotated_aux_coords};
    use ndarray::IxDyn;
    use test_utils::{axis_points, rotated_cube};

    fn model_cube(ny: usize, nx: usize) -> Cube {
        rotated_cube(axis_points(-10.0, 0.44, ny), axis_points(-12.0, 0.44, nx), 39.25, 198.0)
    }

    #[test]
    fn test_remove_rim_shape_and_values() {
        let cube = model_cube(20, 24);
        let trimmed = remove_rim(&cube, 8).unwrap();
        assert_eq!(trimmed.shape(), &[4, 8]);
        // Value encodes row * 1000 + col of the source cell.
        assert_eq!(trimmed.data()[IxDyn(&[0, 0])], 8008.0);
        assert_eq!(trimmed.data()[IxDyn(&[3, 7])], 11015.0);
        assert_eq!(
            trimmed.coord("grid_longitude").unwrap().values(),
            cube.coord("grid_longitude").unwrap().values()[8..16].to_vec()
        );
        assert_eq!(trimmed.attribute(RIM_REMOVED_ATTRIBUTE), Some("8 point rim removed"));
    }

    #[test]
    fn test_remove_rim_trims_aux_coords() {
        let cube = model_cube(10, 12);
        let cube = add_rotated_coord_system(cube, 39.25, 198.0).unwrap();
        let cube = add_unrotated_aux_coords(cube).unwrap();
        let trimmed = remove_rim(&cube, 2).unwrap();
        assert_eq!(trimmed.coord("latitude").unwrap().shape(), &[6, 8]);
    }

    #[test]
    fn test_remove_rim_twice() {
        let cube = model_cube(20, 20);
        let once = remove_rim(&cube, 2).unwrap();
        let twice = remove_rim(&once, 2).unwrap();
        assert_eq!(twice.shape(), &[12, 12]);
        assert_eq!(twice.attribute(RIM_REMOVED_ATTRIBUTE), Some("2 point rim removed"));
    }

    #[test]
    fn test_invalid_width() {
        let cube = model_cube(10, 12);
        assert!(matches!(
            remove_rim(&cube, 0),
            Err(GridProcessorError::InvalidWidth { width: 0, .. })
        ));
        assert!(matches!(
            remove_rim(&cube, 5),
            Err(GridProcessorError::InvalidWidth { width: 5, .. })
        ));
        assert!(remove_rim(&cube, 4).is_ok());
    }

    #[test]
    fn test_remove_configured_rim() {
        let cube = model_cube(20, 20);
        let trimmed = remove_configured_rim(&cube, &ProcessorConfig::default()).unwrap();
        assert_eq!(trimmed.shape(), &[4, 4]);
    }
}
