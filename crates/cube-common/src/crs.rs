//! Coordinate system tags attached to horizontal coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CubeError, CubeResult};

/// Coordinate system of a cube's horizontal coordinates.
///
/// Rotated-pole parameters follow this workspace's convention: the rotated
/// north pole sits at (`pole_latitude`, `pole_longitude`) in true geographic
/// coordinates, and rotated longitude is measured from the meridian that
/// makes pole (90, 0) the identity. `central_rotated_longitude` shifts the
/// rotated longitude origin; CF-convention grids (`grid_north_pole_*`
/// attributes) use an offset of 180 degrees, see [`CoordSystem::rotated_from_cf`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordSystem {
    /// Regular geographic latitude/longitude.
    Regular,
    /// Rotated-pole latitude/longitude.
    RotatedPole {
        pole_latitude: f64,
        pole_longitude: f64,
        #[serde(default)]
        central_rotated_longitude: f64,
    },
}

impl CoordSystem {
    /// Create a rotated-pole system, validating the pole latitude.
    pub fn rotated(pole_latitude: f64, pole_longitude: f64) -> CubeResult<Self> {
        validate_pole(pole_latitude, pole_longitude)?;
        Ok(CoordSystem::RotatedPole {
            pole_latitude,
            pole_longitude,
            central_rotated_longitude: 0.0,
        })
    }

    /// Create a rotated-pole system from CF `grid_north_pole_latitude` and
    /// `grid_north_pole_longitude` attributes.
    pub fn rotated_from_cf(
        grid_north_pole_latitude: f64,
        grid_north_pole_longitude: f64,
    ) -> CubeResult<Self> {
        validate_pole(grid_north_pole_latitude, grid_north_pole_longitude)?;
        Ok(CoordSystem::RotatedPole {
            pole_latitude: grid_north_pole_latitude,
            pole_longitude: grid_north_pole_longitude,
            central_rotated_longitude: 180.0,
        })
    }

    /// Check if this is a rotated-pole system.
    pub fn is_rotated(&self) -> bool {
        matches!(self, CoordSystem::RotatedPole { .. })
    }

    /// Pole parameters `(pole_latitude, pole_longitude, central_rotated_longitude)`.
    ///
    /// A regular system is reported as the identity pole `(90, 0, 0)`.
    pub fn pole(&self) -> (f64, f64, f64) {
        match *self {
            CoordSystem::Regular => (90.0, 0.0, 0.0),
            CoordSystem::RotatedPole {
                pole_latitude,
                pole_longitude,
                central_rotated_longitude,
            } => (pole_latitude, pole_longitude, central_rotated_longitude),
        }
    }

    /// Names of the horizontal (y, x) dimension coordinates for this system.
    pub fn horizontal_names(&self) -> (&'static str, &'static str) {
        match self {
            CoordSystem::Regular => ("latitude", "longitude"),
            CoordSystem::RotatedPole { .. } => ("grid_latitude", "grid_longitude"),
        }
    }
}

impl fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordSystem::Regular => write!(f, "Regular"),
            CoordSystem::RotatedPole {
                pole_latitude,
                pole_longitude,
                central_rotated_longitude,
            } => write!(
                f,
                "RotatedPole(pole_lat={}, pole_lon={}, central_rotated_lon={})",
                pole_latitude, pole_longitude, central_rotated_longitude
            ),
        }
    }
}

fn validate_pole(pole_latitude: f64, pole_longitude: f64) -> CubeResult<()> {
    if !pole_latitude.is_finite() || !(-90.0..=90.0).contains(&pole_latitude) {
        return Err(CubeError::invalid_parameter(
            "pole_latitude",
            format!("{} is outside [-90, 90]", pole_latitude),
        ));
    }
    if !pole_longitude.is_finite() {
        return Err(CubeError::invalid_parameter(
            "pole_longitude",
            format!("{} is not finite", pole_longitude),
        ));
    }
    Ok(())
}

/// Axis a coordinate describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Longitude / grid_longitude
    X,
    /// Latitude / grid_latitude
    Y,
    /// Vertical level
    Z,
    /// Time
    T,
}

impl Axis {
    /// Guess the axis from a coordinate name.
    pub fn guess(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "longitude" | "grid_longitude" | "lon" | "x" | "projection_x_coordinate" => Some(Axis::X),
            "latitude" | "grid_latitude" | "lat" | "y" | "projection_y_coordinate" => Some(Axis::Y),
            "time" => Some(Axis::T),
            "height" | "pressure" | "air_pressure" | "model_level_number" | "depth" => Some(Axis::Z),
            _ => None,
        }
    }
}
