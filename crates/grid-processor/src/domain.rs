//! Rotated-pole limited-area domains described the way UM run
//! configurations describe them.
//!
//! A domain is given by its first grid latitude/longitude, the grid spacing,
//! the number of rows and columns and the pole position (CF convention, as
//! `POLELATA`/`POLELONA`). In New Dynamics/ENDGAME configurations the first
//! latitude/longitude is the south-west corner of the grid and rows run
//! northwards. In old-dynamics configurations it is the centre of the
//! north-west cell and rows run southwards.

use cube_common::{Coord, CoordSystem, Cube};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GridProcessorError, Result};
use crate::metadata::{add_bounds, add_coord_system, rotated_pole};

/// A UM limited-area domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmDomain {
    pub delta_lat: f64,
    pub delta_lon: f64,
    pub first_lat: f64,
    pub first_lon: f64,
    pub pole_lat: f64,
    pub pole_lon: f64,
    /// Number of columns.
    pub row_length: usize,
    /// Number of rows.
    pub rows: usize,
    #[serde(default)]
    pub old_dynamics: bool,
}

/// Rotated-grid extent of a domain's outer cell edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainCorners {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl DomainCorners {
    /// Corners as `(grid_lat, grid_lon)`, anticlockwise from south-west.
    pub fn points(&self) -> [(f64, f64); 4] {
        [
            (self.min_lat, self.min_lon),
            (self.min_lat, self.max_lon),
            (self.max_lat, self.max_lon),
            (self.max_lat, self.min_lon),
        ]
    }
}

impl UmDomain {
    pub fn validate(&self) -> Result<()> {
        for (name, delta) in [("delta_lat", self.delta_lat), ("delta_lon", self.delta_lon)] {
            if !(delta.is_finite() && delta > 0.0) {
                return Err(GridProcessorError::invalid_parameter(
                    name,
                    format!("{} is not a positive spacing", delta),
                ));
            }
        }
        if !self.first_lat.is_finite() || !self.first_lon.is_finite() {
            return Err(GridProcessorError::invalid_parameter(
                "first_lat, first_lon",
                "must be finite",
            ));
        }
        if self.rows < 2 || self.row_length < 2 {
            return Err(GridProcessorError::invalid_parameter(
                "rows, row_length",
                format!("{} x {} grid, need at least 2 x 2", self.rows, self.row_length),
            ));
        }
        self.coord_system().map(|_| ())
    }

    /// The domain's rotated-pole system.
    pub fn coord_system(&self) -> Result<CoordSystem> {
        Ok(CoordSystem::rotated_from_cf(self.pole_lat, self.pole_lon)?)
    }

    /// Grid longitude and latitude of the last theta point.
    pub fn last_lon_lat(&self) -> (f64, f64) {
        let last_lon = self.first_lon + (self.row_length - 1) as f64 * self.delta_lon;
        let lat_span = (self.rows - 1) as f64 * self.delta_lat;
        let last_lat = if self.old_dynamics {
            self.first_lat - lat_span
        } else {
            self.first_lat + lat_span
        };
        (last_lon, last_lat)
    }

    /// Zero-filled `[rows, row_length]` potential-temperature cube on the
    /// domain's theta points, with bounds and the rotated-pole system.
    pub fn theta_cube(&self) -> Result<Cube> {
        self.validate()?;
        let lat_step = if self.old_dynamics {
            -self.delta_lat
        } else {
            self.delta_lat
        };
        let lats: Vec<f64> = (0..self.rows)
            .map(|i| self.first_lat + i as f64 * lat_step)
            .collect();
        let lons: Vec<f64> = (0..self.row_length)
            .map(|j| self.first_lon + j as f64 * self.delta_lon)
            .collect();

        let data = Array2::<f32>::zeros((self.rows, self.row_length)).into_dyn();
        let cube = Cube::new("air_potential_temperature", "K", data)
            .with_dim_coord(Coord::new("grid_latitude", lats, "degrees"), 0)?
            .with_dim_coord(Coord::new("grid_longitude", lons, "degrees"), 1)?;
        let cube = add_coord_system(cube, self.coord_system()?)?;
        let cube = add_bounds(cube, "grid_latitude")?;
        add_bounds(cube, "grid_longitude")
    }

    /// Outer edges of the domain in grid coordinates.
    pub fn corners(&self) -> DomainCorners {
        if self.old_dynamics {
            // First lat/lon are the centre of the north-west cell.
            DomainCorners {
                min_lat: self.first_lat - self.delta_lat * (self.rows as f64 - 0.5),
                min_lon: self.first_lon - self.delta_lon / 2.0,
                max_lat: self.first_lat + self.delta_lat / 2.0,
                max_lon: self.first_lon + self.delta_lon * (self.row_length as f64 - 0.5),
            }
        } else {
            DomainCorners {
                min_lat: self.first_lat,
                min_lon: self.first_lon,
                max_lat: self.first_lat + self.delta_lat * self.rows as f64,
                max_lon: self.first_lon + self.delta_lon * self.row_length as f64,
            }
        }
    }

    /// Corners as true `(lat, lon)`, in the order of [`DomainCorners::points`].
    pub fn geographic_corners(&self) -> Result<[(f64, f64); 4]> {
        let pole = rotated_pole(&self.coord_system()?)?;
        let corners = self.corners();
        debug!(?corners, "Unrotating domain corners");
        Ok(corners.points().map(|(lat, lon)| pole.to_regular(lat, lon)))
    }
}
