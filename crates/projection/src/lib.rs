//! Coordinate transforms between regular and rotated-pole latitude/longitude.
//!
//! A rotated-pole grid is an ordinary latitude/longitude grid on a sphere
//! whose north pole has been moved to (`pole_latitude`, `pole_longitude`).
//! [`RotatedPole`] converts points in both directions and rotates
//! grid-relative wind vectors to true north.
//!
//! All angles are in degrees and longitudes are returned in `[-180, 180)`.

pub mod error;
pub mod rotated;

pub use error::{ProjectionError, Result};
pub use rotated::{normalize_longitude, to_regular, to_rotated, RotatedPole};
