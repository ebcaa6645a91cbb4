//! Common types shared across the climate grid tools.
//!
//! The central type is [`Cube`], an N-dimensional data array with named
//! coordinates and a [`CoordSystem`] tag. Time coordinates are interpreted
//! through the calendar-aware types in [`time`], and Unified Model file
//! naming and diagnostic codes live in [`umdates`] and [`umstash`].

pub mod bbox;
pub mod crs;
pub mod cube;
pub mod error;
pub mod time;
pub mod umdates;
pub mod umstash;

pub use bbox::LatLonBox;
pub use crs::{Axis, CoordSystem};
pub use cube::{AuxCoord, Coord, Cube, DimCoord};
pub use error::{CubeError, CubeResult};
pub use time::{
    months_name, Calendar, DateRange, Granularity, ModelDateTime, Season, TimeUnit, TimeUnits,
};
pub use umdates::{from_um_stamp, to_um_stamp, um_file_list, StampFormat, UmStream};
pub use umstash::{um_stash_to_msi, StashCode};
