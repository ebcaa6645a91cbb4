//! Post-processing of gridded climate-model output.
//!
//! This crate works on [`cube_common::Cube`] values and covers the
//! geometry-heavy steps of a regional-model workflow:
//!
//! - **Metadata**: attach regular or rotated-pole coordinate systems, add
//!   true latitude/longitude auxiliary coordinates, guess bounds
//! - **Trimming**: strip the lateral-boundary rim and extract a geographic
//!   box from a rotated-pole grid
//! - **Regridding**: area-weighted, linear and nearest regridders built
//!   once per grid pair and reused through a caller-owned [`RegridderCache`]
//! - **Alignment**: common time periods, calendar-aligned date chunks and
//!   coordinate compatibility reports
//! - **Analysis**: seasonal time statistics, linear trends with confidence
//!   intervals, wind speed and direction, dewpoint temperature
//! - **Domains**: UM limited-area domain definitions as rotated-pole cubes
//!
//! # Architecture
//!
//! ```text
//! source cube ──► metadata ──► rim / extract ──┐
//!                                             ▼
//!            target cube ──► RegridderCache::get_or_build ──► Regridder::apply
//!                                             │
//!                                             ▼
//!                          align / seasonal / derived ──► result cubes
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{remove_rim, ProcessorConfig, RegridderCache};
//!
//! let config = ProcessorConfig::from_env();
//! let mut cache = RegridderCache::from_config(&config);
//!
//! for cube in monthly_cubes {
//!     let trimmed = remove_rim(&cube, config.rim_width)?;
//!     let regridded = cache.regrid(&trimmed, &target, &config.regrid_options())?;
//!     // ...
//! }
//! ```
//!
//! Every operation returns a new cube; inputs are never modified.

pub mod align;
pub mod cache;
pub mod config;
pub mod derived;
pub mod domain;
pub mod error;
pub mod extract;
pub mod metadata;
pub mod regrid;
pub mod rim;
pub mod seasonal;
pub mod stats;
pub mod types;

// Re-export commonly used types at crate root
pub use align::{
    common_time_period, compare_coordinates, compare_cubes, date_chunks, date_range,
    extract_common_time_period, extract_time_range, CompatibilityReport, CoordMismatch,
    CubeComparison, MismatchKind,
};
pub use cache::{RegridKey, RegridderCache};
pub use config::ProcessorConfig;
pub use derived::{dewpoint, unrotate_winds, wind_direction, wind_speed};
pub use domain::{DomainCorners, UmDomain};
pub use error::{GridProcessorError, Result};
pub use extract::{extract_box, extract_rotated_subset};
pub use metadata::{
    add_bounds, add_bounds_at, add_coord_system, add_regular_coord_system,
    add_rotated_coord_system, add_unrotated_aux_coords, rotated_pole,
};
pub use regrid::{
    area_weights, build_regridder, build_regridder_with, cell_areas, regrid_to_target,
    GridSignature, RegridOptions, Regridder,
};
pub use rim::{remove_configured_rim, remove_rim, RIM_REMOVED_ATTRIBUTE};
pub use seasonal::{add_time_coord_cats, default_seasons, seasonal_statistic, StatMetric};
pub use stats::{
    confidence_interval, linear_regress, time_trend, ConfidenceInterval, LinearFit, TimeTrend,
};
pub use types::{CacheStats, ExtrapolationMode, RegridMethod};
