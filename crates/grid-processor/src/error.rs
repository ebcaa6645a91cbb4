//! Error types for grid processing.

use cube_common::CubeError;
use projection::ProjectionError;
use thiserror::Error;

/// Errors that can occur during grid processing.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// Cube structure problem (missing coordinate, bad shape, ...).
    #[error(transparent)]
    Cube(#[from] CubeError),

    /// Coordinate transform failure.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// Rim width that cannot be removed from the grid.
    #[error("invalid rim width {width}: {reason}")]
    InvalidWidth { width: usize, reason: String },

    /// Data or grid shape does not match what an operation was built for.
    #[error("shape mismatch for {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// The requested region is outside the grid bounds.
    #[error("requested region {requested} is outside grid bounds {grid}")]
    OutOfBounds { requested: String, grid: String },

    /// Source and target grids cannot be combined.
    #[error("incompatible coordinate systems: {0}")]
    IncompatibleCoordSystem(String),

    /// An operation that needs a rotated-pole cube got something else.
    #[error("cube is not on a rotated pole: {0}")]
    NotRotated(String),

    /// Input units differ from what a calculation expects.
    #[error("{name} has units '{actual}', expected '{expected}'")]
    UnitMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Target point outside the source domain in error mode.
    #[error("extrapolation required: {0}")]
    Extrapolation(String),

    /// Invalid operation parameter.
    #[error("invalid parameter '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl GridProcessorError {
    /// Create an OutOfBounds error.
    pub fn out_of_bounds(requested: impl Into<String>, grid: impl Into<String>) -> Self {
        Self::OutOfBounds {
            requested: requested.into(),
            grid: grid.into(),
        }
    }

    /// Create an InvalidWidth error.
    pub fn invalid_width(width: usize, reason: impl Into<String>) -> Self {
        Self::InvalidWidth {
            width,
            reason: reason.into(),
        }
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(context: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create a UnitMismatch error.
    pub fn unit_mismatch(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::UnitMismatch {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for GridProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<serde_yaml::Error> for GridProcessorError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
