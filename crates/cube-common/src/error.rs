//! Error types for cube construction and metadata handling.

use thiserror::Error;

/// Result type alias using CubeError.
pub type CubeResult<T> = Result<T, CubeError>;

/// Primary error type for cube, coordinate and time operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CubeError {
    // === Coordinate Errors ===
    #[error("Missing coordinate '{name}', available coordinates are: {available:?}")]
    MissingCoordinate { name: String, available: Vec<String> },

    #[error("Coordinate '{coord}' has no bounds")]
    MissingBounds { coord: String },

    #[error("Cannot infer bounds for '{coord}': {reason}")]
    AmbiguousBounds { coord: String, reason: String },

    #[error("Shape mismatch for '{context}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Cube already has coordinate system {existing}, cannot attach {requested}")]
    CoordSystemConflict { existing: String, requested: String },

    // === Parameter Errors ===
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Time Errors ===
    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Invalid UM date stamp '{stamp}': {message}")]
    InvalidDateStamp { stamp: String, message: String },

    #[error("Invalid STASH code '{code}': {message}")]
    InvalidStashCode { code: String, message: String },
}

impl CubeError {
    /// Create a MissingCoordinate error listing what the cube does have.
    pub fn missing_coordinate(name: impl Into<String>, available: Vec<String>) -> Self {
        Self::MissingCoordinate {
            name: name.into(),
            available,
        }
    }

    /// Create an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an AmbiguousBounds error.
    pub fn ambiguous_bounds(coord: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AmbiguousBounds {
            coord: coord.into(),
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

    /// Create an InvalidDateStamp error.
    pub fn invalid_date_stamp(stamp: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDateStamp {
            stamp: stamp.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidStashCode error.
    pub fn invalid_stash_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStashCode {
            code: code.into(),
            message: message.into(),
        }
    }
}
