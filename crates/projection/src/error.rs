//! Error types for coordinate transforms.

use thiserror::Error;

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Shape mismatch: {context} (left {left:?}, right {right:?})")]
    ShapeMismatch {
        context: String,
        left: Vec<usize>,
        right: Vec<usize>,
    },
}

impl ProjectionError {
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    pub fn shape_mismatch(context: impl Into<String>, left: &[usize], right: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }
}
