//! Error types for shape construction and tessellation.

use thiserror::Error;

/// Errors raised by shapes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    /// The shape has no tessellator behind it.
    #[error("shape has no tessellation capability")]
    TessellationUnavailable,

    /// Deflection must be finite and strictly positive.
    #[error("invalid deflection {0}: must be finite and > 0")]
    InvalidDeflection(f64),

    /// Primitive dimensions must be finite and strictly positive.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),
}

/// Result type for shape operations.
pub type Result<T> = std::result::Result<T, ShapeError>;
