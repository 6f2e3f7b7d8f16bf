//! Error types for loading, backend selection and ray queries.

use thiserror::Error;

use crate::backend::Backend;

/// Errors raised by the ray casting engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RaytraceError {
    /// The shape has no usable mesh and could not be tessellated.
    #[error("shape has no usable tessellation: {0}")]
    UntessellatedShape(String),

    /// The requested backend is not compiled in or not supported by the CPU.
    #[error("backend `{0}` is not available in this build or on this hardware")]
    UnsupportedBackend(Backend),

    /// A backend name that matches no known backend.
    #[error("unknown backend `{0}` (expected scalar, accelerated, simd4 or simd8)")]
    UnknownBackend(String),

    /// Zero-length direction, non-finite input, or an inverted clamp window.
    #[error("invalid ray: {0}")]
    InvalidRay(String),

    /// A query was issued before any successful load.
    #[error("no shape loaded")]
    NotLoaded,

    /// Invalid configuration or rendering parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Batch input arrays of different lengths.
    #[error("batch has {origins} origins but {directions} directions")]
    BatchShape {
        /// Number of origins supplied.
        origins: usize,
        /// Number of directions supplied.
        directions: usize,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, RaytraceError>;
