use thiserror::Error;

/// Universal error type for the processing pipeline.
///
/// Degenerate-but-valid outcomes (an empty mask, a zero-triangle mesh) are
/// *not* errors; they propagate as ordinary values so callers can report
/// "no matching region" instead of failing.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A parameter failed validation before any processing started
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An ROI or index region lies outside the volume grid
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// A probe point lies outside the volume's physical extent
    #[error("point outside the physical volume bounds")]
    OutOfRange,

    /// A statistics region selects no voxels, or a probe hit an empty mesh
    #[error("region contains no voxels")]
    EmptyRegion,

    /// Export-time invariant violation
    #[error("mesh encoding failed: {0}")]
    Encoding(String),

    /// The run was superseded or cancelled before completion
    #[error("pipeline run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
