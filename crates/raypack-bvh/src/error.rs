//! Error types for the BVH kernel.

use thiserror::Error;

/// Errors that can occur while configuring or building an index.
///
/// The numeric core has no error paths; degenerate geometry and
/// transparent texels are handled by epsilon thresholds, not faults.
#[derive(Error, Debug)]
pub enum BvhError {
    /// Settings outside their valid range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Registry lookup for a builder name that was never registered.
    #[error("unknown builder: {0}")]
    UnknownBuilder(String),

    /// An entity produced a non-triangle primitive and no fallback
    /// builder is configured to take over.
    #[error("unsupported primitive and no fallback builder configured")]
    UnsupportedPrimitive,
}

/// Result type for BVH operations.
pub type Result<T> = std::result::Result<T, BvhError>;
