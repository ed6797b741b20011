//! Error types for per-frame work.
//!
//! Every failure below the model level is local: it is logged once with its
//! kind and then dropped, so one variable, hour or model never takes down a
//! sibling unit of work.

use thiserror::Error;

/// Result type alias using FrameError.
pub type FrameResult<T> = Result<T, FrameError>;

/// Classification of a local failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameErrorKind {
    NotYetAvailable,
    EmptyResult,
    ComputationFailure,
    RenderFailure,
}

impl FrameErrorKind {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotYetAvailable => "not_yet_available",
            Self::EmptyResult => "empty_result",
            Self::ComputationFailure => "computation_failure",
            Self::RenderFailure => "render_failure",
        }
    }
}

/// Failure of one probe, fetch, derivation or render.
#[derive(Debug, Clone, Error)]
pub enum FrameError {
    /// Upstream has no data for the request (includes transport failures,
    /// which are not retried within an invocation).
    #[error("Data not yet available: {0}")]
    NotYetAvailable(String),

    #[error("No fields returned for selector: {0}")]
    EmptyResult(String),

    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("Rendering failed: {0}")]
    Render(String),
}

impl FrameError {
    pub fn kind(&self) -> FrameErrorKind {
        match self {
            FrameError::NotYetAvailable(_) => FrameErrorKind::NotYetAvailable,
            FrameError::EmptyResult(_) => FrameErrorKind::EmptyResult,
            FrameError::Computation(_) => FrameErrorKind::ComputationFailure,
            FrameError::Render(_) => FrameErrorKind::RenderFailure,
        }
    }

    pub fn is_not_available(&self) -> bool {
        matches!(self, FrameError::NotYetAvailable(_))
    }
}
