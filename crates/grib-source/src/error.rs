//! Error types for the HTTP GRIB2 source.

use nwp_common::FrameError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Malformed inventory line {line}: {content}")]
    Inventory { line: usize, content: String },

    #[error("GRIB2 decode failed: {0}")]
    Decode(String),
}

impl From<SourceError> for FrameError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Http(_) | SourceError::Status { .. } => {
                FrameError::NotYetAvailable(err.to_string())
            }
            SourceError::Inventory { .. } | SourceError::Decode(_) => {
                FrameError::Computation(err.to_string())
            }
        }
    }
}
