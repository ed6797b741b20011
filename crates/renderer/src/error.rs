//! Error types for the renderer crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Unknown color map: {0}")]
    UnknownColorMap(String),

    #[error("Invalid image dimensions {width}x{height} for {len} values")]
    InvalidDimensions {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] std::io::Error),
}
