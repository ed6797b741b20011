//! Image rendering for forecast frames.
//!
//! Implements:
//! - Named color ramps (`colormap`)
//! - Gradient rasterisation and light smoothing (`gradient`)
//! - PNG encoding with text metadata (`png`)

pub mod colormap;
pub mod error;
pub mod gradient;
pub mod png;

pub use colormap::ColorMap;
pub use error::RenderError;
pub use gradient::Color;

/// Rasterise a north-up, row-major grid with a named color ramp and encode it
/// as PNG.
///
/// NaN values are transparent. `text` entries are stored as `tEXt` chunks.
pub fn render_png(
    data: &[f32],
    width: usize,
    height: usize,
    color_map: &str,
    range: (f32, f32),
    smooth: bool,
    text: &[(&str, &str)],
) -> Result<Vec<u8>, RenderError> {
    if width == 0 || height == 0 || data.len() != width * height {
        return Err(RenderError::InvalidDimensions {
            width,
            height,
            len: data.len(),
        });
    }

    let ramp = ColorMap::by_name(color_map)
        .ok_or_else(|| RenderError::UnknownColorMap(color_map.to_string()))?;

    let smoothed;
    let data = if smooth {
        smoothed = gradient::smooth_grid(data, width, height, gradient::DEFAULT_SMOOTHING_SIGMA);
        &smoothed
    } else {
        data
    };

    let pixels = gradient::render_grid(data, width, height, range.0, range.1, |norm| {
        ramp.color_at(norm)
    });

    png::PngImage::new(&pixels, width, height)
        .with_text(text)
        .encode()
}
