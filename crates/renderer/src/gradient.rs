//! Gradient/heatmap rasterisation for gridded forecast data.

/// Sigma (in grid cells) used when a recipe asks for smoothing.
pub const DEFAULT_SMOOTHING_SIGMA: f32 = 1.0;

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, 255)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;

    let mix = |a: u8, b: u8| ((a as f32 * t_inv) + (b as f32 * t)).round() as u8;
    Color::new(
        mix(color1.r, color2.r),
        mix(color1.g, color2.g),
        mix(color1.b, color2.b),
        mix(color1.a, color2.a),
    )
}

/// Render grid data as a gradient heatmap
///
/// # Arguments
/// - `data`: 2D grid of values (row-major order, first row at the top)
/// - `width`: Number of columns
/// - `height`: Number of rows
/// - `min_val`: Value mapped to the bottom of the ramp
/// - `max_val`: Value mapped to the top of the ramp
/// - `color_fn`: Function to convert a normalized value (0-1) to a color
///
/// # Returns
/// RGBA pixel data (4 bytes per pixel). NaN values stay transparent.
pub fn render_grid<F>(
    data: &[f32],
    width: usize,
    height: usize,
    min_val: f32,
    max_val: f32,
    color_fn: F,
) -> Vec<u8>
where
    F: Fn(f32) -> Color,
{
    let mut pixels = vec![0u8; width * height * 4];

    let range = max_val - min_val;
    let range = if range.abs() < 0.001 { 1.0 } else { range };

    for (idx, value) in data.iter().take(width * height).enumerate() {
        if value.is_nan() {
            continue;
        }
        let normalized = ((value - min_val) / range).clamp(0.0, 1.0);
        let color = color_fn(normalized);

        let pixel_idx = idx * 4;
        pixels[pixel_idx] = color.r;
        pixels[pixel_idx + 1] = color.g;
        pixels[pixel_idx + 2] = color.b;
        pixels[pixel_idx + 3] = color.a;
    }

    pixels
}

/// Separable Gaussian smoothing that ignores NaN cells.
///
/// Cells that are NaN in the input stay NaN in the output.
pub fn smooth_grid(data: &[f32], width: usize, height: usize, sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 || width == 0 || height == 0 {
        return data.to_vec();
    }

    let radius = (sigma * 3.0).ceil() as isize;
    let kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();

    let pass = |src: &[f32], horizontal: bool| -> Vec<f32> {
        let mut out = vec![f32::NAN; src.len()];
        for y in 0..height {
            for x in 0..width {
                let idx = y * width + x;
                if src[idx].is_nan() {
                    continue;
                }
                let mut sum = 0.0;
                let mut weight = 0.0;
                for (k, w) in kernel.iter().enumerate() {
                    let offset = k as isize - radius;
                    let (sx, sy) = if horizontal {
                        (x as isize + offset, y as isize)
                    } else {
                        (x as isize, y as isize + offset)
                    };
                    if sx < 0 || sy < 0 || sx >= width as isize || sy >= height as isize {
                        continue;
                    }
                    let v = src[sy as usize * width + sx as usize];
                    if !v.is_nan() {
                        sum += v * w;
                        weight += w;
                    }
                }
                out[idx] = if weight > 0.0 { sum / weight } else { f32::NAN };
            }
        }
        out
    };

    let horizontal = pass(data, true);
    pass(&horizontal, false)
}
