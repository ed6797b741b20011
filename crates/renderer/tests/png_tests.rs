//! Tests for PNG encoding of rendered frames.
//!
//! Covers:
//! - Indexed vs RGBA selection
//! - tEXt metadata placement
//! - Size behaviour on forecast-like data

use renderer::png::PngImage;
use renderer::render_png;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

// ============================================================================
// Helper functions
// ============================================================================

/// Chunk types in file order.
fn chunk_types(png: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut pos = 8;
    while pos + 8 <= png.len() {
        let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
        out.push(String::from_utf8_lossy(&png[pos + 4..pos + 8]).to_string());
        pos += 12 + len;
    }
    out
}

/// Color type byte from the IHDR chunk.
fn color_type(png: &[u8]) -> u8 {
    png[8 + 8 + 9]
}

/// Banded temperature-like pixels with `bands` distinct colors.
fn banded_pixels(width: usize, height: usize, bands: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            let band = ((x + y) * bands / (width + height)).min(bands - 1);
            pixels.extend_from_slice(&[(band * 10) as u8, 128, 255 - band as u8, 255]);
        }
    }
    pixels
}

// ============================================================================
// Format selection
// ============================================================================

#[test]
fn test_indexed_for_few_colors() {
    let pixels = banded_pixels(64, 32, 12);
    let png = PngImage::new(&pixels, 64, 32).encode().unwrap();

    assert_eq!(&png[0..8], &SIGNATURE);
    assert_eq!(color_type(&png), 3);
    assert!(chunk_types(&png).contains(&"PLTE".to_string()));
    // All opaque: no transparency chunk.
    assert!(!chunk_types(&png).contains(&"tRNS".to_string()));
}

#[test]
fn test_rgba_when_palette_overflows() {
    let mut pixels = Vec::with_capacity(400 * 4);
    for i in 0..400usize {
        pixels.extend_from_slice(&[(i % 256) as u8, (i / 256) as u8, 0, 255]);
    }
    let png = PngImage::new(&pixels, 20, 20).encode().unwrap();
    assert_eq!(color_type(&png), 6);
}

#[test]
fn test_indexed_smaller_than_rgba() {
    let pixels = banded_pixels(256, 256, 20);
    let image = PngImage::new(&pixels, 256, 256);

    let indexed = image.encode().unwrap();
    let rgba = image.encode_rgba().unwrap();
    assert!(
        indexed.len() < rgba.len(),
        "Indexed PNG ({} bytes) should be smaller than RGBA ({} bytes)",
        indexed.len(),
        rgba.len()
    );
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn test_text_chunks_precede_image_data() {
    let pixels = banded_pixels(8, 8, 3);
    let png = PngImage::new(&pixels, 8, 8)
        .with_text(&[("Title", "GFS 2m Temperature"), ("Model", "gfs")])
        .encode()
        .unwrap();

    let types = chunk_types(&png);
    let first_text = types.iter().position(|t| t == "tEXt").unwrap();
    let idat = types.iter().position(|t| t == "IDAT").unwrap();
    assert_eq!(types.iter().filter(|t| *t == "tEXt").count(), 2);
    assert!(first_text < idat);
    assert_eq!(types.last().map(String::as_str), Some("IEND"));
}

// ============================================================================
// End-to-end rasterisation
// ============================================================================

#[test]
fn test_reflectivity_frame_is_indexed_with_transparency() {
    // Half clear air, half convection.
    let data: Vec<f32> = (0..100).map(|i| if i < 50 { 0.0 } else { 45.0 }).collect();
    let png = render_png(&data, 10, 10, "nws_reflectivity", (0.0, 70.0), false, &[]).unwrap();

    assert_eq!(color_type(&png), 3);
    assert!(chunk_types(&png).contains(&"tRNS".to_string()));
}

#[test]
fn test_nan_only_grid_still_encodes() {
    let data = vec![f32::NAN; 16];
    let png = render_png(&data, 4, 4, "turbo", (0.0, 1.0), true, &[]).unwrap();
    assert_eq!(&png[0..8], &SIGNATURE);
}
