//! PNG encoding for RGBA frame data.
//!
//! Images with at most 256 distinct colors (every stepped ramp and most
//! smoothed fields after quantisation) are written as indexed PNG (color
//! type 3); anything else falls back to RGBA (color type 6). Text metadata
//! goes ahead of the image data: Latin-1 values as `tEXt`, anything else as
//! uncompressed UTF-8 `iTXt`.

use std::collections::HashMap;
use std::io::Write;

use rayon::prelude::*;

use crate::error::RenderError;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

/// Rows per rayon task when building the palette index buffer.
const ROWS_PER_TASK: usize = 64;

type Rgba = [u8; 4];

/// An RGBA image ready to be encoded.
pub struct PngImage<'a> {
    pixels: &'a [u8],
    width: usize,
    height: usize,
    text: Vec<(String, String)>,
}

impl<'a> PngImage<'a> {
    pub fn new(pixels: &'a [u8], width: usize, height: usize) -> Self {
        Self {
            pixels,
            width,
            height,
            text: Vec::new(),
        }
    }

    /// Attach text entries. Keywords must be 1-79 ASCII characters; invalid
    /// keywords are skipped.
    pub fn with_text(mut self, entries: &[(&str, &str)]) -> Self {
        for (keyword, value) in entries {
            if !keyword.is_empty() && keyword.len() < 80 && keyword.is_ascii() && !keyword.contains('\0') {
                self.text.push((keyword.to_string(), value.replace('\0', " ")));
            }
        }
        self
    }

    /// Encode, picking indexed color when the palette fits.
    pub fn encode(&self) -> Result<Vec<u8>, RenderError> {
        if self.pixels.len() != self.width * self.height * 4 {
            return Err(RenderError::InvalidDimensions {
                width: self.width,
                height: self.height,
                len: self.pixels.len() / 4,
            });
        }

        match build_palette(self.pixels, self.width) {
            Some((palette, indices)) => self.encode_indexed(&palette, &indices),
            None => self.encode_rgba(),
        }
    }

    /// Encode as 8-bit RGBA regardless of color count.
    pub fn encode_rgba(&self) -> Result<Vec<u8>, RenderError> {
        let mut png = Vec::with_capacity(self.pixels.len() / 2);
        png.extend_from_slice(&SIGNATURE);
        write_chunk(&mut png, b"IHDR", &ihdr(self.width, self.height, 6));
        self.write_text(&mut png);

        let idat = deflate_scanlines(self.pixels, self.width * 4, self.height)?;
        write_chunk(&mut png, b"IDAT", &idat);
        write_chunk(&mut png, b"IEND", &[]);
        Ok(png)
    }

    fn encode_indexed(&self, palette: &[Rgba], indices: &[u8]) -> Result<Vec<u8>, RenderError> {
        let mut png = Vec::with_capacity(indices.len() / 2);
        png.extend_from_slice(&SIGNATURE);
        write_chunk(&mut png, b"IHDR", &ihdr(self.width, self.height, 3));

        let plte: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
        write_chunk(&mut png, b"PLTE", &plte);

        if palette.iter().any(|c| c[3] < 255) {
            let trns: Vec<u8> = palette.iter().map(|c| c[3]).collect();
            write_chunk(&mut png, b"tRNS", &trns);
        }
        self.write_text(&mut png);

        let idat = deflate_scanlines(indices, self.width, self.height)?;
        write_chunk(&mut png, b"IDAT", &idat);
        write_chunk(&mut png, b"IEND", &[]);
        Ok(png)
    }

    fn write_text(&self, png: &mut Vec<u8>) {
        for (keyword, value) in &self.text {
            let mut data = Vec::with_capacity(keyword.len() + 5 + value.len());
            data.extend_from_slice(keyword.as_bytes());
            data.push(0);
            match latin1(value) {
                Some(bytes) => {
                    data.extend_from_slice(&bytes);
                    write_chunk(png, b"tEXt", &data);
                }
                None => {
                    // Uncompressed, no language tag, no translated keyword.
                    data.extend_from_slice(&[0, 0, 0, 0]);
                    data.extend_from_slice(value.as_bytes());
                    write_chunk(png, b"iTXt", &data);
                }
            }
        }
    }
}

/// `text` as ISO 8859-1 bytes, or `None` if any character falls outside it.
fn latin1(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|c| u8::try_from(c).ok()).collect()
}

fn ihdr(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&(width as u32).to_be_bytes());
    data.extend_from_slice(&(height as u32).to_be_bytes());
    data.push(8); // bit depth
    data.push(color_type);
    data.push(0); // compression method
    data.push(0); // filter method
    data.push(0); // interlace method
    data
}

/// Distinct colors in first-seen order plus one palette index per pixel, or
/// `None` when there are more than 256 colors.
fn build_palette(pixels: &[u8], width: usize) -> Option<(Vec<Rgba>, Vec<u8>)> {
    let mut lookup: HashMap<Rgba, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Vec<Rgba> = Vec::with_capacity(MAX_PALETTE_SIZE);

    for chunk in pixels.chunks_exact(4) {
        let color = [chunk[0], chunk[1], chunk[2], chunk[3]];
        if !lookup.contains_key(&color) {
            if palette.len() >= MAX_PALETTE_SIZE {
                return None;
            }
            lookup.insert(color, palette.len() as u8);
            palette.push(color);
        }
    }

    let row_bytes = (width * 4).max(4);
    let indices: Vec<u8> = pixels
        .par_chunks(row_bytes * ROWS_PER_TASK)
        .flat_map_iter(|block| {
            block
                .chunks_exact(4)
                .map(|c| lookup.get(&[c[0], c[1], c[2], c[3]]).copied().unwrap_or(0))
                .collect::<Vec<u8>>()
        })
        .collect();

    Some((palette, indices))
}

/// Prefix each scanline with filter type 0 and zlib-compress.
fn deflate_scanlines(data: &[u8], row_len: usize, height: usize) -> Result<Vec<u8>, RenderError> {
    let mut raw = Vec::with_capacity(height * (row_len + 1));
    for row in data.chunks_exact(row_len.max(1)).take(height) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk chunks after the signature, returning (type, data) pairs.
    fn chunks(png: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        let mut pos = 8;
        while pos + 8 <= png.len() {
            let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
            let kind = String::from_utf8_lossy(&png[pos + 4..pos + 8]).to_string();
            out.push((kind, png[pos + 8..pos + 8 + len].to_vec()));
            pos += 12 + len;
        }
        out
    }

    #[test]
    fn test_palette_first_seen_order() {
        let pixels = [
            255, 0, 0, 255, //
            0, 255, 0, 255, //
            255, 0, 0, 255, //
            0, 0, 0, 0,
        ];
        let (palette, indices) = build_palette(&pixels, 2).unwrap();
        assert_eq!(palette.len(), 3);
        assert_eq!(indices, vec![0, 1, 0, 2]);
    }

    #[test]
    fn test_palette_overflow() {
        let pixels: Vec<u8> = (0..300u32)
            .flat_map(|i| [(i % 256) as u8, (i / 256) as u8, 7, 255])
            .collect();
        assert!(build_palette(&pixels, 300).is_none());
    }

    #[test]
    fn test_indexed_with_transparency_and_text() {
        let pixels = [255, 0, 0, 255, 0, 0, 0, 0];
        let png = PngImage::new(&pixels, 2, 1)
            .with_text(&[("Title", "HRRR Temperature"), ("", "dropped")])
            .encode()
            .unwrap();

        assert_eq!(&png[0..8], &SIGNATURE);
        let kinds: Vec<String> = chunks(&png).into_iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec!["IHDR", "PLTE", "tRNS", "tEXt", "IDAT", "IEND"]);

        let text = chunks(&png).into_iter().find(|(k, _)| k == "tEXt").unwrap().1;
        assert_eq!(text, b"Title\0HRRR Temperature".to_vec());
    }

    #[test]
    fn test_text_is_latin1_or_itxt() {
        let pixels = [0, 0, 255, 255];
        let png = PngImage::new(&pixels, 1, 1)
            .with_text(&[("Title", "Temperature (°F)"), ("Comment", "Température 2 m → °F")])
            .encode()
            .unwrap();
        let chunks = chunks(&png);

        let text = &chunks.iter().find(|(k, _)| k == "tEXt").unwrap().1;
        let mut expected = b"Title\0Temperature (".to_vec();
        expected.extend_from_slice(&[0xB0, b'F', b')']);
        assert_eq!(text, &expected);

        let itxt = &chunks.iter().find(|(k, _)| k == "iTXt").unwrap().1;
        let mut expected = b"Comment\0\0\0\0\0".to_vec();
        expected.extend_from_slice("Température 2 m → °F".as_bytes());
        assert_eq!(itxt, &expected);
    }

    #[test]
    fn test_rgba_fallback_color_type() {
        let pixels: Vec<u8> = (0..300u32)
            .flat_map(|i| [(i % 256) as u8, (i / 256) as u8, 7, 255])
            .collect();
        let png = PngImage::new(&pixels, 300, 1).encode().unwrap();
        let ihdr = &chunks(&png)[0].1;
        assert_eq!(ihdr[9], 6);
    }

    #[test]
    fn test_rejects_wrong_buffer_length() {
        let pixels = [0u8; 12];
        assert!(PngImage::new(&pixels, 2, 2).encode().is_err());
    }

    #[test]
    fn test_crc_matches_crc32fast() {
        let png = PngImage::new(&[1, 2, 3, 255], 1, 1).encode().unwrap();
        // IEND chunk CRC is fixed.
        assert_eq!(&png[png.len() - 4..], &crc32fast::hash(b"IEND").to_be_bytes());
    }
}
