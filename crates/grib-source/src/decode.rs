//! Decoding a single GRIB2 message into a [`Field`].
//!
//! Values come from the `grib` crate; grid dimensions and scanning mode are
//! read straight from the grid definition section (section 3).

use std::io::Cursor;

use nwp_common::{Field, Grid, ScanMode};

use crate::error::SourceError;

/// Length of section 0 (indicator) in GRIB edition 2.
const INDICATOR_LEN: usize = 16;

/// Section 3 offsets (0-based, from the start of the section).
const TEMPLATE_NUMBER: usize = 12;
const NX: usize = 30;
const NY: usize = 34;
/// Scanning mode for lat/lon (3.0, 3.1) and Gaussian (3.40) grids.
const SCAN_LATLON: usize = 71;
/// Scanning mode for polar stereographic (3.20) and Lambert conformal (3.30).
const SCAN_PROJECTED: usize = 64;

/// Decode submessage `index` (0-based) of the first message in `bytes`.
///
/// Packed messages share one grid definition, so the grid is read from the
/// first section 3.
pub fn decode_message(bytes: &[u8], index: usize) -> Result<Field, SourceError> {
    let grid = read_grid(bytes)?;

    let file = grib::from_reader(Cursor::new(bytes))
        .map_err(|e| SourceError::Decode(e.to_string()))?;
    let (_, submessage) = file
        .iter()
        .find(|((message, sub), _)| *message == 0 && *sub == index)
        .ok_or_else(|| SourceError::Decode(format!("no submessage {} in GRIB2 data", index)))?;

    let decoder = grib::Grib2SubmessageDecoder::from(submessage)
        .map_err(|e| SourceError::Decode(e.to_string()))?;
    let values: Vec<f32> = decoder
        .dispatch()
        .map_err(|e| SourceError::Decode(e.to_string()))?
        .collect();

    Field::new(grid, values).map_err(|e| SourceError::Decode(e.to_string()))
}

/// Grid shape and scan order from the first message's section 3.
pub fn read_grid(bytes: &[u8]) -> Result<Grid, SourceError> {
    if bytes.len() < INDICATOR_LEN || &bytes[0..4] != b"GRIB" {
        return Err(SourceError::Decode("missing GRIB indicator".to_string()));
    }
    if bytes[7] != 2 {
        return Err(SourceError::Decode(format!(
            "unsupported GRIB edition {}",
            bytes[7]
        )));
    }

    let mut pos = INDICATOR_LEN;
    while pos + 5 <= bytes.len() {
        if &bytes[pos..pos + 4] == b"7777" {
            break;
        }
        let len = be_u32(bytes, pos).ok_or_else(truncated)? as usize;
        let number = bytes[pos + 4];
        if len < 5 || pos + len > bytes.len() {
            return Err(truncated());
        }
        if number == 3 {
            return grid_from_section(&bytes[pos..pos + len]);
        }
        pos += len;
    }

    Err(SourceError::Decode(
        "grid definition section not found".to_string(),
    ))
}

fn grid_from_section(section: &[u8]) -> Result<Grid, SourceError> {
    let template = be_u16(section, TEMPLATE_NUMBER).ok_or_else(truncated)?;
    let nx = be_u32(section, NX).ok_or_else(truncated)? as usize;
    let ny = be_u32(section, NY).ok_or_else(truncated)? as usize;

    let scan_offset = match template {
        0 | 1 | 40 => SCAN_LATLON,
        20 | 30 => SCAN_PROJECTED,
        other => {
            return Err(SourceError::Decode(format!(
                "unsupported grid template 3.{}",
                other
            )))
        }
    };
    let flag = *section.get(scan_offset).ok_or_else(truncated)?;

    if nx == 0 || ny == 0 {
        return Err(SourceError::Decode(format!("empty grid {}x{}", nx, ny)));
    }

    Ok(Grid::new(nx, ny, ScanMode::from_grib2_flag(flag)))
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn truncated() -> SourceError {
    SourceError::Decode("truncated GRIB2 message".to_string())
}

#[cfg(test)]
/// Lat/lon message with one constant-valued submessage (simple packing,
/// zero bits) per entry of `values`, all sharing one grid definition.
pub(crate) fn packed_message(nx: u32, ny: u32, values: &[f32]) -> Vec<u8> {
    let points = nx * ny;
    let mut body = Vec::new();

    let mut section1 = vec![0u8; 21];
    section1[0..4].copy_from_slice(&21u32.to_be_bytes());
    section1[4] = 1;
    body.extend_from_slice(&section1);

    let mut section3 = vec![0u8; 81];
    section3[0..4].copy_from_slice(&81u32.to_be_bytes());
    section3[4] = 3;
    section3[6..10].copy_from_slice(&points.to_be_bytes());
    section3[NX..NX + 4].copy_from_slice(&nx.to_be_bytes());
    section3[NY..NY + 4].copy_from_slice(&ny.to_be_bytes());
    body.extend_from_slice(&section3);

    for value in values {
        let mut section4 = vec![0u8; 34];
        section4[0..4].copy_from_slice(&34u32.to_be_bytes());
        section4[4] = 4;
        body.extend_from_slice(&section4);

        let mut section5 = vec![0u8; 21];
        section5[0..4].copy_from_slice(&21u32.to_be_bytes());
        section5[4] = 5;
        section5[5..9].copy_from_slice(&points.to_be_bytes());
        section5[11..15].copy_from_slice(&value.to_be_bytes());
        body.extend_from_slice(&section5);

        body.extend_from_slice(&[0, 0, 0, 6, 6, 255]);
        body.extend_from_slice(&[0, 0, 0, 5, 7]);
    }

    let total = (INDICATOR_LEN + body.len() + 4) as u64;
    let mut bytes = b"GRIB".to_vec();
    bytes.extend_from_slice(&[0, 0, 0, 2]);
    bytes.extend_from_slice(&total.to_be_bytes());
    bytes.extend_from_slice(&body);
    bytes.extend_from_slice(b"7777");
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Indicator + section 1 stub + section 3 with the given template.
    fn message(template: u16, nx: u32, ny: u32, scan: u8) -> Vec<u8> {
        let mut section3 = vec![0u8; 81];
        let section3_len = section3.len() as u32;
        section3[0..4].copy_from_slice(&section3_len.to_be_bytes());
        section3[4] = 3;
        section3[TEMPLATE_NUMBER..TEMPLATE_NUMBER + 2].copy_from_slice(&template.to_be_bytes());
        section3[NX..NX + 4].copy_from_slice(&nx.to_be_bytes());
        section3[NY..NY + 4].copy_from_slice(&ny.to_be_bytes());
        let scan_at = if template == 30 { SCAN_PROJECTED } else { SCAN_LATLON };
        section3[scan_at] = scan;

        let mut section1 = vec![0u8; 21];
        section1[0..4].copy_from_slice(&21u32.to_be_bytes());
        section1[4] = 1;

        let mut bytes = b"GRIB".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 2]);
        bytes.extend_from_slice(&[0u8; 8]);
        bytes.extend_from_slice(&section1);
        bytes.extend_from_slice(&section3);
        bytes.extend_from_slice(b"7777");
        bytes
    }

    #[test]
    fn test_decodes_requested_submessage() {
        let bytes = packed_message(3, 2, &[4.5, -2.0]);

        let u = decode_message(&bytes, 0).unwrap();
        assert_eq!((u.grid.nx, u.grid.ny), (3, 2));
        assert_eq!(u.values, vec![4.5; 6]);

        let v = decode_message(&bytes, 1).unwrap();
        assert_eq!(v.values, vec![-2.0; 6]);

        assert!(matches!(decode_message(&bytes, 2), Err(SourceError::Decode(_))));
    }

    #[test]
    fn test_latlon_grid() {
        let grid = read_grid(&message(0, 1440, 721, 0)).unwrap();
        assert_eq!(grid.nx, 1440);
        assert_eq!(grid.ny, 721);
        assert_eq!(grid.scan, ScanMode::north_first());
    }

    #[test]
    fn test_lambert_grid_south_first() {
        let grid = read_grid(&message(30, 1799, 1059, 0x40)).unwrap();
        assert_eq!((grid.nx, grid.ny), (1799, 1059));
        assert_eq!(grid.scan, ScanMode::south_first());
    }

    #[test]
    fn test_rejects_unknown_template() {
        assert!(read_grid(&message(90, 10, 10, 0)).is_err());
    }

    #[test]
    fn test_rejects_non_grib() {
        assert!(read_grid(b"not a grib message at all").is_err());
        let mut edition1 = message(0, 2, 2, 0);
        edition1[7] = 1;
        assert!(read_grid(&edition1).is_err());
    }

    #[test]
    fn test_rejects_truncated_section() {
        let mut bytes = message(0, 2, 2, 0);
        bytes.truncate(60);
        assert!(read_grid(&bytes).is_err());
    }
}
