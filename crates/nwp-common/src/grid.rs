//! Grid and field containers for decoded model output.

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, FrameResult};

/// Shape and point ordering of a decoded GRIB2 grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    /// Number of points in X direction
    pub nx: usize,
    /// Number of points in Y direction
    pub ny: usize,
    pub scan: ScanMode,
}

impl Grid {
    pub fn new(nx: usize, ny: usize, scan: ScanMode) -> Self {
        Self { nx, ny, scan }
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0
    }
}

/// Scan mode flags for grid data ordering.
///
/// Based on GRIB2 scanning mode (Flag Table 3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMode {
    /// +i direction: false = +x (east), true = -x (west)
    pub i_negative: bool,
    /// +j direction: false = -y (south), true = +y (north)
    pub j_positive: bool,
    /// Adjacent points: false = i direction, true = j direction
    pub j_consecutive: bool,
}

impl ScanMode {
    /// Rows west to east, first row northernmost.
    pub fn north_first() -> Self {
        Self {
            i_negative: false,
            j_positive: false,
            j_consecutive: false,
        }
    }

    /// Rows west to east, first row southernmost (NCEP regional grids).
    pub fn south_first() -> Self {
        Self {
            i_negative: false,
            j_positive: true,
            j_consecutive: false,
        }
    }

    /// Create from GRIB2 flag byte.
    pub fn from_grib2_flag(flag: u8) -> Self {
        Self {
            i_negative: (flag & 0x80) != 0,
            j_positive: (flag & 0x40) != 0,
            j_consecutive: (flag & 0x20) != 0,
        }
    }
}

impl Default for ScanMode {
    fn default() -> Self {
        Self::north_first()
    }
}

/// One decoded 2D field. Values are in the grid's native order; NaN marks
/// missing points.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub grid: Grid,
    pub values: Vec<f32>,
}

impl Field {
    /// Build a field, rejecting value buffers that do not fill the grid.
    pub fn new(grid: Grid, values: Vec<f32>) -> FrameResult<Self> {
        if values.len() != grid.len() {
            return Err(FrameError::Computation(format!(
                "grid {}x{} expects {} values, got {}",
                grid.nx,
                grid.ny,
                grid.len(),
                values.len()
            )));
        }
        Ok(Self { grid, values })
    }

    /// Apply a point-wise transform, keeping the grid.
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            grid: self.grid,
            values: self.values.into_iter().map(f).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns values in north-up, west-to-east row-major order.
    pub fn north_up_rows(&self) -> Vec<f32> {
        let Grid { nx, ny, scan } = self.grid;
        let mut out = Vec::with_capacity(nx * ny);
        for row in 0..ny {
            let j = if scan.j_positive { ny - 1 - row } else { row };
            for col in 0..nx {
                let i = if scan.i_negative { nx - 1 - col } else { col };
                let idx = if scan.j_consecutive { i * ny + j } else { j * nx + i };
                out.push(self.values.get(idx).copied().unwrap_or(f32::NAN));
            }
        }
        out
    }
}

/// Check that all fields share one grid.
pub fn ensure_aligned(fields: &[&Field]) -> FrameResult<Grid> {
    let first = fields
        .first()
        .ok_or_else(|| FrameError::Computation("no fields to align".to_string()))?;
    for field in &fields[1..] {
        if field.grid != first.grid {
            return Err(FrameError::Computation(format!(
                "incompatible grids {}x{} and {}x{}",
                first.grid.nx, first.grid.ny, field.grid.nx, field.grid.ny
            )));
        }
    }
    Ok(first.grid)
}
