//! Test data generators for creating synthetic model output.
//!
//! Grids are small and deterministic so expected conversions can be checked
//! point by point.

use nwp_common::{Field, Grid, ScanMode};

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0); // col=1, row=0
/// assert_eq!(grid[10], 1.0);   // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a temperature-like gradient in Kelvin, 250K (top-left) to about
/// 310K (bottom-right).
pub fn create_temperature_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x_factor = col as f32 / width.max(1) as f32;
            let y_factor = row as f32 / height.max(1) as f32;
            data.push(250.0 + (x_factor * 30.0) + (y_factor * 30.0));
        }
    }
    data
}

/// Creates a grid with every value equal to `value`.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid with NaN values at the given indices.
pub fn create_grid_with_nans(width: usize, height: usize, nan_indices: &[usize]) -> Vec<f32> {
    let mut data = create_test_grid(width, height);
    for &idx in nan_indices {
        if idx < data.len() {
            data[idx] = f32::NAN;
        }
    }
    data
}

/// North-first grid of the given shape.
pub fn test_grid(width: usize, height: usize) -> Grid {
    Grid::new(width, height, ScanMode::north_first())
}

/// Field with every point set to `value`.
pub fn constant_field(width: usize, height: usize, value: f32) -> Field {
    Field {
        grid: test_grid(width, height),
        values: create_constant_grid(width, height, value),
    }
}

/// Temperature gradient field in Kelvin.
pub fn temperature_field(width: usize, height: usize) -> Field {
    Field {
        grid: test_grid(width, height),
        values: create_temperature_grid(width, height),
    }
}
