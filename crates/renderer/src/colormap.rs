//! Named color ramps.
//!
//! Ramps are defined as color stops over the normalized 0-1 range, either
//! interpolated (continuous fields) or stepped (radar reflectivity).

use crate::gradient::{interpolate_color, Color};

/// Interpolation between stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
}

#[derive(Debug, Clone)]
pub struct ColorMap {
    pub name: &'static str,
    stops: Vec<(f32, Color)>,
    interpolation: Interpolation,
}

const TURBO: &[(f32, &str)] = &[
    (0.00, "#30123b"),
    (0.10, "#4662d7"),
    (0.20, "#36aaf9"),
    (0.30, "#1ae4b6"),
    (0.40, "#72fe5e"),
    (0.50, "#c8ef34"),
    (0.60, "#faba39"),
    (0.70, "#f66b19"),
    (0.80, "#d23105"),
    (0.90, "#a11201"),
    (1.00, "#7a0403"),
];

const VIRIDIS: &[(f32, &str)] = &[
    (0.00, "#440154"),
    (0.25, "#3b528b"),
    (0.50, "#21918c"),
    (0.75, "#5ec962"),
    (1.00, "#fde725"),
];

const BLUES: &[(f32, &str)] = &[
    (0.00, "#f7fbff00"),
    (0.02, "#deebf7"),
    (0.25, "#9ecae1"),
    (0.50, "#4292c6"),
    (0.75, "#2171b5"),
    (1.00, "#08306b"),
];

const GRAYSCALE: &[(f32, &str)] = &[(0.0, "#000000"), (1.0, "#ffffff")];

/// NWS reflectivity palette on a 0-70 dBZ scale, 5 dBZ bins; below 5 dBZ clear.
const NWS_REFLECTIVITY: &[(f32, &str)] = &[
    (0.0, "#00000000"),
    (5.0, "#04e9e7"),
    (10.0, "#019ff4"),
    (15.0, "#0300f4"),
    (20.0, "#02fd02"),
    (25.0, "#01c501"),
    (30.0, "#008e00"),
    (35.0, "#fdf802"),
    (40.0, "#e5bc00"),
    (45.0, "#fd9500"),
    (50.0, "#fd0000"),
    (55.0, "#d40000"),
    (60.0, "#bc0000"),
    (65.0, "#f800fd"),
    (70.0, "#9854c6"),
];
const NWS_REFLECTIVITY_MAX_DBZ: f32 = 70.0;

impl ColorMap {
    /// Names accepted by [`ColorMap::by_name`].
    pub const NAMES: [&'static str; 5] = ["turbo", "viridis", "blues", "grayscale", "nws_reflectivity"];

    /// Look up a ramp by id (case-insensitive).
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "turbo" => Some(Self::linear("turbo", TURBO)),
            "viridis" => Some(Self::linear("viridis", VIRIDIS)),
            "blues" => Some(Self::linear("blues", BLUES)),
            "grayscale" | "greys" => Some(Self::linear("grayscale", GRAYSCALE)),
            "nws_reflectivity" | "pyart_nwsref" => Some(Self {
                name: "nws_reflectivity",
                stops: parse_stops(NWS_REFLECTIVITY, NWS_REFLECTIVITY_MAX_DBZ),
                interpolation: Interpolation::Step,
            }),
            _ => None,
        }
    }

    fn linear(name: &'static str, stops: &[(f32, &str)]) -> Self {
        Self {
            name,
            stops: parse_stops(stops, 1.0),
            interpolation: Interpolation::Linear,
        }
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Color for a normalized value in 0-1.
    pub fn color_at(&self, norm: f32) -> Color {
        let norm = norm.clamp(0.0, 1.0);
        let Some(&(first_pos, first_color)) = self.stops.first() else {
            return Color::transparent();
        };
        if norm <= first_pos {
            return first_color;
        }

        for pair in self.stops.windows(2) {
            let (lo_pos, lo_color) = pair[0];
            let (hi_pos, hi_color) = pair[1];
            if norm < hi_pos {
                return match self.interpolation {
                    Interpolation::Step => lo_color,
                    Interpolation::Linear => {
                        interpolate_color(lo_color, hi_color, (norm - lo_pos) / (hi_pos - lo_pos))
                    }
                };
            }
        }

        self.stops
            .last()
            .map(|&(_, color)| color)
            .unwrap_or_else(Color::transparent)
    }
}

fn parse_stops(stops: &[(f32, &str)], scale: f32) -> Vec<(f32, Color)> {
    stops
        .iter()
        .filter_map(|(pos, hex)| Color::from_hex(hex).map(|c| (pos / scale, c)))
        .collect()
}
