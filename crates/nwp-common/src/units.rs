//! Unit conversions and derived surface quantities.

use serde::{Deserialize, Serialize};

/// Meters per second to miles per hour.
pub const MS_TO_MPH: f32 = 2.237;
/// Meters to inches.
pub const M_TO_IN: f32 = 39.3701;
/// Millimeters (kg m-2 of water) to inches.
pub const MM_TO_IN: f32 = 0.0393701;

/// Wind chill applies below this air temperature (°F).
pub const WIND_CHILL_MAX_TEMP_F: f32 = 50.0;
/// Wind chill applies above this wind speed (mph).
pub const WIND_CHILL_MIN_SPEED_MPH: f32 = 3.0;

/// Physical kind of a source field and therefore its display conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Kelvin, displayed in °F
    Temperature,
    /// m/s, displayed in mph
    Speed,
    /// meters, displayed in inches
    Depth,
    /// millimeters or kg m-2 of water, displayed in inches
    DepthMm,
    /// displayed as delivered
    Raw,
}

impl UnitKind {
    pub fn convert(&self, value: f32) -> f32 {
        match self {
            UnitKind::Temperature => kelvin_to_fahrenheit(value),
            UnitKind::Speed => value * MS_TO_MPH,
            UnitKind::Depth => value * M_TO_IN,
            UnitKind::DepthMm => value * MM_TO_IN,
            UnitKind::Raw => value,
        }
    }
}

pub fn kelvin_to_fahrenheit(k: f32) -> f32 {
    (k - 273.15) * 9.0 / 5.0 + 32.0
}

/// Wind speed from its components, in the components' unit.
pub fn wind_speed(u: f32, v: f32) -> f32 {
    u.hypot(v)
}

/// NWS wind chill (°F) where it applies, otherwise the air temperature
/// unchanged. There is no heat-index branch.
pub fn apparent_temperature(temp_f: f32, speed_mph: f32) -> f32 {
    if temp_f < WIND_CHILL_MAX_TEMP_F && speed_mph > WIND_CHILL_MIN_SPEED_MPH {
        let v = speed_mph.powf(0.16);
        35.74 + 0.6215 * temp_f - 35.75 * v + 0.4275 * temp_f * v
    } else {
        temp_f
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn test_freezing_point() {
        assert_eq!(kelvin_to_fahrenheit(273.15), 32.0);
        assert_eq!(UnitKind::Temperature.convert(273.15), 32.0);
    }

    #[test]
    fn test_speed_and_depth() {
        assert!(close(UnitKind::Speed.convert(1.0), 2.237, 1e-6));
        assert!(close(UnitKind::Depth.convert(1.0), 39.3701, 1e-4));
        assert!(close(UnitKind::DepthMm.convert(1000.0), 39.3701, 1e-3));
        assert_eq!(UnitKind::Raw.convert(42.5), 42.5);
    }

    #[test]
    fn test_wind_speed() {
        assert!(close(wind_speed(3.0, 4.0), 5.0, 1e-6));
        assert_eq!(wind_speed(0.0, 0.0), 0.0);
        // Converting the components first gives the same speed as converting the magnitude.
        let (u, v) = (UnitKind::Speed.convert(3.0), UnitKind::Speed.convert(4.0));
        assert!(close(wind_speed(u, v), 5.0 * MS_TO_MPH, 1e-5));
    }

    #[test]
    fn test_wind_chill_applies() {
        let feels = apparent_temperature(40.0, 10.0);
        let v = 10.0f32.powf(0.16);
        let expected = 35.74 + 0.6215 * 40.0 - 35.75 * v + 0.4275 * 40.0 * v;
        assert!(close(feels, expected, 1e-4), "got {feels}");
        // NWS chart value for 40°F at 10 mph
        assert!(close(feels, 33.6, 0.1), "got {feels}");
    }

    #[test]
    fn test_wind_chill_thresholds() {
        assert_eq!(apparent_temperature(60.0, 10.0), 60.0);
        assert_eq!(apparent_temperature(50.0, 10.0), 50.0);
        assert_eq!(apparent_temperature(20.0, 3.0), 20.0);
    }
}
