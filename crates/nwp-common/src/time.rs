//! Time handling for model runs and forecast frames.

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc};

/// Canonical string form of a run or valid time (`2024-01-15T12:00:00Z`).
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a canonical timestamp. Also accepts the `YYYY-MM-DD HH:MM` form
/// older status files used.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// Valid time of a forecast hour.
pub fn valid_time(run: &DateTime<Utc>, forecast_hour: u32) -> DateTime<Utc> {
    *run + Duration::hours(forecast_hour as i64)
}

/// Drop minutes, seconds and sub-seconds.
pub fn truncate_to_hour(t: &DateTime<Utc>) -> DateTime<Utc> {
    let naive = t
        .date_naive()
        .and_hms_opt(t.hour(), 0, 0)
        .unwrap_or_else(|| t.naive_utc());
    Utc.from_utc_datetime(&naive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_roundtrip() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let s = format_timestamp(&t);
        assert_eq!(s, "2024-01-15T12:00:00Z");
        assert_eq!(parse_timestamp(&s), Some(t));
    }

    #[test]
    fn test_parse_legacy_form() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-15 06:00"), Some(t));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_valid_time_crosses_day() {
        let run = Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap();
        assert_eq!(
            valid_time(&run, 12),
            Utc.with_ymd_and_hms(2024, 1, 16, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_truncate_to_hour() {
        let t = Utc.with_ymd_and_hms(2024, 1, 15, 18, 47, 31).unwrap();
        assert_eq!(
            truncate_to_hour(&t),
            Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap()
        );
    }
}
