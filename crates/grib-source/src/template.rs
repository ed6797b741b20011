//! URL template expansion for model file locations.
//!
//! Supported placeholders:
//!
//! | Placeholder     | Expands to                         |
//! |-----------------|------------------------------------|
//! | `{date}`        | run date, `YYYYMMDD`               |
//! | `{cycle:02}`    | run hour, zero-padded              |
//! | `{forecast:02}` | forecast hour, at least 2 digits   |
//! | `{forecast:03}` | forecast hour, at least 3 digits   |
//! | `{member:02}`   | ensemble member (`00` when unset)  |
//! | `{product}`     | product / stream id                |
//! | `{model}`       | source model id                    |

use chrono::{DateTime, Timelike, Utc};

/// Values substituted into a URL template.
#[derive(Debug, Clone)]
pub struct TemplateVars<'a> {
    pub model: &'a str,
    pub product: &'a str,
    pub run: DateTime<Utc>,
    pub forecast_hour: u32,
    pub member: Option<u32>,
}

/// Expand every known placeholder; unknown placeholders are left untouched.
pub fn expand(template: &str, vars: &TemplateVars<'_>) -> String {
    template
        .replace("{date}", &vars.run.format("%Y%m%d").to_string())
        .replace("{cycle:02}", &format!("{:02}", vars.run.hour()))
        .replace("{forecast:02}", &format!("{:02}", vars.forecast_hour))
        .replace("{forecast:03}", &format!("{:03}", vars.forecast_hour))
        .replace("{member:02}", &format!("{:02}", vars.member.unwrap_or(0)))
        .replace("{product}", vars.product)
        .replace("{model}", vars.model)
}

/// Inventory location for a GRIB2 file URL.
pub fn idx_url(grib_url: &str) -> String {
    format!("{}.idx", grib_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vars(fxx: u32) -> TemplateVars<'static> {
        TemplateVars {
            model: "hrrr",
            product: "sfc",
            run: Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap(),
            forecast_hour: fxx,
            member: None,
        }
    }

    #[test]
    fn test_hrrr_template() {
        let url = expand(
            "https://noaa-hrrr-bdp-pds.s3.amazonaws.com/hrrr.{date}/conus/hrrr.t{cycle:02}z.wrf{product}f{forecast:02}.grib2",
            &vars(7),
        );
        assert_eq!(
            url,
            "https://noaa-hrrr-bdp-pds.s3.amazonaws.com/hrrr.20240115/conus/hrrr.t06z.wrfsfcf07.grib2"
        );
    }

    #[test]
    fn test_three_digit_forecast_and_member() {
        let mut v = vars(120);
        v.member = Some(3);
        let url = expand("gep{member:02}.t{cycle:02}z.f{forecast:03}/{forecast:02}", &v);
        assert_eq!(url, "gep03.t06z.f120/120");
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        assert_eq!(expand("{resolution}/{model}", &vars(0)), "{resolution}/hrrr");
    }

    #[test]
    fn test_idx_url() {
        assert_eq!(idx_url("https://x/y.grib2"), "https://x/y.grib2.idx");
    }
}
