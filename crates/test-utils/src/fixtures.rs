//! Common test fixtures: model definitions, recipes and catalogs that mirror
//! the shipped configuration at a size tests can reason about.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};

use nwp_common::catalog::AliasConfig;
use nwp_common::{
    DerivedWindGroup, FieldSelector, ModelCatalog, ModelDefinition, SourceEndpoint, UnitKind,
    VariableRecipe, VariableStyle,
};

/// Reference times used across tests.
pub mod time {
    /// Canonical form of [`super::reference_run`].
    pub const REFERENCE_RUN: &str = "2024-01-15T12:00:00Z";
}

/// `2024-01-15 12:00 UTC`.
pub fn reference_run() -> DateTime<Utc> {
    utc(2024, 1, 15, 12)
}

/// Shorthand for a whole-hour UTC timestamp.
pub fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid fixture time {year}-{month}-{day} {hour}"))
}

pub fn endpoint(name: &str, url_template: &str) -> SourceEndpoint {
    SourceEndpoint {
        name: name.to_string(),
        url_template: url_template.to_string(),
    }
}

fn selector(s: &str) -> FieldSelector {
    s.parse()
        .unwrap_or_else(|e| panic!("invalid fixture selector: {e}"))
}

fn style(label: &str, color_map: &str, min: f32, max: f32) -> VariableStyle {
    VariableStyle {
        label: label.to_string(),
        color_map: color_map.to_string(),
        min,
        max,
        smooth: false,
    }
}

/// Hourly model with a short horizon, hourly steps and two sources.
pub fn hourly_model(id: &str, max_forecast_hour: u32) -> ModelDefinition {
    ModelDefinition {
        id: id.to_string(),
        display_name: id.to_uppercase(),
        enabled: true,
        source_model: id.to_string(),
        product: "sfc".to_string(),
        step_hours: 1,
        max_forecast_hour,
        extended_max_forecast_hour: None,
        extended_cycles: Vec::new(),
        cycle_hours: 1,
        sources: vec![
            endpoint("aws", "https://aws.example/{model}.{date}/t{cycle:02}z.f{forecast:02}.grib2"),
            endpoint("nomads", "https://nomads.example/{model}.{date}/t{cycle:02}z.f{forecast:02}.grib2"),
        ],
        source_priority: vec!["aws".to_string(), "nomads".to_string()],
        ensemble_member: None,
        skip_variables: BTreeSet::new(),
        aliases: Vec::new(),
    }
}

/// Six-hourly model (GFS-like) stepping every `step_hours`.
pub fn six_hourly_model(id: &str, max_forecast_hour: u32, step_hours: u32) -> ModelDefinition {
    ModelDefinition {
        cycle_hours: 6,
        step_hours,
        product: "pgrb2.0p25".to_string(),
        ..hourly_model(id, max_forecast_hour)
    }
}

/// HRRR-like definition: hourly runs, 18 h, 48 h at synoptic cycles.
pub fn hrrr_model() -> ModelDefinition {
    ModelDefinition {
        display_name: "HRRR".to_string(),
        extended_max_forecast_hour: Some(48),
        extended_cycles: vec![0, 6, 12, 18],
        ..hourly_model("hrrr", 18)
    }
}

/// RRFS-like definition: snow is read from the water-equivalent field.
pub fn rrfs_model() -> ModelDefinition {
    let mut model = hourly_model("rrfs", 18);
    model.display_name = "RRFS".to_string();
    model.aliases = vec![AliasConfig {
        variable: "snow".to_string(),
        source: None,
        selector: selector("WEASD:surface"),
        units: Some(UnitKind::DepthMm),
    }];
    model
}

pub fn temp_recipe() -> VariableRecipe {
    VariableRecipe {
        key: "temp".to_string(),
        selector: selector("TMP:2 m above ground"),
        units: UnitKind::Temperature,
        accumulated: false,
        style: VariableStyle {
            smooth: true,
            ..style("Temperature (°F)", "turbo", 0.0, 100.0)
        },
    }
}

pub fn refc_recipe() -> VariableRecipe {
    VariableRecipe {
        key: "refc".to_string(),
        selector: selector("REFC:entire atmosphere"),
        units: UnitKind::Raw,
        accumulated: false,
        style: style("Simulated Radar (dBZ)", "nws_reflectivity", 0.0, 70.0),
    }
}

pub fn snow_recipe() -> VariableRecipe {
    VariableRecipe {
        key: "snow".to_string(),
        selector: selector("ASNOW:surface"),
        units: UnitKind::Depth,
        accumulated: true,
        style: style("Snowfall (in)", "blues", 0.0, 24.0),
    }
}

/// Recipes in catalog order: temp, refc, snow.
pub fn test_recipes() -> Vec<VariableRecipe> {
    vec![temp_recipe(), refc_recipe(), snow_recipe()]
}

pub fn wind_group() -> DerivedWindGroup {
    DerivedWindGroup {
        temperature: selector("TMP:2 m above ground"),
        u: selector("UGRD:10 m above ground"),
        v: selector("VGRD:10 m above ground"),
        wind: style("Wind Speed (mph)", "viridis", 0.0, 50.0),
        feelslike: style("Feels Like (°F)", "turbo", -20.0, 100.0),
    }
}

/// Catalog over the given models with the standard recipes and wind group.
pub fn catalog_with(models: Vec<ModelDefinition>) -> ModelCatalog {
    ModelCatalog::new(models, test_recipes(), Some(wind_group()))
        .unwrap_or_else(|e| panic!("invalid fixture catalog: {e}"))
}

/// HRRR + RRFS catalog.
pub fn test_catalog() -> ModelCatalog {
    catalog_with(vec![hrrr_model(), rrfs_model()])
}

/// Configuration files in the on-disk layout.
pub mod yaml {
    pub const VARIABLES: &str = r##"
wind_group:
  temperature: "TMP:2 m above ground"
  u: "UGRD:10 m above ground"
  v: "VGRD:10 m above ground"
  wind:
    label: "Wind Speed (mph)"
    color_map: viridis
    min: 0
    max: 50
  feelslike:
    label: "Feels Like (°F)"
    color_map: turbo
    min: -20
    max: 100

variables:
  - key: temp
    label: "Temperature (°F)"
    selector: "TMP:2 m above ground"
    units: temperature
    color_map: turbo
    min: 0
    max: 100
    smooth: true
  - key: snow
    label: "Snowfall (in)"
    selector: "ASNOW:surface"
    units: depth
    accumulated: true
    color_map: blues
    min: 0
    max: 24
"##;

    pub const HRRR: &str = r##"
id: hrrr
display_name: HRRR
source_model: hrrr
product: sfc
step_hours: 1
max_forecast_hour: 18
extended_max_forecast_hour: 48
extended_cycles: [0, 6, 12, 18]
cycle_hours: 1
sources:
  - name: aws
    url_template: "https://noaa-hrrr-bdp-pds.s3.amazonaws.com/hrrr.{date}/conus/hrrr.t{cycle:02}z.wrf{product}f{forecast:02}.grib2"
  - name: nomads
    url_template: "https://nomads.ncep.noaa.gov/pub/data/nccf/com/hrrr/prod/hrrr.{date}/conus/hrrr.t{cycle:02}z.wrf{product}f{forecast:02}.grib2"
"##;

    pub const DISABLED: &str = r##"
id: retired
display_name: Retired
enabled: false
source_model: retired
product: x
step_hours: 1
max_forecast_hour: 6
cycle_hours: 6
sources:
  - name: aws
    url_template: "https://example.invalid/{date}"
"##;
}
