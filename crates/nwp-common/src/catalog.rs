//! Model catalog: model definitions, variable recipes and the resolved
//! per-(model, source, variable) selector table.
//!
//! The catalog is built once at startup and never mutated afterwards.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selector::FieldSelector;
pub use crate::units::UnitKind;

/// Output key of the derived wind speed field.
pub const WIND_KEY: &str = "wind";
/// Output key of the derived apparent temperature field.
pub const FEELSLIKE_KEY: &str = "feelslike";
/// Input keys of the derived wind group, addressable by aliases.
pub const WIND_TEMPERATURE_INPUT: &str = "t2m";
pub const WIND_U_INPUT: &str = "u10";
pub const WIND_V_INPUT: &str = "v10";
/// Frame record fields that share the JSON object with artifact keys.
pub const RESERVED_KEYS: [&str; 2] = ["fxx", "valid"];

/// One place a model's files can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEndpoint {
    /// Source name used in `source_priority` and aliases (`aws`, `nomads`)
    pub name: String,
    /// GRIB2 file URL with `{date}`, `{cycle:02}`, `{forecast:02}`,
    /// `{forecast:03}`, `{member:02}` and `{product}` placeholders
    pub url_template: String,
}

/// Per-model override of a variable's selector (and optionally its units).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasConfig {
    pub variable: String,
    /// Restrict the alias to one source; applies to all sources when absent
    #[serde(default)]
    pub source: Option<String>,
    pub selector: FieldSelector,
    #[serde(default)]
    pub units: Option<UnitKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub id: String,
    pub display_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Model id understood by the data source (`hrrr`, `nam`)
    pub source_model: String,
    /// Product / stream id (`sfc`, `conusnest`, `pgrb2.0p25`)
    pub product: String,
    /// Hours between forecast frames
    pub step_hours: u32,
    pub max_forecast_hour: u32,
    /// Longer forecast length for runs initialized at `extended_cycles`
    #[serde(default)]
    pub extended_max_forecast_hour: Option<u32>,
    #[serde(default)]
    pub extended_cycles: Vec<u32>,
    /// 1 = hourly initializations, otherwise every N hours
    pub cycle_hours: u32,
    pub sources: Vec<SourceEndpoint>,
    /// Source names, most preferred first. Defaults to the order of `sources`.
    #[serde(default)]
    pub source_priority: Vec<String>,
    #[serde(default)]
    pub ensemble_member: Option<u32>,
    #[serde(default)]
    pub skip_variables: BTreeSet<String>,
    #[serde(default)]
    pub aliases: Vec<AliasConfig>,
}

fn default_enabled() -> bool {
    true
}

impl ModelDefinition {
    /// Forecast length for a given run.
    pub fn max_forecast_hour_for(&self, run: &DateTime<Utc>) -> u32 {
        match self.extended_max_forecast_hour {
            Some(extended) if self.extended_cycles.contains(&run.hour()) => extended,
            _ => self.max_forecast_hour,
        }
    }

    /// Every multiple of `step_hours` from 0 to the max forecast hour inclusive.
    pub fn expected_hours(&self, run: &DateTime<Utc>) -> Vec<u32> {
        let step = self.step_hours.max(1) as usize;
        (0..=self.max_forecast_hour_for(run)).step_by(step).collect()
    }

    /// Endpoints in priority order.
    pub fn ordered_sources(&self) -> Vec<SourceEndpoint> {
        self.source_priority
            .iter()
            .filter_map(|name| self.sources.iter().find(|s| &s.name == name))
            .cloned()
            .collect()
    }

    pub fn skips(&self, variable: &str) -> bool {
        self.skip_variables.contains(variable)
    }
}

/// Presentation parameters handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableStyle {
    pub label: String,
    pub color_map: String,
    pub min: f32,
    pub max: f32,
    /// Light smoothing before rasterising (off for radar-like fields)
    #[serde(default)]
    pub smooth: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableRecipe {
    pub key: String,
    pub selector: FieldSelector,
    pub units: UnitKind,
    /// Accumulated since initialization; zero by definition at hour 0
    #[serde(default)]
    pub accumulated: bool,
    #[serde(flatten)]
    pub style: VariableStyle,
}

/// Inputs and output styles of the derived wind / apparent temperature group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedWindGroup {
    pub temperature: FieldSelector,
    pub u: FieldSelector,
    pub v: FieldSelector,
    pub wind: VariableStyle,
    pub feelslike: VariableStyle,
}

/// Selector and units to use for one variable at one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    pub selector: FieldSelector,
    pub units: UnitKind,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Duplicate model id: {0}")]
    DuplicateModel(String),

    #[error("Duplicate variable key: {0}")]
    DuplicateVariable(String),

    #[error("Invalid model '{model}': {message}")]
    InvalidModel { model: String, message: String },

    #[error("Invalid variable '{variable}': {message}")]
    InvalidVariable { variable: String, message: String },
}

/// Immutable, indexable registry of models and recipes.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelDefinition>,
    recipes: Vec<VariableRecipe>,
    wind: Option<DerivedWindGroup>,
    bindings: HashMap<(String, String, String), VariableBinding>,
}

impl ModelCatalog {
    /// Validate definitions and resolve every alias into the binding table.
    pub fn new(
        mut models: Vec<ModelDefinition>,
        recipes: Vec<VariableRecipe>,
        wind: Option<DerivedWindGroup>,
    ) -> Result<Self, CatalogError> {
        let mut keys = HashSet::new();
        if wind.is_some() {
            keys.extend([WIND_KEY, FEELSLIKE_KEY]);
        }
        for recipe in &recipes {
            if RESERVED_KEYS.contains(&recipe.key.as_str()) {
                return Err(CatalogError::InvalidVariable {
                    variable: recipe.key.clone(),
                    message: "key is reserved for frame record fields".to_string(),
                });
            }
            if !keys.insert(recipe.key.as_str()) {
                return Err(CatalogError::DuplicateVariable(recipe.key.clone()));
            }
            validate_style(&recipe.key, &recipe.style)?;
        }
        if let Some(group) = &wind {
            validate_style(WIND_KEY, &group.wind)?;
            validate_style(FEELSLIKE_KEY, &group.feelslike)?;
        }

        let mut ids = HashSet::new();
        for model in &mut models {
            if !ids.insert(model.id.clone()) {
                return Err(CatalogError::DuplicateModel(model.id.clone()));
            }
            if model.source_priority.is_empty() {
                model.source_priority = model.sources.iter().map(|s| s.name.clone()).collect();
            }
            validate_model(model)?;
        }

        let mut defaults: Vec<(String, VariableBinding)> = recipes
            .iter()
            .map(|r| {
                (
                    r.key.clone(),
                    VariableBinding {
                        selector: r.selector.clone(),
                        units: r.units,
                    },
                )
            })
            .collect();
        if let Some(group) = &wind {
            for (key, selector, units) in [
                (WIND_TEMPERATURE_INPUT, &group.temperature, UnitKind::Temperature),
                (WIND_U_INPUT, &group.u, UnitKind::Speed),
                (WIND_V_INPUT, &group.v, UnitKind::Speed),
            ] {
                defaults.push((
                    key.to_string(),
                    VariableBinding {
                        selector: selector.clone(),
                        units,
                    },
                ));
            }
        }

        let mut bindings = HashMap::new();
        for model in &models {
            for alias in &model.aliases {
                if !defaults.iter().any(|(key, _)| key == &alias.variable) {
                    return Err(CatalogError::InvalidModel {
                        model: model.id.clone(),
                        message: format!("alias for unknown variable '{}'", alias.variable),
                    });
                }
                if let Some(source) = &alias.source {
                    if !model.sources.iter().any(|s| &s.name == source) {
                        return Err(CatalogError::InvalidModel {
                            model: model.id.clone(),
                            message: format!("alias for unknown source '{}'", source),
                        });
                    }
                }
            }

            for source in &model.sources {
                for (key, default) in &defaults {
                    // Source-specific aliases win over model-wide ones.
                    let alias = model
                        .aliases
                        .iter()
                        .find(|a| &a.variable == key && a.source.as_ref() == Some(&source.name))
                        .or_else(|| {
                            model
                                .aliases
                                .iter()
                                .find(|a| &a.variable == key && a.source.is_none())
                        });
                    let binding = match alias {
                        Some(alias) => VariableBinding {
                            selector: alias.selector.clone(),
                            units: alias.units.unwrap_or(default.units),
                        },
                        None => default.clone(),
                    };
                    bindings.insert(
                        (model.id.clone(), source.name.clone(), key.clone()),
                        binding,
                    );
                }
            }
        }

        Ok(Self {
            models,
            recipes,
            wind,
            bindings,
        })
    }

    pub fn models(&self) -> &[ModelDefinition] {
        &self.models
    }

    pub fn model(&self, id: &str) -> Option<&ModelDefinition> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn recipes(&self) -> &[VariableRecipe] {
        &self.recipes
    }

    pub fn wind_group(&self) -> Option<&DerivedWindGroup> {
        self.wind.as_ref()
    }

    /// Whether a key names a recipe or a derived output.
    pub fn is_known_variable(&self, key: &str) -> bool {
        self.recipes.iter().any(|r| r.key == key)
            || (self.wind.is_some() && (key == WIND_KEY || key == FEELSLIKE_KEY))
    }

    pub fn binding(&self, model: &str, source: &str, variable: &str) -> Option<&VariableBinding> {
        self.bindings
            .get(&(model.to_string(), source.to_string(), variable.to_string()))
    }

    /// Selectors for one variable across the model's sources, in priority order.
    pub fn selectors_for(&self, model: &ModelDefinition, variable: &str) -> Vec<(String, FieldSelector)> {
        model
            .source_priority
            .iter()
            .filter_map(|source| {
                self.binding(&model.id, source, variable)
                    .map(|b| (source.clone(), b.selector.clone()))
            })
            .collect()
    }
}

fn validate_style(key: &str, style: &VariableStyle) -> Result<(), CatalogError> {
    if !(style.min < style.max) {
        return Err(CatalogError::InvalidVariable {
            variable: key.to_string(),
            message: format!("range min {} must be below max {}", style.min, style.max),
        });
    }
    if style.color_map.is_empty() {
        return Err(CatalogError::InvalidVariable {
            variable: key.to_string(),
            message: "color_map is empty".to_string(),
        });
    }
    Ok(())
}

fn validate_model(model: &ModelDefinition) -> Result<(), CatalogError> {
    let invalid = |message: String| CatalogError::InvalidModel {
        model: model.id.clone(),
        message,
    };

    if model.step_hours == 0 {
        return Err(invalid("step_hours must be at least 1".into()));
    }
    if model.cycle_hours == 0 || model.cycle_hours > 24 || 24 % model.cycle_hours != 0 {
        return Err(invalid(format!(
            "cycle_hours {} must divide 24",
            model.cycle_hours
        )));
    }
    if model.sources.is_empty() {
        return Err(invalid("no sources configured".into()));
    }
    for name in &model.source_priority {
        if !model.sources.iter().any(|s| &s.name == name) {
            return Err(invalid(format!("priority names unknown source '{}'", name)));
        }
    }
    if let Some(extended) = model.extended_max_forecast_hour {
        if extended < model.max_forecast_hour {
            return Err(invalid(format!(
                "extended_max_forecast_hour {} is below max_forecast_hour {}",
                extended, model.max_forecast_hour
            )));
        }
    }
    Ok(())
}
