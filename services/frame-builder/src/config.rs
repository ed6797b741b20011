//! Catalog loading.
//!
//! Reads `variables.yaml` (recipes and the derived wind group) and one model
//! definition per file from `models/`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use nwp_common::{DerivedWindGroup, ModelCatalog, ModelDefinition, VariableRecipe};

/// Contents of `variables.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct VariablesFile {
    #[serde(default)]
    pub wind_group: Option<DerivedWindGroup>,
    #[serde(default)]
    pub variables: Vec<VariableRecipe>,
}

impl VariablesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read variables file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse variables file: {}", path.display()))
    }
}

/// Load a model definition from a YAML file.
pub fn load_model(path: &Path) -> Result<ModelDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let model: ModelDefinition = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    debug!(model = %model.id, path = %path.display(), "Loaded model config");
    Ok(model)
}

/// Load all enabled model definitions from `<config_dir>/models`, in file
/// name order.
pub fn load_models(config_dir: &Path) -> Result<Vec<ModelDefinition>> {
    let models_dir = config_dir.join("models");

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(&models_dir)
        .with_context(|| format!("Failed to read models directory: {}", models_dir.display()))?
    {
        let path = entry?.path();
        if path.extension().map_or(false, |ext| ext == "yaml" || ext == "yml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut models = Vec::new();
    for path in paths {
        let model = load_model(&path)?;
        if model.enabled {
            info!(model = %model.id, name = %model.display_name, "Loaded model configuration");
            models.push(model);
        } else {
            debug!(model = %model.id, "Skipping disabled model");
        }
    }

    info!(count = models.len(), "Loaded model configurations");
    Ok(models)
}

/// Build the validated catalog from a configuration directory.
pub fn load_catalog(config_dir: &Path) -> Result<ModelCatalog> {
    let variables = VariablesFile::load(&config_dir.join("variables.yaml"))?;
    let models = load_models(config_dir)?;

    let catalog = ModelCatalog::new(models, variables.variables, variables.wind_group)
        .context("Invalid model catalog")?;

    for model in catalog.models() {
        for skipped in &model.skip_variables {
            if !catalog.is_known_variable(skipped) {
                warn!(model = %model.id, variable = %skipped, "skip_variables names an unknown variable");
            }
        }
    }

    Ok(catalog)
}
