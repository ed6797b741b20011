//! Per-frame variable pipeline: fetch, derive, convert and render.
//!
//! Every variable fails on its own. A failure is logged once with its kind and
//! counted; the frame keeps whatever succeeded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, instrument, warn};

use nwp_common::catalog::{
    FEELSLIKE_KEY, WIND_KEY, WIND_TEMPERATURE_INPUT, WIND_U_INPUT, WIND_V_INPUT,
};
use nwp_common::grid::ensure_aligned;
use nwp_common::time::{format_timestamp, valid_time};
use nwp_common::units::{apparent_temperature, wind_speed, UnitKind};
use nwp_common::{
    ArtifactRef, DataSource, DerivedWindGroup, Field, FieldQuery, FieldRequest, FieldSet,
    FrameError, FrameRecord, FrameResult, ModelCatalog, ModelDefinition, RenderRequest, Renderer,
    SourceTarget, VariableStyle,
};

/// Context shared by every variable of one frame.
struct FrameContext<'a> {
    model: &'a ModelDefinition,
    run: DateTime<Utc>,
    fxx: u32,
    valid: String,
}

pub struct VariablePipeline {
    catalog: Arc<ModelCatalog>,
    source: Arc<dyn DataSource>,
    renderer: Arc<dyn Renderer>,
}

impl VariablePipeline {
    pub fn new(catalog: Arc<ModelCatalog>, source: Arc<dyn DataSource>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            catalog,
            source,
            renderer,
        }
    }

    /// Produce one frame. Never fails: the record holds the keys that were
    /// rendered, possibly none.
    #[instrument(skip(self, model), fields(model = %model.id))]
    pub async fn process_frame(&self, model: &ModelDefinition, run: DateTime<Utc>, fxx: u32) -> FrameRecord {
        let ctx = FrameContext {
            model,
            run,
            fxx,
            valid: format_timestamp(&valid_time(&run, fxx)),
        };
        let mut frame = FrameRecord::new(fxx, ctx.valid.clone());

        if let Some(group) = self.catalog.wind_group() {
            if model.skips(WIND_KEY) {
                debug!(fxx, "Derived wind group skipped by model");
            } else {
                self.derived_wind(&ctx, group, &mut frame).await;
            }
        }

        self.standard_recipes(&ctx, &mut frame).await;

        counter!("frames_processed_total").increment(1);
        debug!(fxx, rendered = frame.artifacts.len(), "Frame complete");
        frame
    }

    async fn derived_wind(&self, ctx: &FrameContext<'_>, group: &DerivedWindGroup, frame: &mut FrameRecord) {
        let fields = match self.derive_wind_fields(ctx).await {
            Ok(fields) => fields,
            Err(e) => {
                self.record_failure(ctx, WIND_KEY, &e);
                return;
            }
        };
        let (speed, feels) = fields;

        self.render_into(ctx, WIND_KEY, speed, &group.wind, frame).await;
        if ctx.model.skips(FEELSLIKE_KEY) {
            return;
        }
        self.render_into(ctx, FEELSLIKE_KEY, feels, &group.feelslike, frame).await;
    }

    /// Wind speed (mph) and apparent temperature (°F) from one combined fetch.
    async fn derive_wind_fields(&self, ctx: &FrameContext<'_>) -> FrameResult<(Field, Field)> {
        let keys = [WIND_TEMPERATURE_INPUT, WIND_U_INPUT, WIND_V_INPUT];
        let mut set = self.fetch(ctx, &keys.map(|k| (k, false))).await?;
        let source = set.source.clone();

        let mut take = |key: &str| -> FrameResult<Field> {
            let units = self.units_for(ctx.model, &source, key, UnitKind::Raw);
            set.take(key)
                .map(|f| f.map(|v| units.convert(v)))
                .ok_or_else(|| FrameError::EmptyResult(key.to_string()))
        };
        let temp_f = take(WIND_TEMPERATURE_INPUT)?;
        let u = take(WIND_U_INPUT)?;
        let v = take(WIND_V_INPUT)?;
        let grid = ensure_aligned(&[&temp_f, &u, &v])?;

        // Components are already in mph.
        let speed: Vec<f32> = u
            .values
            .iter()
            .zip(&v.values)
            .map(|(u, v)| wind_speed(*u, *v))
            .collect();
        let feels: Vec<f32> = temp_f
            .values
            .iter()
            .zip(&speed)
            .map(|(t, s)| apparent_temperature(*t, *s))
            .collect();

        Ok((Field::new(grid, speed)?, Field::new(grid, feels)?))
    }

    async fn standard_recipes(&self, ctx: &FrameContext<'_>, frame: &mut FrameRecord) {
        let recipes: Vec<_> = self
            .catalog
            .recipes()
            .iter()
            .filter(|r| !ctx.model.skips(&r.key))
            .filter(|r| {
                // Accumulations are zero at initialization.
                let skip = r.accumulated && ctx.fxx == 0;
                if skip {
                    debug!(variable = %r.key, "Accumulated variable skipped at hour 0");
                }
                !skip
            })
            .collect();
        if recipes.is_empty() {
            return;
        }

        let wanted: Vec<(&str, bool)> = recipes.iter().map(|r| (r.key.as_str(), r.accumulated)).collect();
        let mut set = match self.fetch(ctx, &wanted).await {
            Ok(set) => set,
            Err(e) => {
                for recipe in &recipes {
                    self.record_failure(ctx, &recipe.key, &e);
                }
                return;
            }
        };

        for recipe in recipes {
            let Some(field) = set.take(&recipe.key) else {
                self.record_failure(ctx, &recipe.key, &FrameError::EmptyResult(recipe.selector.to_string()));
                continue;
            };
            let units = self.units_for(ctx.model, &set.source, &recipe.key, recipe.units);
            let converted = field.map(|v| units.convert(v));
            self.render_into(ctx, &recipe.key, converted, &recipe.style, frame).await;
        }
    }

    async fn fetch(&self, ctx: &FrameContext<'_>, keys: &[(&str, bool)]) -> FrameResult<FieldSet> {
        let queries = keys
            .iter()
            .map(|(key, accumulated)| FieldQuery {
                key: key.to_string(),
                selectors: self.catalog.selectors_for(ctx.model, key),
                accumulated: *accumulated,
            })
            .collect();
        let request = FieldRequest {
            target: SourceTarget::for_model(ctx.model, ctx.run, ctx.fxx),
            queries,
        };
        self.source.fetch(&request).await
    }

    fn units_for(&self, model: &ModelDefinition, source: &str, key: &str, fallback: UnitKind) -> UnitKind {
        self.catalog
            .binding(&model.id, source, key)
            .map(|b| b.units)
            .unwrap_or(fallback)
    }

    async fn render_into(
        &self,
        ctx: &FrameContext<'_>,
        variable: &str,
        field: Field,
        style: &VariableStyle,
        frame: &mut FrameRecord,
    ) {
        match self.render(ctx, variable, field, style).await {
            Ok(artifact) => {
                counter!("frame_variables_rendered_total", "variable" => variable.to_string()).increment(1);
                frame.artifacts.insert(variable.to_string(), artifact);
            }
            Err(e) => self.record_failure(ctx, variable, &e),
        }
    }

    async fn render(
        &self,
        ctx: &FrameContext<'_>,
        variable: &str,
        field: Field,
        style: &VariableStyle,
    ) -> FrameResult<ArtifactRef> {
        if field.is_empty() {
            return Err(FrameError::EmptyResult(variable.to_string()));
        }
        self.renderer
            .render(RenderRequest {
                field,
                style: style.clone(),
                model: ctx.model.id.clone(),
                variable: variable.to_string(),
                forecast_hour: ctx.fxx,
                valid: ctx.valid.clone(),
            })
            .await
    }

    fn record_failure(&self, ctx: &FrameContext<'_>, variable: &str, error: &FrameError) {
        let kind = error.kind();
        counter!("frame_variables_failed_total", "kind" => kind.as_str()).increment(1);
        warn!(
            model = %ctx.model.id,
            fxx = ctx.fxx,
            variable = %variable,
            kind = kind.as_str(),
            error = %error,
            "Variable skipped"
        );
    }
}
