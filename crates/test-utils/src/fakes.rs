//! In-memory stand-ins for the data source and renderer.
//!
//! `ScriptedSource` publishes (run, hour) pairs on demand so tests can play
//! out upstream posting over several invocations; `RecordingRenderer` keeps
//! every request it sees and can be told to fail for chosen variables.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use nwp_common::catalog::{WIND_TEMPERATURE_INPUT, WIND_U_INPUT, WIND_V_INPUT};
use nwp_common::{
    ArtifactRef, DataSource, Field, FieldRequest, FieldSet, FrameError, FrameResult,
    RenderRequest, Renderer, SourceTarget,
};

use crate::generators::{constant_field, temperature_field};

type Slot = (DateTime<Utc>, u32);

/// Data source whose availability and contents are scripted by the test.
#[derive(Default)]
pub struct ScriptedSource {
    available: Mutex<HashSet<Slot>>,
    fields: HashMap<String, Field>,
    missing: HashSet<String>,
    fetch_delay: Option<Duration>,
    probes: Mutex<Vec<Slot>>,
    fetches: Mutex<Vec<Slot>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source returning plausible fields for the wind group and the fixture
    /// recipes on a `width` x `height` grid.
    pub fn with_standard_fields(width: usize, height: usize) -> Self {
        Self::new()
            .with_field(WIND_TEMPERATURE_INPUT, constant_field(width, height, 277.594))
            .with_field(WIND_U_INPUT, constant_field(width, height, 3.0))
            .with_field(WIND_V_INPUT, constant_field(width, height, 4.0))
            .with_field("temp", temperature_field(width, height))
            .with_field("refc", constant_field(width, height, 35.0))
            .with_field("snow", constant_field(width, height, 0.1))
    }

    /// Mark hours of one run as published.
    pub fn with_available(self, run: DateTime<Utc>, hours: impl IntoIterator<Item = u32>) -> Self {
        self.publish(run, hours);
        self
    }

    pub fn with_field(mut self, key: &str, field: Field) -> Self {
        self.fields.insert(key.to_string(), field);
        self
    }

    /// Leave `key` out of every fetch response.
    pub fn without(mut self, key: &str) -> Self {
        self.missing.insert(key.to_string());
        self
    }

    /// Sleep before answering each fetch.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Publish more hours after construction.
    pub fn publish(&self, run: DateTime<Utc>, hours: impl IntoIterator<Item = u32>) {
        let mut available = lock(&self.available);
        for fxx in hours {
            available.insert((run, fxx));
        }
    }

    /// Every probe seen, in call order.
    pub fn probes(&self) -> Vec<(DateTime<Utc>, u32)> {
        lock(&self.probes).clone()
    }

    /// Hours probed for `run`, in call order.
    pub fn probed_hours(&self, run: DateTime<Utc>) -> Vec<u32> {
        self.probes()
            .into_iter()
            .filter(|(r, _)| *r == run)
            .map(|(_, fxx)| fxx)
            .collect()
    }

    /// Runs probed at hour 0, in call order.
    pub fn probed_runs(&self) -> Vec<DateTime<Utc>> {
        self.probes()
            .into_iter()
            .filter(|(_, fxx)| *fxx == 0)
            .map(|(run, _)| run)
            .collect()
    }

    pub fn fetches(&self) -> Vec<(DateTime<Utc>, u32)> {
        lock(&self.fetches).clone()
    }

    fn is_available(&self, target: &SourceTarget) -> bool {
        lock(&self.available).contains(&(target.run, target.forecast_hour))
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn probe(&self, target: &SourceTarget) -> FrameResult<()> {
        lock(&self.probes).push((target.run, target.forecast_hour));
        if self.is_available(target) {
            Ok(())
        } else {
            Err(FrameError::NotYetAvailable(format!(
                "{} {} f{:03} not published",
                target.model, target.run, target.forecast_hour
            )))
        }
    }

    async fn fetch(&self, request: &FieldRequest) -> FrameResult<FieldSet> {
        let target = &request.target;
        lock(&self.fetches).push((target.run, target.forecast_hour));

        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if !self.is_available(target) {
            return Err(FrameError::NotYetAvailable(format!(
                "{} f{:03} not published",
                target.model, target.forecast_hour
            )));
        }

        let source = target
            .sources
            .first()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "scripted".to_string());
        let fields = request
            .queries
            .iter()
            .filter(|q| !self.missing.contains(&q.key))
            .filter_map(|q| self.fields.get(&q.key).map(|f| (q.key.clone(), f.clone())))
            .collect();

        Ok(FieldSet { source, fields })
    }
}

/// Renderer that records requests and returns their deterministic path.
#[derive(Default)]
pub struct RecordingRenderer {
    requests: Mutex<Vec<RenderRequest>>,
    failing: HashSet<String>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every render of `variable`.
    pub fn failing_on(mut self, variable: &str) -> Self {
        self.failing.insert(variable.to_string());
        self
    }

    pub fn requests(&self) -> Vec<RenderRequest> {
        lock(&self.requests).clone()
    }

    /// Rendered (model, variable, fxx) triples, sorted.
    pub fn rendered(&self) -> Vec<(String, String, u32)> {
        let mut out: Vec<_> = self
            .requests()
            .into_iter()
            .map(|r| (r.model, r.variable, r.forecast_hour))
            .collect();
        out.sort();
        out
    }

    /// The request for one (variable, fxx), if any.
    pub fn request_for(&self, variable: &str, forecast_hour: u32) -> Option<RenderRequest> {
        self.requests()
            .into_iter()
            .find(|r| r.variable == variable && r.forecast_hour == forecast_hour)
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn render(&self, request: RenderRequest) -> FrameResult<ArtifactRef> {
        let path = request.artifact_path();
        let fail = self.failing.contains(&request.variable);
        lock(&self.requests).push(request);
        if fail {
            return Err(FrameError::Render(format!("scripted failure for {}", path)));
        }
        Ok(path)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{hourly_model, reference_run};

    #[tokio::test]
    async fn test_probe_follows_publication() {
        let run = reference_run();
        let source = ScriptedSource::new().with_available(run, [0, 1]);
        let model = hourly_model("hrrr", 3);

        tokio_test::assert_ok!(source.probe(&SourceTarget::for_model(&model, run, 1)).await);
        tokio_test::assert_err!(source.probe(&SourceTarget::for_model(&model, run, 2)).await);

        source.publish(run, [2]);
        tokio_test::assert_ok!(source.probe(&SourceTarget::for_model(&model, run, 2)).await);
        assert_eq!(source.probed_hours(run), vec![1, 2, 2]);
    }

    #[tokio::test]
    async fn test_recording_renderer_failure() {
        let renderer = RecordingRenderer::new().failing_on("refc");
        let request = RenderRequest {
            field: constant_field(2, 2, 1.0),
            style: crate::fixtures::refc_recipe().style,
            model: "hrrr".to_string(),
            variable: "refc".to_string(),
            forecast_hour: 3,
            valid: "2024-01-15T15:00:00Z".to_string(),
        };
        assert!(renderer.render(request).await.is_err());
        assert_eq!(renderer.rendered(), vec![("hrrr".to_string(), "refc".to_string(), 3)]);
    }
}
