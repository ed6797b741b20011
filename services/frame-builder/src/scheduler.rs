//! One invocation: discover, reconcile and render every selected model under
//! a shared deadline, then hand back the updated status store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, histogram};
use tokio::time::{timeout_at, Instant};
use tracing::{info, instrument, warn};

use nwp_common::{DataSource, ModelCatalog, ModelDefinition, Renderer, RunRecord, StatusStore};

use crate::discovery::{Clock, DiscoveryConfig, RunDiscovery};
use crate::pipeline::VariablePipeline;
use crate::reconciler::{merge, Reconciler};

pub const DEFAULT_MAX_CONCURRENT_MODELS: usize = 2;
pub const DEFAULT_MAX_CONCURRENT_FRAMES: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub discovery: DiscoveryConfig,
    pub max_concurrent_models: usize,
    pub max_concurrent_frames: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            max_concurrent_models: DEFAULT_MAX_CONCURRENT_MODELS,
            max_concurrent_frames: DEFAULT_MAX_CONCURRENT_FRAMES,
        }
    }
}

/// What happened to one model.
#[derive(Debug)]
enum ModelOutcome {
    /// Record to store (possibly with fewer frames than scheduled)
    Updated(RunRecord),
    /// No candidate run found; stored as null
    Exhausted,
    /// Deadline hit before any frame work; previous record kept
    Unfinished,
}

pub struct Scheduler {
    catalog: Arc<ModelCatalog>,
    discovery: RunDiscovery,
    reconciler: Reconciler,
    pipeline: VariablePipeline,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        catalog: Arc<ModelCatalog>,
        source: Arc<dyn DataSource>,
        renderer: Arc<dyn Renderer>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            discovery: RunDiscovery::new(source.clone(), clock, config.discovery),
            reconciler: Reconciler::new(source.clone()),
            pipeline: VariablePipeline::new(catalog.clone(), source, renderer),
            catalog,
            config,
        }
    }

    /// Process the catalog's models (restricted to `filter` when non-empty)
    /// and return the updated store. Entries of other models are kept.
    pub async fn run(&self, mut store: StatusStore, filter: &[String], deadline: Instant) -> StatusStore {
        for id in filter {
            if self.catalog.model(id).is_none() {
                warn!(model = %id, "Requested model is not configured or disabled");
            }
        }

        let selected: Vec<&ModelDefinition> = self
            .catalog
            .models()
            .iter()
            .filter(|m| filter.is_empty() || filter.contains(&m.id))
            .collect();

        let previous: HashMap<&str, Option<RunRecord>> = selected
            .iter()
            .map(|m| (m.id.as_str(), store.get(&m.id).cloned().flatten()))
            .collect();

        info!(models = selected.len(), "Starting frame build");

        let outcomes: Vec<(String, ModelOutcome)> = stream::iter(selected)
            .map(|model| {
                let prev = previous.get(model.id.as_str()).cloned().flatten();
                async move {
                    let started = std::time::Instant::now();
                    let outcome = self.process_model(model, prev, deadline).await;
                    histogram!("model_duration_seconds", "model" => model.id.clone())
                        .record(started.elapsed().as_secs_f64());
                    (model.id.clone(), outcome)
                }
            })
            .buffer_unordered(self.config.max_concurrent_models.max(1))
            .collect()
            .await;

        let (mut updated, mut exhausted, mut unfinished) = (0, 0, 0);
        for (id, outcome) in outcomes {
            match outcome {
                ModelOutcome::Updated(record) => {
                    updated += 1;
                    store.insert(id, Some(record));
                }
                ModelOutcome::Exhausted => {
                    exhausted += 1;
                    store.insert(id, None);
                }
                ModelOutcome::Unfinished => {
                    unfinished += 1;
                    counter!("models_unfinished_total").increment(1);
                }
            }
        }

        info!(updated, exhausted, unfinished, "Frame build finished");
        store
    }

    #[instrument(skip(self, model, previous, deadline), fields(model = %model.id))]
    async fn process_model(
        &self,
        model: &ModelDefinition,
        previous: Option<RunRecord>,
        deadline: Instant,
    ) -> ModelOutcome {
        if Instant::now() >= deadline {
            warn!("Deadline passed before the model started, keeping previous record");
            return ModelOutcome::Unfinished;
        }

        let discovered = match timeout_at(deadline, self.discovery.discover(model)).await {
            Ok(Ok(run)) => run,
            Ok(Err(e)) => {
                warn!(error = %e, "Run discovery exhausted");
                return ModelOutcome::Exhausted;
            }
            Err(_) => {
                warn!("Deadline reached during discovery, keeping previous record");
                return ModelOutcome::Unfinished;
            }
        };

        let planned = timeout_at(deadline, async {
            let plan = self.reconciler.reconcile(model, discovered, previous.as_ref()).await;
            let hours = self.reconciler.ready_hours(model, discovered, &plan).await;
            (plan, hours)
        })
        .await;
        let Ok((plan, hours)) = planned else {
            warn!("Deadline reached during reconciliation, keeping previous record");
            return ModelOutcome::Unfinished;
        };

        let mut record = plan.record;
        if hours.is_empty() {
            info!(run = %record.run_time, "No new forecast hours");
            return ModelOutcome::Updated(record);
        }

        let frames = self.process_hours(model, discovered, &hours, deadline).await;
        info!(
            run = %record.run_time,
            scheduled = hours.len(),
            completed = frames.len(),
            "Processed forecast hours"
        );
        merge(&mut record, frames);
        ModelOutcome::Updated(record)
    }

    /// Run the pipeline over `hours` concurrently; hours still in flight at the
    /// deadline are dropped.
    async fn process_hours(
        &self,
        model: &ModelDefinition,
        run: DateTime<Utc>,
        hours: &[u32],
        deadline: Instant,
    ) -> Vec<nwp_common::FrameRecord> {
        let mut pending = stream::iter(hours.iter().copied())
            .map(|fxx| self.pipeline.process_frame(model, run, fxx))
            .buffer_unordered(self.config.max_concurrent_frames.max(1));

        let mut done = Vec::with_capacity(hours.len());
        loop {
            match timeout_at(deadline, pending.next()).await {
                Ok(Some(frame)) => done.push(frame),
                Ok(None) => break,
                Err(_) => {
                    let omitted = hours.len() - done.len();
                    counter!("frames_omitted_total").increment(omitted as u64);
                    warn!(omitted, "Deadline reached, remaining hours left for the next run");
                    break;
                }
            }
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Duration as ChronoDuration;
    use nwp_common::time::format_timestamp;
    use nwp_common::FrameRecord;
    use test_utils::fixtures::{catalog_with, hourly_model, six_hourly_model, utc};
    use test_utils::{RecordingRenderer, ScriptedSource};

    use crate::discovery::FixedClock;

    /// 14:30 UTC: hourly models anchor on 13:00, six-hourly on 12:00.
    fn now() -> DateTime<Utc> {
        utc(2024, 1, 15, 14) + ChronoDuration::minutes(30)
    }

    fn hourly_run() -> DateTime<Utc> {
        utc(2024, 1, 15, 13)
    }

    fn scheduler(
        models: Vec<ModelDefinition>,
        source: Arc<ScriptedSource>,
        renderer: Arc<RecordingRenderer>,
        config: SchedulerConfig,
    ) -> Scheduler {
        Scheduler::new(
            Arc::new(catalog_with(models)),
            source,
            renderer,
            Arc::new(FixedClock(now())),
            config,
        )
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    fn hours(record: &Option<RunRecord>) -> Vec<u32> {
        record.as_ref().map(|r| r.frames.iter().map(|f| f.fxx).collect()).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_new_run_end_to_end() {
        let source = Arc::new(ScriptedSource::with_standard_fields(4, 3).with_available(hourly_run(), 0..=3));
        let renderer = Arc::new(RecordingRenderer::new());
        let s = scheduler(vec![hourly_model("hrrr", 3)], source, renderer.clone(), SchedulerConfig::default());

        let store = s.run(StatusStore::new(), &[], far_deadline()).await;

        let record = store["hrrr"].as_ref().unwrap();
        assert_eq!(record.run_time, format_timestamp(&hourly_run()));
        assert_eq!(record.display_name, "HRRR");
        assert_eq!(hours(&store["hrrr"]), vec![0, 1, 2, 3]);
        // Snow is accumulated and skipped at hour 0.
        assert_eq!(record.frames[0].artifacts.len(), 4);
        assert_eq!(record.frames[3].artifacts.len(), 5);
        assert_eq!(record.frames[1].valid, "2024-01-15T14:00:00Z");
        assert_eq!(renderer.rendered().len(), 4 + 5 * 3);
    }

    #[tokio::test]
    async fn test_unpublished_hours_are_not_recorded() {
        let source = Arc::new(ScriptedSource::with_standard_fields(2, 2).with_available(hourly_run(), [0, 1]));
        let renderer = Arc::new(RecordingRenderer::new());
        let s = scheduler(vec![hourly_model("hrrr", 3)], source, renderer, SchedulerConfig::default());

        let store = s.run(StatusStore::new(), &[], far_deadline()).await;
        assert_eq!(hours(&store["hrrr"]), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_incremental_across_invocations() {
        let source = Arc::new(ScriptedSource::with_standard_fields(2, 2).with_available(hourly_run(), [0, 1]));
        let renderer = Arc::new(RecordingRenderer::new());
        let s = scheduler(vec![hourly_model("hrrr", 3)], source.clone(), renderer.clone(), SchedulerConfig::default());

        let first = s.run(StatusStore::new(), &[], far_deadline()).await;
        source.publish(hourly_run(), [2]);
        let second = s.run(first.clone(), &[], far_deadline()).await;

        assert_eq!(hours(&second["hrrr"]), vec![0, 1, 2]);
        let (a, b) = (first["hrrr"].as_ref().unwrap(), second["hrrr"].as_ref().unwrap());
        assert_eq!(&b.frames[..2], &a.frames[..]);
        // Hours already recorded are not rendered again.
        assert_eq!(renderer.requests().iter().filter(|r| r.forecast_hour == 0).count(), 4);

        let third = s.run(second.clone(), &[], far_deadline()).await;
        assert_eq!(third, second);
    }

    #[tokio::test]
    async fn test_rollover_replaces_frames() {
        let source = Arc::new(ScriptedSource::with_standard_fields(2, 2).with_available(hourly_run(), [0]));
        let renderer = Arc::new(RecordingRenderer::new());
        let s = scheduler(vec![hourly_model("hrrr", 3)], source, renderer, SchedulerConfig::default());

        let mut old = RunRecord::new(format_timestamp(&utc(2024, 1, 15, 12)), "HRRR");
        for fxx in 0..=3 {
            old.merge_frame(FrameRecord::new(fxx, "x"));
        }
        let mut store = StatusStore::new();
        store.insert("hrrr".into(), Some(old));

        let store = s.run(store, &[], far_deadline()).await;
        let record = store["hrrr"].as_ref().unwrap();
        assert_eq!(record.run_time, "2024-01-15T13:00:00Z");
        assert_eq!(hours(&store["hrrr"]), vec![0]);
    }

    #[tokio::test]
    async fn test_exhausted_model_is_null_and_isolated() {
        let source = Arc::new(ScriptedSource::with_standard_fields(2, 2).with_available(hourly_run(), [0, 1]));
        let renderer = Arc::new(RecordingRenderer::new());
        let s = scheduler(
            vec![hourly_model("hrrr", 1), six_hourly_model("gfs", 6, 3)],
            source,
            renderer,
            SchedulerConfig::default(),
        );

        let mut store = StatusStore::new();
        store.insert("gfs".into(), Some(RunRecord::new("2024-01-14T00:00:00Z", "GFS")));

        let store = s.run(store, &[], far_deadline()).await;
        assert!(store["gfs"].is_none());
        assert_eq!(hours(&store["hrrr"]), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_filter_keeps_other_entries() {
        let source = Arc::new(ScriptedSource::with_standard_fields(2, 2).with_available(hourly_run(), [0]));
        let renderer = Arc::new(RecordingRenderer::new());
        let s = scheduler(
            vec![hourly_model("hrrr", 0), hourly_model("rrfs", 0)],
            source,
            renderer.clone(),
            SchedulerConfig::default(),
        );

        let mut store = StatusStore::new();
        store.insert("nam".into(), None);

        let store = s.run(store, &["rrfs".to_string()], far_deadline()).await;
        assert!(store.contains_key("nam"));
        assert!(!store.contains_key("hrrr"));
        assert_eq!(hours(&store["rrfs"]), vec![0]);
        assert!(renderer.rendered().iter().all(|(model, _, _)| model == "rrfs"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_omits_unfinished_hours() {
        // Each frame makes two fetches of 10 s each; the deadline allows one.
        let source = Arc::new(
            ScriptedSource::with_standard_fields(2, 2)
                .with_available(hourly_run(), 0..=3)
                .with_fetch_delay(Duration::from_secs(10)),
        );
        let renderer = Arc::new(RecordingRenderer::new());
        let config = SchedulerConfig {
            max_concurrent_frames: 1,
            ..SchedulerConfig::default()
        };
        let s = scheduler(vec![hourly_model("hrrr", 3)], source, renderer, config);

        let store = s.run(StatusStore::new(), &[], Instant::now() + Duration::from_secs(25)).await;
        assert_eq!(hours(&store["hrrr"]), vec![0]);
    }

    #[tokio::test]
    async fn test_expired_deadline_keeps_previous_record() {
        let source = Arc::new(ScriptedSource::with_standard_fields(2, 2).with_available(hourly_run(), [0]));
        let renderer = Arc::new(RecordingRenderer::new());
        let s = scheduler(vec![hourly_model("hrrr", 3)], source, renderer.clone(), SchedulerConfig::default());

        let previous = RunRecord::new("2024-01-15T12:00:00Z", "HRRR");
        let mut store = StatusStore::new();
        store.insert("hrrr".into(), Some(previous.clone()));

        let store = s.run(store, &[], Instant::now()).await;
        assert_eq!(store["hrrr"], Some(previous));
        assert!(renderer.requests().is_empty());
    }
}
