//! Run discovery: find the newest initialization whose first hour is
//! published, probing a bounded number of cycles newest first.

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument};

use nwp_common::time::{format_timestamp, truncate_to_hour};
use nwp_common::{DataSource, ModelDefinition, SourceTarget};

/// Default number of cycles probed per model.
pub const DEFAULT_PROBE_CANDIDATES: u32 = 4;
/// Default upload-latency buffer for hourly models.
pub const DEFAULT_LATENCY_BUFFER_HOURS: u32 = 1;

#[derive(Debug, Clone, Copy)]
pub struct DiscoveryConfig {
    /// Cycles to probe, newest first
    pub candidates: u32,
    /// Hours subtracted from the current hour for hourly models
    pub latency_buffer_hours: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_PROBE_CANDIDATES,
            latency_buffer_hours: DEFAULT_LATENCY_BUFFER_HOURS,
        }
    }
}

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("No run of {model} found in the last {candidates} cycles")]
    Exhausted { model: String, candidates: u32 },
}

/// Newest cycle that could plausibly be published at `now`.
pub fn anchor(cycle_hours: u32, now: DateTime<Utc>, latency_buffer_hours: u32) -> DateTime<Utc> {
    let hour = truncate_to_hour(&now);
    if cycle_hours <= 1 {
        hour - Duration::hours(latency_buffer_hours as i64)
    } else {
        let offset = hour.hour() % cycle_hours;
        hour - Duration::hours(offset as i64)
    }
}

/// Candidate runs, newest first.
pub fn candidates(model: &ModelDefinition, now: DateTime<Utc>, config: &DiscoveryConfig) -> Vec<DateTime<Utc>> {
    let start = anchor(model.cycle_hours, now, config.latency_buffer_hours);
    let step = Duration::hours(model.cycle_hours.max(1) as i64);
    (0..config.candidates as i32)
        .map(|k| start - step * k)
        .collect()
}

pub struct RunDiscovery {
    source: Arc<dyn DataSource>,
    clock: Arc<dyn Clock>,
    config: DiscoveryConfig,
}

impl RunDiscovery {
    pub fn new(source: Arc<dyn DataSource>, clock: Arc<dyn Clock>, config: DiscoveryConfig) -> Self {
        Self {
            source,
            clock,
            config,
        }
    }

    /// Latest run whose hour 0 exists at any of the model's sources.
    #[instrument(skip(self, model), fields(model = %model.id))]
    pub async fn discover(&self, model: &ModelDefinition) -> Result<DateTime<Utc>, DiscoveryError> {
        for run in candidates(model, self.clock.now(), &self.config) {
            let target = SourceTarget::for_model(model, run, 0);
            match self.source.probe(&target).await {
                Ok(()) => {
                    info!(run = %format_timestamp(&run), "Discovered latest run");
                    return Ok(run);
                }
                Err(e) => {
                    debug!(run = %format_timestamp(&run), error = %e, "Run not available");
                }
            }
        }

        metrics::counter!("discovery_exhausted_total").increment(1);
        Err(DiscoveryError::Exhausted {
            model: model.id.clone(),
            candidates: self.config.candidates,
        })
    }
}
