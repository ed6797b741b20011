//! Reconciliation of a discovered run against the recorded state.
//!
//! A new run (or no previous record) restarts the frame list and schedules the
//! full forecast sequence. The same run only picks up hours not yet recorded,
//! and only while they are published: the first missing hour stops the scan.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use nwp_common::time::{format_timestamp, parse_timestamp};
use nwp_common::{DataSource, FrameRecord, ModelDefinition, RunRecord, SourceTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// Run changed or nothing recorded: previous frames discarded
    NewRun,
    /// Same run: recorded frames kept
    SameRun,
}

/// Outcome of reconciling one model.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub kind: PlanKind,
    /// Record the processed frames merge into
    pub record: RunRecord,
    /// Hours to process, ascending
    pub hours: Vec<u32>,
}

impl Plan {
    /// Whether the scheduled hours still need an availability scan before
    /// being processed.
    pub fn needs_scan(&self) -> bool {
        self.kind == PlanKind::NewRun
    }
}

/// Whether `previous` describes the same run as `discovered`.
fn same_run(previous: &RunRecord, discovered: &DateTime<Utc>) -> bool {
    parse_timestamp(&previous.run_time).map_or(false, |t| t == *discovered)
}

/// Compute the plan without probing the remainder of a same-run sequence.
pub fn plan(model: &ModelDefinition, discovered: DateTime<Utc>, previous: Option<&RunRecord>) -> Plan {
    let expected = model.expected_hours(&discovered);

    match previous {
        Some(prev) if same_run(prev, &discovered) => {
            let mut record = prev.clone();
            record.display_name = model.display_name.clone();
            record.run_time = format_timestamp(&discovered);
            let hours = expected.into_iter().filter(|h| !prev.has_frame(*h)).collect();
            Plan {
                kind: PlanKind::SameRun,
                record,
                hours,
            }
        }
        _ => Plan {
            kind: PlanKind::NewRun,
            record: RunRecord::new(format_timestamp(&discovered), model.display_name.clone()),
            hours: expected,
        },
    }
}

/// Probe `hours` in ascending order and keep them until the first one that
/// is not published.
pub async fn scan_available(
    source: &dyn DataSource,
    model: &ModelDefinition,
    run: DateTime<Utc>,
    hours: &[u32],
) -> Vec<u32> {
    let mut sorted = hours.to_vec();
    sorted.sort_unstable();

    let mut available = Vec::with_capacity(sorted.len());
    for fxx in sorted {
        let target = SourceTarget::for_model(model, run, fxx);
        match source.probe(&target).await {
            Ok(()) => available.push(fxx),
            Err(e) => {
                debug!(model = %model.id, fxx, error = %e, "Gap in published hours, stopping scan");
                break;
            }
        }
    }
    available
}

/// Merge processed frames into a record; existing hours are replaced in place.
pub fn merge(record: &mut RunRecord, frames: impl IntoIterator<Item = FrameRecord>) {
    for frame in frames {
        record.merge_frame(frame);
    }
}

pub struct Reconciler {
    source: Arc<dyn DataSource>,
}

impl Reconciler {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    /// Plan a model: a new run schedules every expected hour; the same run
    /// schedules the published prefix of the unrecorded hours.
    #[instrument(skip(self, model, previous), fields(model = %model.id))]
    pub async fn reconcile(
        &self,
        model: &ModelDefinition,
        discovered: DateTime<Utc>,
        previous: Option<&RunRecord>,
    ) -> Plan {
        let mut plan = plan(model, discovered, previous);
        if plan.kind == PlanKind::SameRun {
            plan.hours = scan_available(self.source.as_ref(), model, discovered, &plan.hours).await;
        }

        info!(
            kind = ?plan.kind,
            run = %plan.record.run_time,
            recorded = plan.record.frames.len(),
            scheduled = plan.hours.len(),
            "Reconciled model"
        );
        plan
    }

    /// Hours of a plan that can be processed now.
    pub async fn ready_hours(&self, model: &ModelDefinition, discovered: DateTime<Utc>, plan: &Plan) -> Vec<u32> {
        if plan.needs_scan() {
            scan_available(self.source.as_ref(), model, discovered, &plan.hours).await
        } else {
            plan.hours.clone()
        }
    }
}
