//! Contract of the raw-data retrieval client.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::catalog::{ModelDefinition, SourceEndpoint};
use crate::error::FrameResult;
use crate::grid::Field;
use crate::selector::FieldSelector;

/// Which file to look at: model, product, run, hour and where to look.
#[derive(Debug, Clone)]
pub struct SourceTarget {
    pub model: String,
    pub product: String,
    /// Endpoints, most preferred first
    pub sources: Vec<SourceEndpoint>,
    pub ensemble_member: Option<u32>,
    pub run: DateTime<Utc>,
    pub forecast_hour: u32,
}

impl SourceTarget {
    pub fn for_model(model: &ModelDefinition, run: DateTime<Utc>, forecast_hour: u32) -> Self {
        Self {
            model: model.source_model.clone(),
            product: model.product.clone(),
            sources: model.ordered_sources(),
            ensemble_member: model.ensemble_member,
            run,
            forecast_hour,
        }
    }
}

/// One variable to extract, with its selector at each source.
#[derive(Debug, Clone)]
pub struct FieldQuery {
    pub key: String,
    /// (source name, selector) pairs
    pub selectors: Vec<(String, FieldSelector)>,
    /// Match the accumulation window from initialization to this hour
    pub accumulated: bool,
}

impl FieldQuery {
    pub fn selector_for(&self, source: &str) -> Option<&FieldSelector> {
        self.selectors
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, selector)| selector)
    }
}

#[derive(Debug, Clone)]
pub struct FieldRequest {
    pub target: SourceTarget,
    pub queries: Vec<FieldQuery>,
}

/// Fields found for a request, all from one source.
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    /// Source that answered
    pub source: String,
    /// Query key -> field; missing keys were not found
    pub fields: HashMap<String, Field>,
}

impl FieldSet {
    pub fn take(&mut self, key: &str) -> Option<Field> {
        self.fields.remove(key).filter(|f| !f.is_empty())
    }
}

/// Raw-data retrieval client.
///
/// Transport failures are reported as `FrameError::NotYetAvailable`; callers
/// never retry within an invocation.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Whether the target file is published at any configured source.
    async fn probe(&self, target: &SourceTarget) -> FrameResult<()>;

    /// Fetch the requested fields from the first source holding the file.
    async fn fetch(&self, request: &FieldRequest) -> FrameResult<FieldSet>;
}
