//! Common types and utilities shared across the NWP frame builder crates.

pub mod catalog;
pub mod error;
pub mod grid;
pub mod render;
pub mod selector;
pub mod source;
pub mod status;
pub mod time;
pub mod units;

pub use catalog::{
    DerivedWindGroup, ModelCatalog, ModelDefinition, SourceEndpoint, UnitKind, VariableBinding,
    VariableRecipe, VariableStyle,
};
pub use error::{FrameError, FrameErrorKind, FrameResult};
pub use grid::{Field, Grid, ScanMode};
pub use render::{ArtifactRef, RenderRequest, Renderer};
pub use selector::FieldSelector;
pub use source::{DataSource, FieldQuery, FieldRequest, FieldSet, SourceTarget};
pub use status::{FrameRecord, RunRecord, StatusStore};
