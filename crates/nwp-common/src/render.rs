//! Contract of the frame renderer.

use async_trait::async_trait;

use crate::catalog::VariableStyle;
use crate::error::FrameResult;
use crate::grid::Field;

/// Reference to a rendered artifact, as stored in the status file.
pub type ArtifactRef = String;

/// Everything the renderer needs for one frame of one variable.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Converted field, grid included
    pub field: Field,
    pub style: VariableStyle,
    pub model: String,
    pub variable: String,
    pub forecast_hour: u32,
    /// Canonical valid timestamp
    pub valid: String,
}

impl RenderRequest {
    /// Deterministic artifact path relative to the output root.
    pub fn artifact_path(&self) -> String {
        artifact_path(&self.model, &self.variable, self.forecast_hour)
    }
}

pub fn artifact_path(model: &str, variable: &str, forecast_hour: u32) -> String {
    format!("{}/{}/f{:03}.png", model, variable, forecast_hour)
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: RenderRequest) -> FrameResult<ArtifactRef>;
}
