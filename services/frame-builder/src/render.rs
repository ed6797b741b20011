//! PNG frame renderer writing under an output directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use nwp_common::{ArtifactRef, FrameError, FrameResult, RenderRequest, Renderer};

pub struct PngRenderer {
    output_dir: PathBuf,
}

impl PngRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl Renderer for PngRenderer {
    async fn render(&self, request: RenderRequest) -> FrameResult<ArtifactRef> {
        let artifact = request.artifact_path();
        let target = self.output_dir.join(&artifact);

        let written = target.clone();
        let size = tokio::task::spawn_blocking(move || encode_and_write(&request, &written))
            .await
            .map_err(|e| FrameError::Render(format!("render task failed: {}", e)))??;

        metrics::counter!("render_bytes_total").increment(size as u64);
        debug!(path = %target.display(), bytes = size, "Wrote frame");
        Ok(artifact)
    }
}

fn encode_and_write(request: &RenderRequest, target: &Path) -> FrameResult<usize> {
    let grid = request.field.grid;
    let title = format!("{} {} f{:03}", request.style.label, request.model, request.forecast_hour);
    let png = renderer::render_png(
        &request.field.north_up_rows(),
        grid.nx,
        grid.ny,
        &request.style.color_map,
        (request.style.min, request.style.max),
        request.style.smooth,
        &[
            ("Title", title.as_str()),
            ("Model", request.model.as_str()),
            ("Valid", request.valid.as_str()),
        ],
    )
    .map_err(|e| FrameError::Render(e.to_string()))?;

    write_atomic(target, &png)
        .map_err(|e| FrameError::Render(format!("{}: {}", target.display(), e)))?;
    Ok(png.len())
}

/// Write next to the target and rename, so a half-written image is never
/// visible under the final name.
fn write_atomic(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);

    if let Err(e) = std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, target)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nwp_common::{Field, Grid, ScanMode};
    use test_utils::fixtures::{refc_recipe, temp_recipe};
    use test_utils::generators::{create_temperature_grid, temperature_field};

    fn request(field: Field, variable: &str, style: nwp_common::VariableStyle) -> RenderRequest {
        RenderRequest {
            field,
            style,
            model: "hrrr".to_string(),
            variable: variable.to_string(),
            forecast_hour: 6,
            valid: "2024-01-15T18:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_writes_png_at_artifact_path() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PngRenderer::new(dir.path());

        let field = temperature_field(16, 8).map(nwp_common::units::kelvin_to_fahrenheit);
        let artifact = tokio_test::assert_ok!(
            renderer
                .render(request(field, "temp", temp_recipe().style))
                .await
        );

        assert_eq!(artifact, "hrrr/temp/f006.png");
        let bytes = std::fs::read(dir.path().join(&artifact)).unwrap();
        assert_eq!(&bytes[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
        assert!(!dir.path().join("hrrr/temp/f006.png.part").exists());
    }

    #[tokio::test]
    async fn test_south_first_grid_renders() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PngRenderer::new(dir.path());
        let field = Field {
            grid: Grid::new(4, 3, ScanMode::south_first()),
            values: create_temperature_grid(4, 3),
        };
        let artifact = renderer
            .render(request(field, "refc", refc_recipe().style))
            .await
            .unwrap();
        assert!(dir.path().join(artifact).exists());
    }

    #[tokio::test]
    async fn test_unknown_color_map_is_render_failure() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = PngRenderer::new(dir.path());
        let mut style = temp_recipe().style;
        style.color_map = "nonexistent".to_string();

        let err = renderer
            .render(request(temperature_field(4, 4), "temp", style))
            .await
            .unwrap_err();
        assert_eq!(err.kind().as_str(), "render_failure");
        assert!(!dir.path().join("hrrr/temp/f006.png").exists());
    }
}
