//! Prometheus metrics, exported as a textfile at the end of a run.

use std::path::Path;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global recorder.
pub fn install() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Write the current exposition text to `path` (node-exporter textfile
/// collector format).
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    write_rendered(&handle.render(), path)
}

fn write_rendered(text: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create metrics directory: {}", parent.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    std::fs::write(&tmp, text)
        .with_context(|| format!("Failed to write metrics file: {}", path.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move metrics file into place: {}", path.display()))?;

    info!(path = %path.display(), "Wrote metrics textfile");
    Ok(())
}
