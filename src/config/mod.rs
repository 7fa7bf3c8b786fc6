use crate::models::ProcessConfig;
use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;

/// Load a run configuration from a YAML file and validate it.
///
/// Unknown keys are rejected, and a configuration that would do nothing
/// or carries a broken rename template is refused before any run starts.
pub fn load_process_config(path: impl AsRef<Utf8Path>) -> Result<ProcessConfig> {
    let path = path.as_ref();

    let file_contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read process config: {}", path))?;

    let config: ProcessConfig = serde_yaml_ng::from_str(&file_contents)
        .with_context(|| format!("Failed to parse process config: {}", path))?;

    config
        .validate()
        .with_context(|| format!("Invalid process config: {}", path))?;

    tracing::info!("Loaded process config from {}", path);
    Ok(config)
}

/// Save a run configuration as YAML, creating the parent directory if needed.
pub fn save_process_config(path: impl AsRef<Utf8Path>, config: &ProcessConfig) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent))?;
    }

    let yaml_string =
        serde_yaml_ng::to_string(config).context("Failed to serialize process config to YAML")?;

    fs::write(path, yaml_string)
        .with_context(|| format!("Failed to write process config: {}", path))?;

    tracing::info!("Saved process config to {}", path);
    Ok(())
}
