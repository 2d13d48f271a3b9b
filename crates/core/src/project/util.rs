use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::project::BuildConfig;

/// Load the build config from disk (YAML or JSON chosen by extension) and validate it.
///
/// An empty `name` is filled in from the config directory.
pub fn load_build_config(path: &Path) -> Result<BuildConfig> {
    let body = fs::read(path)
        .with_context(|| format!("Failed to read build config at {}", path.display()))?;
    let mut config: BuildConfig = if is_yaml(path) {
        serde_yaml::from_slice(&body).context("Failed to parse build config YAML")?
    } else {
        serde_json::from_slice(&body).context("Failed to parse build config JSON")?
    };
    if config.name.trim().is_empty() {
        config.name = path
            .parent()
            .and_then(|dir| dir.canonicalize().ok())
            .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_else(|| "unnamed-pipeline".to_string());
    }
    config
        .validate()
        .with_context(|| format!("Invalid build config at {}", path.display()))?;
    Ok(config)
}

/// Serialize `config` to `path` in the format its extension implies.
pub fn write_build_config(path: &Path, config: &BuildConfig) -> Result<()> {
    let body = if is_yaml(path) {
        serde_yaml::to_string(config).context("Failed to serialize build config YAML")?
    } else {
        serde_json::to_string_pretty(config).context("Failed to serialize build config JSON")?
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, body)
        .with_context(|| format!("Failed to write build config at {}", path.display()))
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"))
}

pub fn sha256_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Write via a sibling temp file and rename, so readers never see a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let tmp = dir.join(format!(".{file_name}.{}.tmp", std::process::id()));
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
