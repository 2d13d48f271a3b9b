use std::path::Path;

use anyhow::{Context, Result};
use pipeline_core::project::BuildContext;
use tracing::debug;

use crate::canonicalize_or_current;

/// Load the build context for a `--config` argument.
pub fn load_context(config: &str) -> Result<BuildContext> {
    let path = canonicalize_or_current(config)?;
    let ctx = BuildContext::load(&path)
        .with_context(|| format!("Failed to load build context from {}", path.display()))?;
    debug!(
        config = %ctx.config_path.display(),
        project = %ctx.config.name,
        bundler = %ctx.config.bundler,
        "loaded build context"
    );
    Ok(ctx)
}

/// Resolve a `--file` argument against the current directory.
pub fn resolve_file(file: &str) -> Result<std::path::PathBuf> {
    let path = canonicalize_or_current(file)?;
    if !path.is_file() {
        anyhow::bail!("Resolver file not found: {}", path.display());
    }
    Ok(path)
}

/// Path shown relative to `root` when possible.
pub fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
