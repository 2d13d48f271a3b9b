use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::analysis::ResolverConvention;
use crate::project::{load_build_config, BuildConfig, BuildLayout};

/// Convenience wrapper bundling config path, loaded config and derived layout.
///
/// One context is created per invocation and passed to every stage.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub config_path: PathBuf,
    pub config: BuildConfig,
    pub layout: BuildLayout,
}

impl BuildContext {
    /// Load and validate the config at `config_path`; the layout roots at its directory.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Build config not found at {}", config_path.display()))?;
        let config = load_build_config(&config_path)?;
        Ok(Self::new(config_path, config))
    }

    pub fn new(config_path: PathBuf, config: BuildConfig) -> Self {
        let root = config_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let layout = BuildLayout::from_config(&root, &config);
        Self { config_path, config, layout }
    }

    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    pub fn convention(&self) -> ResolverConvention {
        self.config.convention()
    }
}
