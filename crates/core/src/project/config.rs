use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::{ResolverConvention, DEFAULT_FRAMEWORK_MODULE, DEFAULT_RESOLVER_FACTORY};

/// What the `sql` step driver does with its transaction once the query ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlTransaction {
    /// Roll back after running the query (dry-run semantics).
    #[default]
    Rollback,
    Commit,
}

/// Resolver files belonging to one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Single-level glob patterns, relative to the config file's directory.
    pub files: Vec<String>,
}

/// Serializable build configuration (`pipeline.config.json` or `.yaml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Project name; defaults to the config directory name when empty.
    #[serde(default)]
    pub name: String,
    pub services: BTreeMap<String, ServiceConfig>,
    #[serde(default = "default_framework_module")]
    pub framework_module: String,
    #[serde(default = "default_resolver_factory")]
    pub resolver_factory: String,
    /// Global the step driver assigns the step function to.
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,
    #[serde(default = "default_dist_dir")]
    pub dist_dir: String,
    #[serde(default = "default_bundler")]
    pub bundler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esbuild_path: Option<String>,
    #[serde(default = "default_true")]
    pub minify: bool,
    #[serde(default)]
    pub source_maps: bool,
    #[serde(default)]
    pub sql_transaction: SqlTransaction,
}

fn default_framework_module() -> String {
    DEFAULT_FRAMEWORK_MODULE.to_string()
}

fn default_resolver_factory() -> String {
    DEFAULT_RESOLVER_FACTORY.to_string()
}

fn default_entrypoint() -> String {
    "main".to_string()
}

fn default_temp_dir() -> String {
    ".pipeline-build".to_string()
}

fn default_dist_dir() -> String {
    "dist".to_string()
}

fn default_bundler() -> String {
    "native".to_string()
}

fn default_true() -> bool {
    true
}

impl BuildConfig {
    /// Config with one `resolvers` service matching `resolvers/*.ts`.
    pub fn new(name: impl Into<String>) -> Self {
        let mut services = BTreeMap::new();
        services.insert(
            "resolvers".to_string(),
            ServiceConfig { files: vec!["resolvers/*.ts".to_string()] },
        );
        Self {
            name: name.into(),
            services,
            framework_module: default_framework_module(),
            resolver_factory: default_resolver_factory(),
            entrypoint: default_entrypoint(),
            temp_dir: default_temp_dir(),
            dist_dir: default_dist_dir(),
            bundler: default_bundler(),
            esbuild_path: None,
            minify: true,
            source_maps: false,
            sql_transaction: SqlTransaction::Rollback,
        }
    }

    pub fn convention(&self) -> ResolverConvention {
        ResolverConvention::new(&self.framework_module, &self.resolver_factory)
    }

    /// Patterns of one service, or of every service when `service` is `None`.
    pub fn patterns(&self, service: Option<&str>) -> Result<Vec<String>> {
        match service {
            Some(name) => match self.services.get(name) {
                Some(svc) => Ok(svc.files.clone()),
                None => bail!(
                    "Service '{}' not found in config (available: {})",
                    name,
                    self.services.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            },
            None => Ok(self.services.values().flat_map(|s| s.files.iter().cloned()).collect()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            bail!("Config must declare at least one service");
        }
        for (name, service) in &self.services {
            if service.files.is_empty() {
                bail!("Service '{name}' declares no file patterns");
            }
        }
        if self.framework_module.trim().is_empty() {
            bail!("framework_module must not be empty");
        }
        if !is_identifier(&self.resolver_factory) {
            bail!("resolver_factory '{}' is not a valid identifier", self.resolver_factory);
        }
        if !is_identifier(&self.entrypoint) {
            bail!("entrypoint '{}' is not a valid identifier", self.entrypoint);
        }
        if self.temp_dir.trim().is_empty() || self.dist_dir.trim().is_empty() {
            bail!("temp_dir and dist_dir must not be empty");
        }
        // The temp root is wiped on every build.
        if matches!(self.temp_dir.trim_end_matches('/'), "." | ".." | "") {
            bail!("temp_dir '{}' must name a dedicated directory", self.temp_dir);
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
