use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::syntax::SyntaxError;

/// Request to bundle one entry module into one output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleRequest {
    pub entry: PathBuf,
    pub output: PathBuf,
    /// Module specifiers left as imports (matched exactly or as a `/` prefix).
    #[serde(default)]
    pub externals: Vec<String>,
    #[serde(default)]
    pub minify: bool,
    #[serde(default)]
    pub source_map: bool,
}

impl BundleRequest {
    pub fn new(entry: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            entry: entry.into(),
            output: output.into(),
            externals: Vec::new(),
            minify: false,
            source_map: false,
        }
    }

    pub fn with_externals<I, S>(mut self, externals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.externals = externals.into_iter().map(Into::into).collect();
        self
    }

    pub fn minified(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    pub fn with_source_map(mut self, source_map: bool) -> Self {
        self.source_map = source_map;
        self
    }

    pub fn is_external(&self, specifier: &str) -> bool {
        self.externals.iter().any(|ext| {
            specifier == ext
                || specifier.strip_prefix(ext.as_str()).is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// What a bundler produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleOutput {
    pub output: PathBuf,
    pub source_map: Option<PathBuf>,
    /// Local modules inlined into the output, dependencies first.
    #[serde(default)]
    pub modules: Vec<PathBuf>,
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Bundle entry not found at {0}")]
    MissingEntry(PathBuf),
    #[error("Bundler not found: {name} (available: {available})")]
    UnknownBundler { name: String, available: String },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("Cannot resolve import `{specifier}` from {from}")]
    Unresolved { specifier: String, from: PathBuf },
    #[error("Import `{specifier}` in {from} is neither relative nor declared external")]
    NotExternal { specifier: String, from: PathBuf },
    #[error("`{name}` is not exported by {module} (imported from {from})")]
    MissingExport { name: String, module: PathBuf, from: PathBuf },
    #[error("Import cycle: {0}")]
    Cycle(String),
    #[error("Top-level name `{name}` is defined in both {first} and {second}")]
    Collision { name: String, first: PathBuf, second: PathBuf },
    #[error("Unsupported construct in {path}: {construct}")]
    Unsupported { path: PathBuf, construct: String },
    #[error("Bundler tool error: {0}")]
    Tool(String),
}

impl BundleError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BundleError::Io { path: path.into(), source }
    }
}

/// Trait implemented by bundler backends (in-process or external tool).
pub trait Bundler: Send + Sync {
    fn bundle(&self, request: &BundleRequest) -> Result<BundleOutput, BundleError>;
    fn name(&self) -> &'static str;
    /// Version string recorded in build metadata.
    fn version(&self) -> Result<String, BundleError>;
}

/// Registry for bundlers; callers select by name.
#[derive(Default)]
pub struct BundlerRegistry {
    bundlers: HashMap<String, Box<dyn Bundler>>,
}

impl BundlerRegistry {
    pub fn new() -> Self {
        Self { bundlers: HashMap::new() }
    }

    /// Register `bundler`, replacing any previous one of the same name.
    pub fn register<B: Bundler + 'static>(&mut self, bundler: B) -> &mut Self {
        self.bundlers.insert(bundler.name().to_string(), Box::new(bundler));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Bundler> {
        self.bundlers.get(name).map(|b| &**b)
    }

    /// Like `get`, but an unknown name is an error listing the alternatives.
    pub fn require(&self, name: &str) -> Result<&dyn Bundler, BundleError> {
        self.get(name).ok_or_else(|| BundleError::UnknownBundler {
            name: name.to_string(),
            available: self.names().join(", "),
        })
    }

    /// Return a sorted list of registered bundler names for error messages/help.
    pub fn names(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.bundlers.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Registry populated with every bundler compiled into this build.
pub fn default_bundler_registry() -> BundlerRegistry {
    let mut registry = BundlerRegistry::new();
    registry.register(crate::services::bundlers::NativeBundler);
    #[cfg(feature = "esbuild-bundler")]
    {
        registry.register(crate::services::bundlers::EsbuildBundler::from_env());
    }
    registry
}
