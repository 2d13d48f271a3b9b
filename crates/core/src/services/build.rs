use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::{summarize, SliceError, Slicer, StepModule, SummaryError};
use crate::discovery::{discover, DiscoveryError};
use crate::manifest::{assemble, write_manifest, ManifestError};
use crate::model::{ResolverSummary, StepKind};
use crate::project::{sha256_bytes, step_file_name, write_atomic, BuildConfig, BuildContext};
use crate::services::bundle::{default_bundler_registry, BundleError, BundleRequest, Bundler, BundlerRegistry};
use crate::services::driver::{driver_source, DriverSpec};
use crate::syntax::{ParsedModule, SyntaxError};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Summary(#[from] SummaryError),
    #[error(transparent)]
    Slice(#[from] SliceError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Resolver name `{name}` is declared by both {first} and {second}")]
    DuplicateResolver { name: String, first: PathBuf, second: PathBuf },
}

impl BuildError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io { path: path.into(), source }
    }
}

/// Per-invocation overrides of the config (CLI flags).
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub service: Option<String>,
    pub bundler: Option<String>,
    pub source_maps: Option<bool>,
}

/// Recorded next to each manifest as `<dist>/metadata/<resolver>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    pub resolver: String,
    pub source: String,
    pub source_hash: String,
    pub bundler: String,
    pub bundler_version: String,
    pub started_at: String,
    pub finished_at: String,
    pub artifacts: Vec<ArtifactRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub step: String,
    pub kind: StepKind,
    /// Path relative to the dist root.
    pub path: String,
    pub sha256: String,
}

/// A resolver after pre-bundling and summarization.
#[derive(Debug, Clone)]
pub struct PreparedResolver {
    pub source: PathBuf,
    pub source_hash: String,
    pub bundled: PathBuf,
    pub summary: ResolverSummary,
}

/// A resolver whose artifacts and manifest were written.
#[derive(Debug, Clone)]
pub struct ResolverBuild {
    pub name: String,
    pub source: PathBuf,
    pub manifest: PathBuf,
    /// Final artifacts in step order.
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct ResolverOutcome {
    pub source: PathBuf,
    /// Known once summarization succeeded.
    pub name: Option<String>,
    pub result: Result<ResolverBuild, BuildError>,
}

#[derive(Debug)]
pub struct BuildReport {
    pub bundler: String,
    pub resolvers: Vec<ResolverOutcome>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.resolvers.iter().all(|r| r.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResolverOutcome> {
        self.resolvers.iter().filter(|r| r.result.is_err())
    }

    pub fn built(&self) -> impl Iterator<Item = &ResolverBuild> {
        self.resolvers.iter().filter_map(|r| r.result.as_ref().ok())
    }
}

/// Registry with the config's `esbuild_path` applied.
pub fn bundler_registry(ctx: &BuildContext) -> BundlerRegistry {
    #[allow(unused_mut)]
    let mut registry = default_bundler_registry();
    #[cfg(feature = "esbuild-bundler")]
    if let Some(path) = &ctx.config.esbuild_path {
        let path = Path::new(path);
        let path = if path.is_relative() && path.components().count() > 1 {
            ctx.root().join(path)
        } else {
            path.to_path_buf()
        };
        registry.register(crate::services::bundlers::EsbuildBundler::new(path));
    }
    #[cfg(not(feature = "esbuild-bundler"))]
    let _ = ctx;
    registry
}

/// Coordinator that runs every stage for the resolvers of one build context.
pub struct BuildRunner<'a> {
    pub ctx: &'a BuildContext,
    pub bundler: &'a dyn Bundler,
    pub source_maps: bool,
}

impl<'a> BuildRunner<'a> {
    /// Select the bundler (override or config) and source-map setting.
    pub fn new(
        ctx: &'a BuildContext,
        registry: &'a BundlerRegistry,
        options: &BuildOptions,
    ) -> Result<Self, BuildError> {
        let name = options.bundler.as_deref().unwrap_or(&ctx.config.bundler);
        let bundler = registry.require(name)?;
        let source_maps = options.source_maps.unwrap_or(ctx.config.source_maps);
        Ok(Self { ctx, bundler, source_maps })
    }

    fn config(&self) -> &BuildConfig {
        &self.ctx.config
    }

    /// Full build: discover, pre-bundle and summarize, then slice, post-bundle
    /// and write manifests. Failures are per resolver and land in the report.
    pub fn run(&self, options: &BuildOptions) -> Result<BuildReport, BuildError> {
        let layout = &self.ctx.layout;
        let patterns = self
            .config()
            .patterns(options.service.as_deref())
            .map_err(|e| BuildError::Config(format!("{e:#}")))?;
        let files = discover(&patterns, self.ctx.root())?;
        info!(count = files.len(), bundler = self.bundler.name(), "building resolvers");

        reset_dir(&layout.temp_root)?;
        for dir in [
            &layout.resolvers_dir,
            &layout.sliced_dir,
            &layout.steps_dir,
            &layout.staging_dir,
            &layout.functions_dir,
            &layout.pipelines_dir,
            &layout.metadata_dir,
        ] {
            fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
        }

        let bundler_version = self.bundler.version().unwrap_or_else(|e| {
            warn!(bundler = self.bundler.name(), error = %e, "could not determine bundler version");
            "unknown".to_string()
        });
        let started_at = Utc::now().to_rfc3339();

        let targets = bundle_targets(&files, |f| layout.bundled_resolver(f));
        let prepared: Vec<(PathBuf, Result<PreparedResolver, BuildError>)> = targets
            .par_iter()
            .map(|(source, bundled)| (source.clone(), self.prepare_into(source, bundled)))
            .collect();
        let prepared = reject_duplicate_names(prepared);

        let resolvers: Vec<ResolverOutcome> = prepared
            .into_par_iter()
            .map(|(source, prepared)| match prepared {
                Err(BuildError::DuplicateResolver { name, first, second }) => {
                    let err = BuildError::DuplicateResolver { name: name.clone(), first, second };
                    warn!(resolver = %name, error = %err, "resolver failed");
                    self.remove_stale_outputs(&name);
                    ResolverOutcome { source, name: Some(name), result: Err(err) }
                }
                Err(err) => {
                    warn!(source = %source.display(), error = %err, "resolver failed before summarization");
                    ResolverOutcome { source, name: None, result: Err(err) }
                }
                Ok(prepared) => {
                    let name = prepared.summary.name.clone();
                    let result = self.compile(&prepared, &bundler_version, &started_at);
                    if let Err(err) = &result {
                        warn!(resolver = %name, error = %err, "resolver failed");
                        self.remove_stale_outputs(&name);
                    }
                    ResolverOutcome { source, name: Some(name), result }
                }
            })
            .collect();

        Ok(BuildReport { bundler: self.bundler.name().to_string(), resolvers })
    }

    /// Pre-bundle `source` into the temp root and summarize it.
    pub fn prepare(&self, source: &Path) -> Result<PreparedResolver, BuildError> {
        let bundled = self.ctx.layout.bundled_resolver(source);
        self.prepare_into(source, &bundled)
    }

    fn prepare_into(&self, source: &Path, bundled: &Path) -> Result<PreparedResolver, BuildError> {
        let bytes = fs::read(source).map_err(|e| BuildError::io(source, e))?;
        let request = BundleRequest::new(source, bundled)
            .with_externals([self.config().framework_module.clone()]);
        self.bundler.bundle(&request)?;
        let summary = summarize(bundled, &self.ctx.convention())?;
        info!(resolver = %summary.name, steps = summary.steps.len(), "pre-bundled and summarized");
        Ok(PreparedResolver {
            source: source.to_path_buf(),
            source_hash: sha256_bytes(&bytes),
            bundled: bundled.to_path_buf(),
            summary,
        })
    }

    /// Per-step minimal modules of a prepared resolver.
    pub fn slice(&self, prepared: &PreparedResolver) -> Result<Vec<StepModule>, BuildError> {
        let text = fs::read_to_string(&prepared.bundled)
            .map_err(|e| BuildError::io(&prepared.bundled, e))?;
        let module = ParsedModule::parse(text, prepared.bundled.display().to_string())?;
        let slicer = Slicer::new(self.ctx.convention());
        Ok(slicer.analyze(&module, &prepared.summary.steps)?.per_step())
    }

    fn compile(
        &self,
        prepared: &PreparedResolver,
        bundler_version: &str,
        started_at: &str,
    ) -> Result<ResolverBuild, BuildError> {
        let layout = &self.ctx.layout;
        let resolver = prepared.summary.name.as_str();
        let modules = self.slice(prepared)?;

        for module in &modules {
            let sliced = layout.sliced_module(resolver, &module.step);
            write_file(&sliced, module.text.as_bytes())?;
            let specifier = format!("../sliced/{}", step_file_name(resolver, &module.step));
            let driver = driver_source(&DriverSpec {
                kind: module.kind,
                export_name: &module.export_name,
                module_specifier: &specifier,
                entrypoint: &self.config().entrypoint,
                sql_transaction: self.config().sql_transaction,
            });
            write_file(&layout.driver(resolver, &module.step), driver.as_bytes())?;
        }

        let staged_dir = layout.staged_dir(resolver);
        reset_dir(&staged_dir)?;
        let outputs = modules
            .par_iter()
            .map(|module| {
                let request = BundleRequest::new(
                    layout.driver(resolver, &module.step),
                    layout.staged_artifact(resolver, &module.step),
                )
                .minified(self.config().minify)
                .with_source_map(self.source_maps);
                self.bundler.bundle(&request).map(|out| (module, out))
            })
            .collect::<Result<Vec<_>, BundleError>>()?;

        // Every step compiled; publish.
        let previous = read_metadata(&layout.metadata(resolver));
        let mut artifacts = BTreeMap::new();
        let mut records = Vec::with_capacity(outputs.len());
        let mut published = Vec::with_capacity(outputs.len());
        for (module, out) in outputs {
            let dest = layout.artifact(resolver, &module.step);
            move_file(&out.output, &dest)?;
            if let Some(map) = &out.source_map {
                move_file(map, &with_suffix(&dest, ".map"))?;
            }
            let bytes = fs::read(&dest).map_err(|e| BuildError::io(&dest, e))?;
            records.push(ArtifactRecord {
                step: module.step.clone(),
                kind: module.kind,
                path: relative_to(&dest, &layout.dist_root),
                sha256: sha256_bytes(&bytes),
            });
            artifacts.insert(module.step.clone(), dest.clone());
            published.push(dest);
        }
        if let Some(previous) = previous {
            self.remove_orphans(&previous, &records);
        }

        let descriptor = assemble(&prepared.summary, &artifacts, &self.config().entrypoint)?;
        let manifest = layout.manifest(resolver);
        write_manifest(&manifest, &descriptor)?;

        let metadata = BuildMetadata {
            resolver: resolver.to_string(),
            source: prepared.source.display().to_string(),
            source_hash: prepared.source_hash.clone(),
            bundler: self.bundler.name().to_string(),
            bundler_version: bundler_version.to_string(),
            started_at: started_at.to_string(),
            finished_at: Utc::now().to_rfc3339(),
            artifacts: records,
        };
        let body = serde_json::to_vec_pretty(&metadata).map_err(ManifestError::from)?;
        let metadata_path = layout.metadata(resolver);
        write_atomic(&metadata_path, &body).map_err(|e| BuildError::io(&metadata_path, e))?;

        info!(resolver, artifacts = published.len(), "resolver built");
        Ok(ResolverBuild {
            name: resolver.to_string(),
            source: prepared.source.clone(),
            manifest,
            artifacts: published,
        })
    }

    /// Delete artifacts recorded by the previous build that this build no longer produces.
    fn remove_orphans(&self, previous: &BuildMetadata, current: &[ArtifactRecord]) {
        for old in &previous.artifacts {
            if current.iter().any(|c| c.path == old.path) {
                continue;
            }
            let path = self.ctx.layout.dist_root.join(&old.path);
            for stale in [with_suffix(&path, ".map"), path] {
                if let Err(e) = fs::remove_file(&stale) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %stale.display(), error = %e, "failed to remove stale artifact");
                    }
                }
            }
        }
    }

    fn remove_stale_outputs(&self, resolver: &str) {
        let layout = &self.ctx.layout;
        for path in [layout.manifest(resolver), layout.metadata(resolver)] {
            match fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "removed stale output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale output"),
            }
        }
    }
}

/// Pair each source with its bundle path; stems shared by several sources get a suffix.
fn bundle_targets(files: &[PathBuf], target: impl Fn(&Path) -> PathBuf) -> Vec<(PathBuf, PathBuf)> {
    let mut seen: HashMap<PathBuf, usize> = HashMap::new();
    files
        .iter()
        .map(|file| {
            let base = target(file);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            let bundled = if *count == 1 { base } else { with_suffix_before_ext(&base, *count) };
            (file.clone(), bundled)
        })
        .collect()
}

/// Resolver names must be unique in one build; every claimant of a taken name fails.
fn reject_duplicate_names(
    prepared: Vec<(PathBuf, Result<PreparedResolver, BuildError>)>,
) -> Vec<(PathBuf, Result<PreparedResolver, BuildError>)> {
    let mut first_owner: HashMap<String, PathBuf> = HashMap::new();
    let mut duplicates: HashMap<String, PathBuf> = HashMap::new();
    for (source, result) in &prepared {
        if let Ok(p) = result {
            match first_owner.get(&p.summary.name) {
                Some(_) => {
                    duplicates.entry(p.summary.name.clone()).or_insert_with(|| source.clone());
                }
                None => {
                    first_owner.insert(p.summary.name.clone(), source.clone());
                }
            }
        }
    }
    prepared
        .into_iter()
        .map(|(source, result)| {
            let result = match result {
                Ok(p) if duplicates.contains_key(&p.summary.name) => {
                    let first = first_owner.get(&p.summary.name).cloned().unwrap_or_default();
                    let second = duplicates.get(&p.summary.name).cloned().unwrap_or_default();
                    Err(BuildError::DuplicateResolver { name: p.summary.name, first, second })
                }
                other => other,
            };
            (source, result)
        })
        .collect()
}

fn read_metadata(path: &Path) -> Option<BuildMetadata> {
    let body = fs::read(path).ok()?;
    serde_json::from_slice(&body).ok()
}

fn reset_dir(dir: &Path) -> Result<(), BuildError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| BuildError::io(path, e))
}

/// Rename, falling back to copy + delete across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), BuildError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| BuildError::io(to, e))?;
    fs::remove_file(from).map_err(|e| BuildError::io(from, e))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

fn with_suffix_before_ext(path: &Path, n: usize) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}__{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}__{n}"),
    };
    path.with_file_name(name)
}

fn relative_to(path: &Path, base: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).to_string_lossy().replace('\\', "/")
}
