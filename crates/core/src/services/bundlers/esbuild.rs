use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::services::bundle::{BundleError, BundleOutput, BundleRequest, Bundler};

/// esbuild-backed bundler that shells out to the `esbuild` executable.
pub struct EsbuildBundler {
    path: PathBuf,
}

impl EsbuildBundler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `ESBUILD_BIN` when set, else `esbuild` from `PATH`.
    pub fn from_env() -> Self {
        Self::new(resolve_esbuild_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Bundler for EsbuildBundler {
    fn bundle(&self, request: &BundleRequest) -> Result<BundleOutput, BundleError> {
        if !request.entry.is_file() {
            return Err(BundleError::MissingEntry(request.entry.clone()));
        }
        if let Some(parent) = request.output.parent() {
            fs::create_dir_all(parent).map_err(|e| BundleError::io(parent, e))?;
        }

        let args = esbuild_args(request);
        debug!(tool = %self.path.display(), ?args, "running esbuild");
        let output = Command::new(&self.path)
            .args(&args)
            .output()
            .map_err(|e| BundleError::Tool(format!("failed to spawn {}: {e}", self.path.display())))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BundleError::Tool(format!(
                "esbuild exited with {} while bundling {}: {}",
                output.status,
                request.entry.display(),
                stderr.trim()
            )));
        }
        if !request.output.is_file() {
            return Err(BundleError::Tool(format!(
                "esbuild reported success but wrote no {}",
                request.output.display()
            )));
        }

        let map = map_path(&request.output);
        Ok(BundleOutput {
            output: request.output.clone(),
            source_map: (request.source_map && map.is_file()).then_some(map),
            modules: vec![request.entry.clone()],
        })
    }

    fn name(&self) -> &'static str {
        "esbuild"
    }

    fn version(&self) -> Result<String, BundleError> {
        let output = Command::new(&self.path)
            .arg("--version")
            .output()
            .map_err(|e| BundleError::Tool(format!("failed to spawn {}: {e}", self.path.display())))?;
        if !output.status.success() {
            return Err(BundleError::Tool(format!("esbuild --version exited with {}", output.status)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            Err(BundleError::Tool("esbuild --version produced no output".to_string()))
        } else {
            Ok(stdout)
        }
    }
}

fn resolve_esbuild_path() -> PathBuf {
    std::env::var_os("ESBUILD_BIN").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("esbuild"))
}

/// Command line for one request; order is stable so it can be asserted on.
pub fn esbuild_args(request: &BundleRequest) -> Vec<String> {
    let mut args = vec![
        request.entry.display().to_string(),
        "--bundle".to_string(),
        "--format=esm".to_string(),
        "--platform=neutral".to_string(),
        "--log-level=warning".to_string(),
        format!("--outfile={}", request.output.display()),
    ];
    args.extend(request.externals.iter().map(|ext| format!("--external:{ext}")));
    if request.minify {
        args.push("--minify".to_string());
    }
    if request.source_map {
        args.push("--sourcemap".to_string());
    }
    args
}

fn map_path(output: &Path) -> PathBuf {
    let mut raw = output.as_os_str().to_owned();
    raw.push(".map");
    PathBuf::from(raw)
}
