//! Pipeline descriptor assembly and writing.
//!
//! A descriptor embeds each step's compiled code as `operationSource`, so
//! consumers never need the artifact files. Those live at
//! `<dist>/functions/<resolver>__<step>.js` (see [`step_file_name`]), not at
//! `functions/<step>.js`: two resolvers may both define a step named `step1`.
//!
//! [`step_file_name`]: crate::project::step_file_name

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::model::{OperationType, PipelineDescriptor, PipelineEntry, ResolverSummary, StepKind};
use crate::project::write_atomic;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("No compiled artifact for step `{step}` of resolver `{resolver}`")]
    MissingArtifact { resolver: String, step: String },
    #[error("Failed to read compiled artifact {path}: {source}")]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write manifest {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Runtime operation type for a step kind. SQL steps run as functions that
/// drive the runtime's SQL client.
pub fn operation_type(kind: StepKind) -> OperationType {
    match kind {
        StepKind::Function | StepKind::Sql => OperationType::Function,
        StepKind::Graphql => OperationType::Graphql,
    }
}

/// Step schema fragments followed by the root type extension for the resolver.
pub fn synthesize_sdl(summary: &ResolverSummary) -> String {
    let mut parts: Vec<String> = summary
        .steps
        .iter()
        .filter_map(|s| s.schema.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let field = match summary.args.as_deref().map(str::trim) {
        Some(args) if !args.is_empty() => format!("{}({}): {}", summary.name, args, summary.returns),
        _ => format!("{}: {}", summary.name, summary.returns),
    };
    let field = match summary.description.as_deref() {
        Some(desc) if !desc.trim().is_empty() => {
            format!("  \"\"\"{}\"\"\"\n  {}", desc.trim(), field)
        }
        _ => format!("  {field}"),
    };
    parts.push(format!("extend type {} {{\n{}\n}}", summary.operation.root_type(), field));
    parts.join("\n\n") + "\n"
}

/// Build the descriptor, embedding each step's compiled artifact read from disk.
///
/// `artifacts` maps step name → artifact path; every step must have one.
pub fn assemble(
    summary: &ResolverSummary,
    artifacts: &BTreeMap<String, PathBuf>,
    entrypoint: &str,
) -> Result<PipelineDescriptor, ManifestError> {
    let mut pipelines = Vec::with_capacity(summary.steps.len());
    for step in &summary.steps {
        let path = artifacts.get(&step.name).ok_or_else(|| ManifestError::MissingArtifact {
            resolver: summary.name.clone(),
            step: step.name.clone(),
        })?;
        let operation_source = fs::read_to_string(path)
            .map_err(|source| ManifestError::ReadArtifact { path: path.clone(), source })?;
        pipelines.push(PipelineEntry {
            name: step.name.clone(),
            description: step.description.clone().unwrap_or_default(),
            operation_type: operation_type(step.kind),
            operation_source,
            operation_name: entrypoint.to_string(),
        });
    }
    Ok(PipelineDescriptor { name: summary.name.clone(), sdl: synthesize_sdl(summary), pipelines })
}

/// Atomically replace `path` with the pretty-printed descriptor.
pub fn write_manifest(path: &Path, descriptor: &PipelineDescriptor) -> Result<(), ManifestError> {
    let mut body = serde_json::to_string_pretty(descriptor)?;
    body.push('\n');
    write_atomic(path, body.as_bytes())
        .map_err(|source| ManifestError::Write { path: path.to_path_buf(), source })?;
    debug!(manifest = %path.display(), steps = descriptor.pipelines.len(), "wrote manifest");
    Ok(())
}
