use anyhow::{Context, Result};
use pipeline_core::services::build::{bundler_registry, BuildOptions, BuildRunner};

use super::util::{load_context, resolve_file};

/// Pre-bundle one resolver file and print its step summary.
pub fn summarize_command(config: &str, file: &str, bundler: Option<String>, json: bool) -> Result<()> {
    let ctx = load_context(config)?;
    let registry = bundler_registry(&ctx);
    let options = BuildOptions { bundler, ..Default::default() };
    let runner = BuildRunner::new(&ctx, &registry, &options)?;
    let source = resolve_file(file)?;
    let prepared = runner
        .prepare(&source)
        .with_context(|| format!("Failed to summarize {}", source.display()))?;
    let summary = &prepared.summary;

    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("Resolver: {} ({:?})", summary.name, summary.operation);
    if let Some(desc) = &summary.description {
        println!("  Description: {}", desc);
    }
    if let Some(args) = &summary.args {
        println!("  Args: {}", args);
    }
    println!("  Returns: {}", summary.returns);
    println!("  Bundled: {}", prepared.bundled.display());
    println!("Steps ({}):", summary.steps.len());
    for (idx, step) in summary.steps.iter().enumerate() {
        println!("  {}. {} [{}] ({} bytes)", idx + 1, step.name, step.kind, step.closure.len());
    }
    Ok(())
}
