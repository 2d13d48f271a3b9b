use anyhow::{bail, Context, Result};
use pipeline_core::services::build::{bundler_registry, BuildOptions, BuildRunner};

use super::util::{load_context, resolve_file};

/// Pre-bundle, summarize and slice one resolver; print the per-step modules.
pub fn slice_command(
    config: &str,
    file: &str,
    step: Option<&str>,
    bundler: Option<String>,
) -> Result<()> {
    let ctx = load_context(config)?;
    let registry = bundler_registry(&ctx);
    let options = BuildOptions { bundler, ..Default::default() };
    let runner = BuildRunner::new(&ctx, &registry, &options)?;
    let source = resolve_file(file)?;
    let prepared = runner
        .prepare(&source)
        .with_context(|| format!("Failed to summarize {}", source.display()))?;
    let modules = runner
        .slice(&prepared)
        .with_context(|| format!("Failed to slice {}", source.display()))?;

    let selected: Vec<_> = match step {
        Some(name) => modules.iter().filter(|m| m.step == name).collect(),
        None => modules.iter().collect(),
    };
    if selected.is_empty() {
        if let Some(name) = step {
            bail!(
                "Step '{}' not found in resolver '{}' (steps: {})",
                name,
                prepared.summary.name,
                modules.iter().map(|m| m.step.as_str()).collect::<Vec<_>>().join(", ")
            );
        }
    }

    for module in selected {
        println!("// ---- {} :: {} ({}) -> {}", prepared.summary.name, module.step, module.kind, module.export_name);
        print!("{}", module.text);
    }
    Ok(())
}
