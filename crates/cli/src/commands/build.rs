use anyhow::{bail, Result};
use pipeline_core::services::build::{bundler_registry, BuildOptions, BuildRunner};

use super::util::{display_relative, load_context};

/// Build every resolver (or one service) into artifacts and manifests.
pub fn build_command(config: &str, options: BuildOptions) -> Result<()> {
    let ctx = load_context(config)?;
    let registry = bundler_registry(&ctx);
    let runner = BuildRunner::new(&ctx, &registry, &options)?;
    let report = runner.run(&options)?;

    println!("Build ({} bundler):", report.bundler);
    for outcome in &report.resolvers {
        let source = display_relative(&outcome.source, ctx.root());
        match &outcome.result {
            Ok(built) => {
                println!("  ok   {} ({})", built.name, source);
                println!("       manifest: {}", display_relative(&built.manifest, ctx.root()));
                for artifact in &built.artifacts {
                    println!("       artifact: {}", display_relative(artifact, ctx.root()));
                }
            }
            Err(err) => {
                let name = outcome.name.as_deref().unwrap_or("?");
                println!("  FAIL {} ({}): {}", name, source, err);
            }
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        bail!("{} of {} resolvers failed to build", failed, report.resolvers.len());
    }
    Ok(())
}
