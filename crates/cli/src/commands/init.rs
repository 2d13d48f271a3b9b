use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use pipeline_core::project::{write_build_config, BuildConfig, BuildLayout, DEFAULT_CONFIG_FILE};

use crate::{canonicalize_or_current, infer_project_name};

const SAMPLE_RESOLVER: &str = r#"import { createResolver } from "@pipeline/sdk";

const GREETING = "Hello";

export default createResolver({
  name: "hello",
  operation: "query",
  description: "Greets the caller",
  args: "name: String!",
  returns: "String",
  steps: [
    {
      kind: "function",
      name: "greet",
      fn: async (ctx: { args: { name: string } }) => `${GREETING}, ${ctx.args.name}!`,
    },
  ],
});
"#;

/// Write a default `pipeline.config.json` and a sample resolver under `root`.
pub fn init_command(root: &str, name: Option<String>, force: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    fs::create_dir_all(&root_path)
        .with_context(|| format!("Failed to create root dir: {}", root_path.display()))?;
    let config_path = root_path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", config_path.display());
    }

    let project_name = name.unwrap_or_else(|| infer_project_name(&root_path));
    let config = BuildConfig::new(&project_name);
    write_build_config(&config_path, &config)?;

    let resolvers_dir = root_path.join("resolvers");
    fs::create_dir_all(&resolvers_dir)
        .with_context(|| format!("Failed to create resolvers dir: {}", resolvers_dir.display()))?;
    let sample = resolvers_dir.join("hello.ts");
    let wrote_sample = write_if_missing(&sample, SAMPLE_RESOLVER)?;

    let layout = BuildLayout::from_config(&root_path, &config);
    println!("Initialized pipeline project:");
    println!("  Name: {}", project_name);
    println!("  Root: {}", root_path.display());
    println!("  Config: {}", config_path.display());
    println!("  Resolvers: {}", resolvers_dir.display());
    if wrote_sample {
        println!("  Sample resolver: {}", sample.display());
    }
    println!("  Temp dir: {}", layout.temp_root.display());
    println!("  Dist dir: {}", layout.dist_root.display());
    Ok(())
}

fn write_if_missing(path: &Path, body: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}
