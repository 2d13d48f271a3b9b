use anyhow::Result;
use pipeline_core::services::bundle::default_bundler_registry;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BundlerInfo {
    pub name: String,
    pub description: String,
    pub version: Option<String>,
}

/// List bundlers compiled into this binary.
pub fn list_bundlers_command(json: bool) -> Result<()> {
    let registry = default_bundler_registry();
    let entries: Vec<BundlerInfo> = registry
        .names()
        .into_iter()
        .map(|name| {
            let description = match name.as_str() {
                "native" => "In-process tree-sitter bundler (relative imports, type erasure)".to_string(),
                "esbuild" => "esbuild executable (ESBUILD_BIN or esbuild on PATH)".to_string(),
                other => format!("Bundler '{}'", other),
            };
            let version = registry.get(&name).and_then(|b| b.version().ok());
            BundlerInfo { name, description, version }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("Bundlers:");
    for entry in entries {
        match &entry.version {
            Some(version) => println!("- {} ({}): {}", entry.name, version, entry.description),
            None => println!("- {} (unavailable): {}", entry.name, entry.description),
        }
    }
    Ok(())
}
