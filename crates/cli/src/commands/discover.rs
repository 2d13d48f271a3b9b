use anyhow::Result;
use pipeline_core::discovery::discover;

use super::util::{display_relative, load_context};

/// List the resolver files matched by the configured patterns.
pub fn discover_command(config: &str, service: Option<&str>, json: bool) -> Result<()> {
    let ctx = load_context(config)?;
    let patterns = ctx.config.patterns(service)?;
    let files = discover(&patterns, ctx.root())?;

    if json {
        let paths: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    println!("Resolver files ({}):", files.len());
    for file in &files {
        println!("- {}", display_relative(file, ctx.root()));
    }
    Ok(())
}
