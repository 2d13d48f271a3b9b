use std::fs;

use pipeline_core::project::load_build_config;
use pipeline_core::services::BuildOptions;
use pipeline_slicer::commands::{
    build_command, discover_command, init_command, list_bundlers_command, slice_command,
    summarize_command,
};
use tempfile::tempdir;

#[test]
fn init_writes_a_loadable_config() {
    let temp = tempdir().unwrap();
    let root = temp.path().join("orders");
    init_command(root.to_str().unwrap(), None, false).unwrap();

    let config = load_build_config(&root.join("pipeline.config.json")).unwrap();
    assert_eq!(config.name, "orders");
    assert_eq!(config.patterns(None).unwrap(), vec!["resolvers/*.ts"]);
    assert!(fs::read_to_string(root.join("resolvers/hello.ts")).unwrap().contains("createResolver"));
}

#[test]
fn commands_run_against_the_sample_project() {
    let temp = tempdir().unwrap();
    let root = temp.path().to_string_lossy().to_string();
    init_command(&root, Some("Units".into()), false).unwrap();
    let config = temp.path().join("pipeline.config.json").to_string_lossy().to_string();
    let sample = temp.path().join("resolvers/hello.ts").to_string_lossy().to_string();

    discover_command(&config, None, false).unwrap();
    discover_command(&config, Some("resolvers"), true).unwrap();
    summarize_command(&config, &sample, None, false).unwrap();
    slice_command(&config, &sample, None, None).unwrap();
    slice_command(&config, &sample, Some("greet"), Some("native".into())).unwrap();
    build_command(&config, BuildOptions::default()).unwrap();
    assert!(temp.path().join("dist/functions/hello__greet.js").is_file());
}

#[test]
fn summarize_rejects_missing_files() {
    let temp = tempdir().unwrap();
    let root = temp.path().to_string_lossy().to_string();
    init_command(&root, None, false).unwrap();
    let config = temp.path().join("pipeline.config.json").to_string_lossy().to_string();
    let missing = temp.path().join("resolvers/absent.ts").to_string_lossy().to_string();

    let err = summarize_command(&config, &missing, None, false).unwrap_err();
    assert!(err.to_string().contains("Resolver file not found"), "unexpected error: {err}");
}

#[test]
fn corrupt_config_is_reported() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("pipeline.config.json");
    fs::write(&config, "not-json").unwrap();
    let err = discover_command(config.to_str().unwrap(), None, false).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse build config JSON"));
}

#[test]
fn list_bundlers_reports_available_bundlers() {
    list_bundlers_command(false).unwrap();
    list_bundlers_command(true).unwrap();
}
