use std::fs;
use std::path::Path;

use pipeline_core::project::{
    file_safe, load_build_config, step_file_name, write_build_config, BuildConfig, BuildContext,
    BuildLayout, SqlTransaction,
};
use tempfile::tempdir;

#[test]
fn json_config_fills_in_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pipeline.config.json");
    fs::write(&path, r#"{ "name": "shop", "services": { "api": { "files": ["src/*.ts"] } } }"#).unwrap();

    let config = load_build_config(&path).unwrap();
    assert_eq!(config.name, "shop");
    assert_eq!(config.framework_module, "@pipeline/sdk");
    assert_eq!(config.resolver_factory, "createResolver");
    assert_eq!(config.entrypoint, "main");
    assert_eq!(config.temp_dir, ".pipeline-build");
    assert_eq!(config.dist_dir, "dist");
    assert_eq!(config.bundler, "native");
    assert!(config.minify);
    assert!(!config.source_maps);
    assert_eq!(config.sql_transaction, SqlTransaction::Rollback);
    assert_eq!(config.patterns(None).unwrap(), vec!["src/*.ts"]);
}

#[test]
fn yaml_config_is_read_by_extension() {
    let dir = tempdir().unwrap();
    let project = dir.path().join("billing");
    fs::create_dir_all(&project).unwrap();
    let path = project.join("pipeline.config.yaml");
    fs::write(
        &path,
        "services:\n  invoices:\n    files: [\"invoices/*.ts\"]\n  refunds:\n    files: [\"refunds/*.ts\"]\nsql_transaction: commit\nbundler: esbuild\nminify: false\n",
    )
    .unwrap();

    let config = load_build_config(&path).unwrap();
    assert_eq!(config.name, "billing", "name falls back to the directory");
    assert_eq!(config.sql_transaction, SqlTransaction::Commit);
    assert_eq!(config.bundler, "esbuild");
    assert!(!config.minify);
    assert_eq!(config.patterns(Some("refunds")).unwrap(), vec!["refunds/*.ts"]);
    assert_eq!(config.patterns(None).unwrap().len(), 2);

    let err = config.patterns(Some("payroll")).unwrap_err().to_string();
    assert!(err.contains("payroll"));
    assert!(err.contains("invoices, refunds"));
}

#[test]
fn written_config_reloads_identically() {
    let dir = tempdir().unwrap();
    let config = BuildConfig::new("demo");
    for name in ["pipeline.config.json", "pipeline.config.yml"] {
        let path = dir.path().join(name);
        write_build_config(&path, &config).unwrap();
        assert_eq!(load_build_config(&path).unwrap(), config);
    }
}

#[test]
fn invalid_configs_are_rejected() {
    let mut no_services = BuildConfig::new("x");
    no_services.services.clear();
    assert!(no_services.validate().is_err());

    let mut bad_entrypoint = BuildConfig::new("x");
    bad_entrypoint.entrypoint = "not valid".to_string();
    assert!(bad_entrypoint.validate().is_err());

    let mut bad_factory = BuildConfig::new("x");
    bad_factory.resolver_factory = "1create".to_string();
    assert!(bad_factory.validate().is_err());

    let mut root_temp = BuildConfig::new("x");
    root_temp.temp_dir = ".".to_string();
    assert!(root_temp.validate().is_err());

    let mut empty_patterns = BuildConfig::new("x");
    empty_patterns.services.values_mut().for_each(|s| s.files.clear());
    assert!(empty_patterns.validate().is_err());

    assert!(BuildConfig::new("x").validate().is_ok());
}

#[test]
fn malformed_config_reports_the_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pipeline.config.json");
    fs::write(&path, "{ not json").unwrap();
    let err = format!("{:#}", load_build_config(&path).unwrap_err());
    assert!(err.contains("Failed to parse build config JSON"));
}

#[test]
fn layout_paths_follow_the_config() {
    let layout = BuildLayout::new("/work/project", ".tmp", "/srv/dist");
    assert_eq!(layout.temp_root, Path::new("/work/project/.tmp"));
    assert_eq!(layout.dist_root, Path::new("/srv/dist"));
    assert_eq!(
        layout.bundled_resolver(Path::new("/work/project/resolvers/getUser.ts")),
        Path::new("/work/project/.tmp/resolvers/getUser.js")
    );
    assert_eq!(
        layout.sliced_module("getUser", "load"),
        Path::new("/work/project/.tmp/sliced/getUser__load.js")
    );
    assert_eq!(layout.driver("getUser", "load"), Path::new("/work/project/.tmp/steps/getUser__load.js"));
    assert_eq!(layout.artifact("getUser", "load"), Path::new("/srv/dist/functions/getUser__load.js"));
    assert_eq!(layout.manifest("getUser"), Path::new("/srv/dist/pipelines/getUser.json"));
    assert_eq!(layout.metadata("getUser"), Path::new("/srv/dist/metadata/getUser.json"));

    assert_eq!(step_file_name("get user", "load/all"), "get_20user__load_2fall.js");
    assert_eq!(file_safe(".."), "_2e.");
    assert_eq!(file_safe("ok-name_1.v2"), "ok-name_5f1.v2");
    assert_eq!(file_safe(""), "_");
}

#[test]
fn file_names_never_collide() {
    assert_ne!(file_safe("get user"), file_safe("get_user"));
    assert_ne!(step_file_name("r", "get user"), step_file_name("r", "get_user"));
    assert_ne!(step_file_name("a__b", "c"), step_file_name("a", "b__c"));
    assert_ne!(step_file_name("a_", "_b"), step_file_name("a", "__b"));
    assert!(!file_safe("x__y").contains("__"));
}

#[test]
fn context_roots_the_layout_at_the_config_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pipeline.config.json");
    write_build_config(&path, &BuildConfig::new("ctx")).unwrap();

    let ctx = BuildContext::load(&path).unwrap();
    let root = dir.path().canonicalize().unwrap();
    assert_eq!(ctx.root(), root.as_path());
    assert_eq!(ctx.layout.functions_dir, root.join("dist/functions"));
    assert_eq!(ctx.convention().resolver_factory, "createResolver");

    assert!(BuildContext::load(dir.path().join("absent.json")).is_err());
}
