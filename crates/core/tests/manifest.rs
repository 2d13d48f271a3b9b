use std::collections::BTreeMap;
use std::fs;

use pipeline_core::manifest::{assemble, operation_type, synthesize_sdl, write_manifest, ManifestError};
use pipeline_core::model::{
    OperationKind, OperationType, PipelineDescriptor, ResolverSummary, Step, StepKind,
};
use tempfile::tempdir;

fn summary() -> ResolverSummary {
    let mut enrich = Step::new(StepKind::Graphql, "enrich", "async (ctx) => ctx.prev");
    enrich.schema = Some("  type User {\n  id: ID!\n}\n".to_string());
    let mut validate = Step::new(StepKind::Function, "validate", "(ctx) => ctx.args");
    validate.description = Some("check input".to_string());
    ResolverSummary {
        name: "getUser".to_string(),
        operation: OperationKind::Query,
        description: Some("Fetch one user".to_string()),
        args: Some("id: ID!".to_string()),
        returns: "User".to_string(),
        steps: vec![
            validate,
            Step::new(StepKind::Sql, "load", "() => 'select 1'"),
            enrich,
        ],
    }
}

#[test]
fn step_kinds_map_to_runtime_operation_types() {
    assert_eq!(operation_type(StepKind::Function), OperationType::Function);
    assert_eq!(operation_type(StepKind::Sql), OperationType::Function);
    assert_eq!(operation_type(StepKind::Graphql), OperationType::Graphql);
}

#[test]
fn sdl_joins_step_schemas_and_extends_the_root_type() {
    let sdl = synthesize_sdl(&summary());
    assert_eq!(
        sdl,
        "type User {\n  id: ID!\n}\n\nextend type Query {\n  \"\"\"Fetch one user\"\"\"\n  getUser(id: ID!): User\n}\n"
    );

    let bare = ResolverSummary {
        name: "save".to_string(),
        operation: OperationKind::Mutation,
        description: None,
        args: None,
        returns: "JSON".to_string(),
        steps: vec![Step::new(StepKind::Function, "a", "() => 1")],
    };
    assert_eq!(synthesize_sdl(&bare), "extend type Mutation {\n  save: JSON\n}\n");
}

#[test]
fn assemble_embeds_artifacts_in_step_order() {
    let dir = tempdir().unwrap();
    let mut artifacts = BTreeMap::new();
    for step in ["validate", "load", "enrich"] {
        let path = dir.path().join(format!("getUser__{step}.js"));
        fs::write(&path, format!("globalThis.main = () => \"{step}\";\n")).unwrap();
        artifacts.insert(step.to_string(), path);
    }

    let descriptor = assemble(&summary(), &artifacts, "main").unwrap();
    assert_eq!(descriptor.name, "getUser");
    let names: Vec<&str> = descriptor.pipelines.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["validate", "load", "enrich"]);

    let types: Vec<OperationType> = descriptor.pipelines.iter().map(|p| p.operation_type).collect();
    assert_eq!(types, vec![OperationType::Function, OperationType::Function, OperationType::Graphql]);

    assert_eq!(descriptor.pipelines[0].description, "check input");
    assert_eq!(descriptor.pipelines[1].description, "");
    assert_eq!(descriptor.pipelines[2].operation_source, "globalThis.main = () => \"enrich\";\n");
    assert!(descriptor.pipelines.iter().all(|p| p.operation_name == "main"));
}

#[test]
fn assemble_requires_every_artifact() {
    let dir = tempdir().unwrap();
    let mut artifacts = BTreeMap::new();
    let path = dir.path().join("validate.js");
    fs::write(&path, "x").unwrap();
    artifacts.insert("validate".to_string(), path);

    let err = assemble(&summary(), &artifacts, "main").unwrap_err();
    assert!(matches!(err, ManifestError::MissingArtifact { step, .. } if step == "load"));

    artifacts.insert("load".to_string(), dir.path().join("missing.js"));
    artifacts.insert("enrich".to_string(), dir.path().join("missing.js"));
    let err = assemble(&summary(), &artifacts, "main").unwrap_err();
    assert!(matches!(err, ManifestError::ReadArtifact { .. }));
}

#[test]
fn manifest_json_uses_camel_case_and_uppercase_types() {
    let dir = tempdir().unwrap();
    let artifact = dir.path().join("a.js");
    fs::write(&artifact, "globalThis.main = 1;\n").unwrap();
    let mut artifacts = BTreeMap::new();
    for step in ["validate", "load", "enrich"] {
        artifacts.insert(step.to_string(), artifact.clone());
    }
    let descriptor = assemble(&summary(), &artifacts, "main").unwrap();

    let path = dir.path().join("pipelines/getUser.json");
    write_manifest(&path, &descriptor).unwrap();
    let body = fs::read_to_string(&path).unwrap();
    assert!(body.ends_with("}\n"));

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["name"], "getUser");
    assert_eq!(json["pipelines"][0]["operationType"], "FUNCTION");
    assert_eq!(json["pipelines"][2]["operationType"], "GRAPHQL");
    assert_eq!(json["pipelines"][0]["operationName"], "main");
    assert_eq!(json["pipelines"][0]["operationSource"], "globalThis.main = 1;\n");

    let parsed: PipelineDescriptor = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed, descriptor);
}
