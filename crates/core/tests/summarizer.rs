use std::fs;

use pipeline_core::analysis::{summarize, summarize_module, ResolverConvention, SummaryError};
use pipeline_core::model::{OperationKind, StepKind};
use pipeline_core::syntax::ParsedModule;
use tempfile::tempdir;

fn summarize_text(
    source: &str,
) -> Result<pipeline_core::model::ResolverSummary, SummaryError> {
    let module = ParsedModule::parse(source, "resolver.js").expect("parse");
    summarize_module(&module, &ResolverConvention::default())
}

#[test]
fn reads_every_resolver_field() {
    let source = r#"import { createResolver } from "@pipeline/sdk";

const validate = (ctx) => {
  if (!ctx.args.id) throw new Error("id required");
  return ctx.args;
};

export default createResolver({
  name: "getUser",
  operation: "query",
  description: "Fetch one user",
  args: "id: ID!",
  returns: "User",
  steps: [
    { kind: "function", name: "validate", fn: validate, description: "check input" },
    { kind: "sql", name: "load", fn: (ctx) => `select * from users where id = ${ctx.args.id}` },
    {
      kind: "graphql",
      name: "enrich",
      schema: "type User { id: ID! name: String }",
      fn: async function (ctx) { return ctx.prev; },
    },
  ],
});
"#;
    let summary = summarize_text(source).expect("summary");
    assert_eq!(summary.name, "getUser");
    assert_eq!(summary.operation, OperationKind::Query);
    assert_eq!(summary.description.as_deref(), Some("Fetch one user"));
    assert_eq!(summary.args.as_deref(), Some("id: ID!"));
    assert_eq!(summary.returns, "User");

    let kinds: Vec<StepKind> = summary.steps.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![StepKind::Function, StepKind::Sql, StepKind::Graphql]);

    let validate = summary.step("validate").expect("validate step");
    assert!(validate.closure.starts_with("(ctx) => {"));
    assert_eq!(validate.description.as_deref(), Some("check input"));
    let range = validate.closure_range.clone().expect("range");
    assert_eq!(&source[range], validate.closure);

    let enrich = summary.step("enrich").expect("enrich step");
    assert!(enrich.closure.starts_with("async function (ctx)"));
    assert_eq!(enrich.schema.as_deref(), Some("type User { id: ID! name: String }"));
}

#[test]
fn optional_fields_fall_back_to_defaults() {
    let source = r#"import { createResolver } from "@pipeline/sdk";
export default createResolver({
  name: "ping",
  steps: [{ kind: "function", name: "pong", fn: () => "pong" }],
});
"#;
    let summary = summarize_text(source).expect("summary");
    assert_eq!(summary.operation, OperationKind::Query);
    assert_eq!(summary.returns, "JSON");
    assert!(summary.description.is_none());
    assert!(summary.args.is_none());
}

#[test]
fn mutation_operation_is_recognised() {
    let source = r#"import { createResolver } from "@pipeline/sdk";
export default createResolver({
  name: "save",
  operation: "mutation",
  steps: [{ kind: "sql", name: "insert", fn: () => "insert into t values (1)" }],
});
"#;
    let summary = summarize_text(source).expect("summary");
    assert_eq!(summary.operation, OperationKind::Mutation);
}

#[test]
fn namespace_and_aliased_imports_are_accepted() {
    let namespaced = r#"import * as sdk from "@pipeline/sdk";
export default sdk.createResolver({
  name: "ns",
  steps: [{ kind: "function", name: "one", fn: () => 1 }],
});
"#;
    assert_eq!(summarize_text(namespaced).expect("namespace").name, "ns");

    let aliased = r#"import { createResolver as make } from "@pipeline/sdk";
export default make({
  name: "aliased",
  steps: [{ kind: "function", name: "one", fn: () => 1 }],
});
"#;
    assert_eq!(summarize_text(aliased).expect("alias").name, "aliased");
}

#[test]
fn bundler_style_default_export_clause_is_followed() {
    let source = r#"import { createResolver } from "@pipeline/sdk";
var definition = {
  name: "bundled",
  steps: [{ kind: "function", name: "one", fn: () => 1 }]
};
var bundled_default = createResolver(definition);
export {
  bundled_default as default
};
"#;
    let summary = summarize_text(source).expect("summary");
    assert_eq!(summary.name, "bundled");
    assert_eq!(summary.steps.len(), 1);
}

#[test]
fn custom_convention_changes_the_recognised_factory() {
    let source = r#"import { defineResolver } from "acme-graph/runtime";
export default defineResolver({
  name: "custom",
  steps: [{ kind: "function", name: "one", fn: () => 1 }],
});
"#;
    let module = ParsedModule::parse(source, "custom.js").expect("parse");
    let convention = ResolverConvention::new("acme-graph", "defineResolver");
    let summary = summarize_module(&module, &convention).expect("summary");
    assert_eq!(summary.name, "custom");

    let err = summarize_module(&module, &ResolverConvention::default()).unwrap_err();
    assert!(matches!(err, SummaryError::NotAResolver { .. }));
}

#[test]
fn unsupported_step_kind_is_rejected() {
    let source = r#"import { createResolver } from "@pipeline/sdk";
export default createResolver({
  name: "bad",
  steps: [{ kind: "shell", name: "run", fn: () => "ls" }],
});
"#;
    match summarize_text(source).unwrap_err() {
        SummaryError::UnsupportedStepKind { step, kind, .. } => {
            assert_eq!(step, "run");
            assert_eq!(kind, "shell");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn duplicate_step_names_are_rejected() {
    let source = r#"import { createResolver } from "@pipeline/sdk";
export default createResolver({
  name: "dup",
  steps: [
    { kind: "function", name: "same", fn: () => 1 },
    { kind: "function", name: "same", fn: () => 2 },
  ],
});
"#;
    let err = summarize_text(source).unwrap_err();
    assert!(matches!(err, SummaryError::DuplicateStep { name, .. } if name == "same"));
}

#[test]
fn modules_without_default_export_are_rejected() {
    let source = r#"import { createResolver } from "@pipeline/sdk";
export const resolver = createResolver({ name: "x", steps: [] });
"#;
    let err = summarize_text(source).unwrap_err();
    assert!(matches!(err, SummaryError::NoDefaultExport { .. }));
    assert!(err.to_string().contains("createResolver"));
}

#[test]
fn default_export_of_a_local_function_is_not_a_resolver() {
    let source = r#"function createResolver(def) { return def; }
export default createResolver({
  name: "impostor",
  steps: [{ kind: "function", name: "one", fn: () => 1 }],
});
"#;
    let err = summarize_text(source).unwrap_err();
    assert!(matches!(err, SummaryError::NotAResolver { .. }));
}

#[test]
fn missing_fields_and_bad_shapes_are_reported() {
    let no_name = r#"import { createResolver } from "@pipeline/sdk";
export default createResolver({ steps: [{ kind: "function", name: "a", fn: () => 1 }] });
"#;
    assert!(matches!(
        summarize_text(no_name).unwrap_err(),
        SummaryError::MissingField { field, .. } if field == "name"
    ));

    let empty = r#"import { createResolver } from "@pipeline/sdk";
export default createResolver({ name: "empty", steps: [] });
"#;
    assert!(matches!(summarize_text(empty).unwrap_err(), SummaryError::InvalidDefinition { .. }));

    let not_fn = r#"import { createResolver } from "@pipeline/sdk";
export default createResolver({ name: "x", steps: [{ kind: "function", name: "a", fn: 42 }] });
"#;
    assert!(matches!(
        summarize_text(not_fn).unwrap_err(),
        SummaryError::NotAFunction { step, .. } if step == "a"
    ));
}

#[test]
fn summarize_reads_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bundled.js");
    fs::write(
        &path,
        r#"import { createResolver } from "@pipeline/sdk";
export default createResolver({ name: "disk", steps: [{ kind: "function", name: "a", fn: () => 1 }] });
"#,
    )
    .unwrap();
    let summary = summarize(&path, &ResolverConvention::default()).unwrap();
    assert_eq!(summary.name, "disk");

    let err = summarize(&dir.path().join("missing.js"), &ResolverConvention::default()).unwrap_err();
    assert!(matches!(err, SummaryError::Read { .. }));
}
