use pipeline_core::analysis::{summarize_module, ResolverConvention, SliceError, Slicer};
use pipeline_core::model::{Step, StepKind};
use pipeline_core::syntax::ParsedModule;

const CALCULATE_TOTAL: &str = r#"import { createResolver } from "@pipeline/sdk";

const TAX = 0.2;

function unused() {
  return "never deployed";
}

export default createResolver({
  name: "calculateTotal",
  steps: [
    { kind: "function", name: "step1", fn: (ctx) => ctx.args.price * (1 + TAX) },
  ],
});
"#;

fn slicer() -> Slicer {
    Slicer::new(ResolverConvention::default())
}

fn summarized_steps(source: &str) -> Vec<Step> {
    let module = ParsedModule::parse(source, "fixture.js").expect("parse fixture");
    summarize_module(&module, &ResolverConvention::default()).expect("summarize").steps
}

#[test]
fn keeps_referenced_constant_and_drops_framework_scaffolding() {
    let steps = summarized_steps(CALCULATE_TOTAL);
    let out = slicer().slice(CALCULATE_TOTAL, &steps).expect("slice");

    assert!(out.trimmed_text.contains("const TAX = 0.2;"));
    assert!(!out.trimmed_text.contains("@pipeline/sdk"));
    assert!(!out.trimmed_text.contains("createResolver"));
    assert!(!out.trimmed_text.contains("export default"));
    assert!(!out.trimmed_text.contains("unused"));

    assert_eq!(out.export_name("step1"), Some("__step_step1"));
    let module = out.module_text();
    assert!(module
        .contains("export const __step_step1 = (ctx) => ctx.args.price * (1 + TAX);"));
}

#[test]
fn closures_without_recorded_range_are_found_by_text() {
    let steps = vec![Step::new(
        StepKind::Function,
        "step1",
        "(ctx) => ctx.args.price * (1 + TAX)",
    )];
    let out = slicer().slice(CALCULATE_TOTAL, &steps).expect("slice");
    assert!(out.trimmed_text.contains("const TAX = 0.2;"));
    assert_eq!(out.exports.len(), 1);
}

#[test]
fn kept_statements_are_byte_preserved() {
    let source = r#"import { createResolver } from "@pipeline/sdk";
const   SPACED   =   { a: 1,   b: [1, 2] };   // keep me
export default createResolver({ name: "r", steps: [{ kind: "function", name: "s", fn: () => SPACED }] });
"#;
    let steps = summarized_steps(source);
    let out = slicer().slice(source, &steps).expect("slice");
    assert!(out.trimmed_text.contains("const   SPACED   =   { a: 1,   b: [1, 2] };   // keep me"));
}

#[test]
fn n_steps_yield_n_exports_in_declaration_order() {
    let source = r#"import { createResolver } from "@pipeline/sdk";
const A = 1;
const B = 2;
export default createResolver({
  name: "ordered",
  steps: [
    { kind: "function", name: "first", fn: () => A },
    { kind: "sql", name: "second", fn: () => `select ${B}` },
    { kind: "graphql", name: "third", fn: async () => A + B },
  ],
});
"#;
    let steps = summarized_steps(source);
    let out = slicer().slice(source, &steps).expect("slice");
    let names: Vec<&str> = out.exports.iter().map(|e| e.step.as_str()).collect();
    assert_eq!(names, vec!["first", "second", "third"]);

    let module = out.module_text();
    let first = module.find("export const __step_first").expect("first export");
    let second = module.find("export const __step_second").expect("second export");
    let third = module.find("export const __step_third").expect("third export");
    assert!(first < second && second < third);

    let per_step = slicer().slice_per_step(source, &steps).expect("per step");
    assert_eq!(per_step.len(), 3);
    assert_eq!(per_step[1].kind, StepKind::Sql);
}

#[test]
fn slicing_is_deterministic() {
    let steps = summarized_steps(CALCULATE_TOTAL);
    let first = slicer().slice(CALCULATE_TOTAL, &steps).expect("first");
    let second = slicer().slice(CALCULATE_TOTAL, &steps).expect("second");
    assert_eq!(first, second);

    let a = slicer().slice_per_step(CALCULATE_TOTAL, &steps).expect("a");
    let b = slicer().slice_per_step(CALCULATE_TOTAL, &steps).expect("b");
    assert_eq!(a, b);
}

const SHARED: &str = r#"import { createResolver, t } from "@pipeline/sdk";

const RATE = 0.1;
const fee = (amount) => amount * RATE;
const config = { retries: 1 };
config.retries = 3;
const Money = t.float();
const label = (value) => `${value} EUR`;
console.log("module loaded");

export default createResolver({
  name: "pricing",
  steps: [
    { kind: "function", name: "charge", fn: (ctx) => ctx.args.amount + fee(ctx.args.amount) },
    { kind: "function", name: "retry", fn: () => config.retries },
    { kind: "function", name: "render", fn: (ctx) => label(ctx.prev) },
  ],
});
"#;

#[test]
fn per_step_modules_are_minimal() {
    let steps = summarized_steps(SHARED);
    let modules = slicer().slice_per_step(SHARED, &steps).expect("slice");

    let charge = &modules[0].text;
    assert!(charge.contains("const RATE = 0.1;"));
    assert!(charge.contains("const fee = (amount) => amount * RATE;"));
    assert!(!charge.contains("config"));
    assert!(!charge.contains("label"));
    assert!(!charge.contains("console.log"));

    let retry = &modules[1].text;
    assert!(retry.contains("const config = { retries: 1 };"));
    assert!(retry.contains("config.retries = 3;"), "mutations of kept symbols are kept");
    assert!(!retry.contains("RATE"));

    let render = &modules[2].text;
    assert!(render.contains("const label"));
    assert!(!render.contains("fee"));
}

#[test]
fn framework_derived_statements_are_removed_transitively() {
    let steps = summarized_steps(SHARED);
    let out = slicer().slice(SHARED, &steps).expect("slice");
    assert!(!out.trimmed_text.contains("Money"));
    assert!(!out.trimmed_text.contains("t.float"));
}

#[test]
fn per_step_modules_are_self_sufficient() {
    let steps = summarized_steps(SHARED);
    let modules = slicer().slice_per_step(SHARED, &steps).expect("slice");
    let globals = ["console", "Math", "JSON"];
    for module in modules {
        let parsed = ParsedModule::parse(module.text.clone(), module.step.clone()).expect("reparse");
        let defined: Vec<&str> = parsed.top_level_names();
        for stmt in parsed.statements() {
            for name in &stmt.references {
                assert!(
                    defined.contains(&name.as_str()) || globals.contains(&name.as_str()),
                    "step {} references undefined `{}`",
                    module.step,
                    name
                );
            }
        }
    }
}

#[test]
fn referencing_a_framework_symbol_is_an_error() {
    let source = r#"import { createResolver, t } from "@pipeline/sdk";
const Money = t.float();
export default createResolver({ name: "bad", steps: [{ kind: "function", name: "price", fn: () => Money }] });
"#;
    let steps = summarized_steps(source);
    let err = slicer().slice(source, &steps).unwrap_err();
    match err {
        SliceError::RemovedReference { step, symbol } => {
            assert_eq!(step, "price");
            assert_eq!(symbol, "Money");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn duplicate_step_names_fail() {
    let steps = vec![
        Step::new(StepKind::Function, "dup", "(ctx) => ctx.args.price * (1 + TAX)"),
        Step::new(StepKind::Function, "dup", "(ctx) => ctx.args.price * (1 + TAX)"),
    ];
    let err = slicer().slice(CALCULATE_TOTAL, &steps).unwrap_err();
    assert!(matches!(err, SliceError::DuplicateStep(name) if name == "dup"));
}

#[test]
fn missing_closure_text_fails_loudly() {
    let steps = vec![Step::new(StepKind::Function, "ghost", "() => notInTheModule")];
    let err = slicer().slice(CALCULATE_TOTAL, &steps).unwrap_err();
    assert!(matches!(err, SliceError::ClosureNotFound { step, .. } if step == "ghost"));
}

#[test]
fn export_names_are_sanitized_and_collision_free() {
    let source = r#"import { createResolver } from "@pipeline/sdk";
const __step_load = "taken";
export default createResolver({
  name: "names",
  steps: [
    { kind: "function", name: "load", fn: () => __step_load },
    { kind: "function", name: "load-user", fn: () => 1 },
  ],
});
"#;
    let steps = summarized_steps(source);
    let out = slicer().slice(source, &steps).expect("slice");
    assert_eq!(out.export_name("load"), Some("__step_load_2"));
    assert_eq!(out.export_name("load-user"), Some("__step_load_user"));
    assert!(out.trimmed_text.contains("const __step_load = \"taken\";"));
}

#[test]
fn export_clause_default_is_removed() {
    let source = r#"import { createResolver } from "@pipeline/sdk";
var TAX = 0.2;
var calculateTotal_default = createResolver({
  name: "calculateTotal",
  steps: [{ kind: "function", name: "step1", fn: (ctx) => ctx.args.price * TAX }]
});
export {
  calculateTotal_default as default
};
"#;
    let steps = summarized_steps(source);
    let out = slicer().slice(source, &steps).expect("slice");
    assert!(out.trimmed_text.contains("var TAX = 0.2;"));
    assert!(!out.trimmed_text.contains("calculateTotal_default"));
    assert!(!out.trimmed_text.contains("export {"));
}

#[test]
fn statements_populating_kept_bindings_are_kept() {
    let source = r#"import { createResolver } from "@pipeline/sdk";
const rates = new Map();
rates.set("US", 0.1);
const table = {};
for (const k of ["a", "b"]) table[k] = 1;
const other = [];
other.push(1);
export default createResolver({
  name: "r",
  steps: [{ kind: "function", name: "s", fn: () => rates.get("US") + table.a }],
});
"#;
    let steps = summarized_steps(source);
    let modules = slicer().slice_per_step(source, &steps).expect("slice");
    let text = &modules[0].text;
    assert!(text.contains("const rates = new Map();\nrates.set(\"US\", 0.1);"));
    assert!(text.contains("for (const k of [\"a\", \"b\"]) table[k] = 1;"));
    assert!(!text.contains("other"), "unrelated side effects stay out:\n{text}");
}
