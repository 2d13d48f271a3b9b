//! Per-step driver modules: import the step export and publish it under the
//! runtime's entrypoint global.

use crate::model::StepKind;
use crate::project::SqlTransaction;

/// What a driver needs to know about its step.
#[derive(Debug, Clone, Copy)]
pub struct DriverSpec<'a> {
    pub kind: StepKind,
    pub export_name: &'a str,
    /// Import specifier of the sliced module, relative to the driver.
    pub module_specifier: &'a str,
    pub entrypoint: &'a str,
    pub sql_transaction: SqlTransaction,
}

pub fn driver_source(spec: &DriverSpec<'_>) -> String {
    let import = format!(
        "import {{ {} }} from {};\n",
        spec.export_name,
        js_string(spec.module_specifier)
    );
    match spec.kind {
        StepKind::Function | StepKind::Graphql => {
            format!("{import}globalThis.{} = {};\n", spec.entrypoint, spec.export_name)
        }
        StepKind::Sql => format!("{import}globalThis.{} = {};\n", spec.entrypoint, sql_shim(spec)),
    }
}

/// The step closure returns the query; the shim runs it inside a transaction
/// on the runtime-provided `context.sql` client.
fn sql_shim(spec: &DriverSpec<'_>) -> String {
    let finish = match spec.sql_transaction {
        SqlTransaction::Rollback => "rollback",
        SqlTransaction::Commit => "commit",
    };
    format!(
        "async (context, ...rest) => {{\n  \
           const query = await {export}(context, ...rest);\n  \
           const sql = context.sql;\n  \
           await sql.begin();\n  \
           try {{\n    \
             const result = await sql.query(query);\n    \
             await sql.{finish}();\n    \
             return result;\n  \
           }} catch (error) {{\n    \
             await sql.rollback();\n    \
             throw error;\n  \
           }}\n\
         }}",
        export = spec.export_name,
    )
}

fn js_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
