//! Resolver analysis and slice-carving logic.
//!
//! - `summary`: static extraction of the declared step list.
//! - `graph`: statement ↔ symbol reachability graph with fixed-point removal.
//! - `slicer`: per-step minimal module computation on top of the graph.

pub mod graph;
pub mod slicer;
pub mod summary;

use serde::{Deserialize, Serialize};

pub use graph::{RemovalSet, StatementGraph, StatementId, SymbolId};
pub use slicer::{SliceError, SliceOutput, Slicer, StepExport, StepModule};
pub use summary::{summarize, summarize_module, SummaryError};

/// Module specifier of the authoring SDK when none is configured.
pub const DEFAULT_FRAMEWORK_MODULE: &str = "@pipeline/sdk";
/// Name of the SDK function that constructs a resolver.
pub const DEFAULT_RESOLVER_FACTORY: &str = "createResolver";

/// How resolvers are recognised: which import is the framework and which of
/// its exports builds a resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConvention {
    pub framework_module: String,
    pub resolver_factory: String,
}

impl Default for ResolverConvention {
    fn default() -> Self {
        Self {
            framework_module: DEFAULT_FRAMEWORK_MODULE.to_string(),
            resolver_factory: DEFAULT_RESOLVER_FACTORY.to_string(),
        }
    }
}

impl ResolverConvention {
    pub fn new(framework_module: impl Into<String>, resolver_factory: impl Into<String>) -> Self {
        Self { framework_module: framework_module.into(), resolver_factory: resolver_factory.into() }
    }

    /// True for the framework specifier itself and any of its subpaths.
    pub fn is_framework(&self, specifier: &str) -> bool {
        specifier == self.framework_module
            || specifier
                .strip_prefix(self.framework_module.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}
