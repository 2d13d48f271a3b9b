//! Core data model shared by the summarizer, slicer and manifest writer.
//!
//! - `Step` / `StepKind`: one declared unit of resolver logic.
//! - `ResolverSummary`: the ordered step list of one resolver file.
//! - `PipelineDescriptor`: the deployable JSON manifest.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of work a step performs at deploy time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Function,
    Sql,
    Graphql,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Function => "function",
            StepKind::Sql => "sql",
            StepKind::Graphql => "graphql",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(StepKind::Function),
            "sql" => Ok(StepKind::Sql),
            "graphql" => Ok(StepKind::Graphql),
            other => Err(other.to_string()),
        }
    }
}

/// One step declared by a resolver.
///
/// `closure` is the literal source text of the step's function expression and
/// `closure_range` its byte range inside the module it was summarized from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,
    pub name: String,
    pub closure: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// SDL fragment contributed to the resolver schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closure_range: Option<Range<usize>>,
}

impl Step {
    pub fn new(kind: StepKind, name: impl Into<String>, closure: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            closure: closure.into(),
            description: None,
            schema: None,
            closure_range: None,
        }
    }

    pub fn with_range(mut self, range: Range<usize>) -> Self {
        self.closure_range = Some(range);
        self
    }
}

/// Root operation a resolver is exposed under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Query,
    Mutation,
}

impl OperationKind {
    /// GraphQL root type name extended by the synthesized SDL.
    pub fn root_type(self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
        }
    }
}

/// Statically extracted description of one resolver file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSummary {
    pub name: String,
    #[serde(default)]
    pub operation: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// SDL argument list, e.g. `id: ID!, limit: Int`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    pub returns: String,
    /// Steps in declaration (= execution) order.
    pub steps: Vec<Step>,
}

impl ResolverSummary {
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Runtime operation type recorded in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Function,
    Graphql,
}

/// One entry of a descriptor's `pipelines` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineEntry {
    pub name: String,
    pub description: String,
    pub operation_type: OperationType,
    pub operation_source: String,
    pub operation_name: String,
}

/// Deployable manifest for one resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDescriptor {
    pub name: String,
    pub sdl: String,
    pub pipelines: Vec<PipelineEntry>,
}
