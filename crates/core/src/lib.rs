//! pipeline-core
//!
//! Core library for slicing pipeline resolvers into per-step deployable
//! functions.
//!
//! This crate holds discovery, the syntax model, step summarization, the
//! program slicer, bundler backends, manifest writing and build
//! orchestration, so all of it is testable without a frontend.

pub mod analysis;
pub mod discovery;
pub mod manifest;
pub mod model;
pub mod project;
pub mod services;
pub mod syntax;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
