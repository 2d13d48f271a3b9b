//! Orchestration services: bundler backends, step drivers and the build runner.

pub mod build;
pub mod bundle;
pub mod bundlers;
pub mod driver;

pub use build::{BuildError, BuildOptions, BuildReport, BuildRunner, PreparedResolver};
pub use bundle::{default_bundler_registry, BundleError, BundleRequest, Bundler, BundlerRegistry};
