//! Build configuration, on-disk layout and the per-invocation build context.
//!
//! - `BuildConfig`: serializable config (`pipeline.config.json` / `.yaml`).
//! - `BuildLayout`: computed temp and dist paths; no IO.
//! - `BuildContext`: config + layout, threaded through every build stage.

pub mod config;
pub mod context;
pub mod layout;
pub mod util;

pub use config::{BuildConfig, ServiceConfig, SqlTransaction};
pub use context::BuildContext;
pub use layout::{file_safe, step_file_name, BuildLayout};
pub use util::{load_build_config, sha256_bytes, write_atomic, write_build_config};

/// Default config file name looked up by frontends.
pub const DEFAULT_CONFIG_FILE: &str = "pipeline.config.json";
