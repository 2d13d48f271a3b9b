use anyhow::Result;
use clap::{Parser, Subcommand};
use pipeline_core::project::DEFAULT_CONFIG_FILE;
use pipeline_core::services::build::BuildOptions;
use pipeline_slicer::commands::{
    build_command, discover_command, init_command, list_bundlers_command, slice_command,
    summarize_command,
};
use pipeline_slicer::init_logging;

/// Pipeline resolver slicer CLI.
///
/// This CLI is a thin wrapper around `pipeline-core` (exposed in code as
/// `pipeline_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "pipeline-slicer",
    version,
    about = "Slice pipeline resolvers into per-step deployable functions",
    long_about = None
)]
struct Cli {
    /// Debug-level logging on stderr (ignored when RUST_LOG is set).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default `pipeline.config.json` and a sample resolver.
    Init {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Optional project name. If omitted, the name is derived from the root directory.
        #[arg(long)]
        name: Option<String>,

        /// Overwrite an existing config file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// List resolver files matched by the configured patterns.
    Discover {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Only this service's patterns.
        #[arg(long)]
        service: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Pre-bundle one resolver file and print its declared steps.
    Summarize {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Resolver source file.
        #[arg(long)]
        file: String,

        /// Override the configured bundler.
        #[arg(long)]
        bundler: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the minimal standalone module of each step (or of one step).
    Slice {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Resolver source file.
        #[arg(long)]
        file: String,

        /// Only this step.
        #[arg(long)]
        step: Option<String>,

        /// Override the configured bundler.
        #[arg(long)]
        bundler: Option<String>,
    },

    /// Build artifacts and pipeline manifests for every discovered resolver.
    Build {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: String,

        /// Only build this service's resolvers.
        #[arg(long)]
        service: Option<String>,

        /// Override the configured bundler (`native` or `esbuild`).
        #[arg(long)]
        bundler: Option<String>,

        /// Emit source maps next to the artifacts.
        #[arg(long, default_value_t = false)]
        source_maps: bool,
    },

    /// List bundlers compiled into this binary.
    Bundlers {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Init { root, name, force } => init_command(&root, name, force)?,
        Command::Discover { config, service, json } => {
            discover_command(&config, service.as_deref(), json)?
        }
        Command::Summarize { config, file, bundler, json } => {
            summarize_command(&config, &file, bundler, json)?
        }
        Command::Slice { config, file, step, bundler } => {
            slice_command(&config, &file, step.as_deref(), bundler)?
        }
        Command::Build { config, service, bundler, source_maps } => {
            let options = BuildOptions {
                service,
                bundler,
                source_maps: source_maps.then_some(true),
            };
            build_command(&config, options)?
        }
        Command::Bundlers { json } => list_bundlers_command(json)?,
    }

    Ok(())
}
