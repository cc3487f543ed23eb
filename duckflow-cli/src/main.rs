//! `duckflow` command line.
//!
//! `duckflow run <name>` reads `<config-dir>/<name>.yaml`, provisions the
//! DuckLake connection described by the `DUCKLAKE_*` settings and runs the
//! pipeline once. The process exits with status 1 when anything fails.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use duckflow::runner::run_pipeline;
use duckflow_config::shared::{ConnectionSettings, PipelineDefinition};
use duckflow_config::{load_pipeline, load_settings};
use duckflow_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::error::{CliError, CliResult};

mod error;

#[derive(Debug, Parser)]
#[command(name = "duckflow", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the pipeline defined in `<config-dir>/<name>.yaml`.
    Run {
        /// Pipeline name, without the `.yaml` extension.
        name: String,
        /// Directory holding pipeline definitions.
        #[arg(long, env = "CONFIG_DIR", default_value = "config/etl")]
        config_dir: PathBuf,
        /// Directory holding credential files referenced by datasources.
        #[arg(long, env = "SECRETS_DIR", default_value = "secrets")]
        secrets_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            name,
            config_dir,
            secrets_dir,
        } => match run(&name, &config_dir, &secrets_dir) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprint!("{}", err.render_report());
                ExitCode::FAILURE
            }
        },
    }
}

fn run(name: &str, config_dir: &Path, secrets_dir: &Path) -> CliResult<()> {
    let settings = load_settings::<ConnectionSettings>().map_err(CliError::Settings)?;
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), Some(name))?;

    let result = load_definition(name, config_dir).and_then(|pipeline| {
        let outcome = run_pipeline(&settings, &pipeline, secrets_dir)?;
        info!(
            pipeline = %pipeline.name,
            deleted = outcome.deleted,
            inserted = outcome.inserted,
            "pipeline finished"
        );
        Ok(())
    });

    if let Err(err) = &result {
        error!(pipeline = name, category = err.category(), error = %err, "duckflow failed");
    }

    result
}

fn pipeline_path(name: &str, config_dir: &Path) -> PathBuf {
    config_dir.join(format!("{name}.yaml"))
}

fn load_definition(name: &str, config_dir: &Path) -> CliResult<PipelineDefinition> {
    load_pipeline(&pipeline_path(name, config_dir)).map_err(|source| CliError::Pipeline {
        name: name.to_owned(),
        source,
    })
}
