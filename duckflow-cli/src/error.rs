use duckflow::error::EtlError;
use duckflow_config::LoadConfigError;
use duckflow_telemetry::tracing::TracingError;
use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

/// Failures of a `duckflow` invocation.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to load connection settings: {0}")]
    Settings(#[source] LoadConfigError),

    #[error("failed to load pipeline `{name}`: {source}")]
    Pipeline {
        name: String,
        #[source]
        source: LoadConfigError,
    },

    #[error("failed to initialize tracing: {0}")]
    Tracing(#[from] TracingError),

    #[error(transparent)]
    Etl(#[from] EtlError),
}

impl CliError {
    /// Short category label used in the terminal report.
    pub fn category(&self) -> &'static str {
        match self {
            CliError::Settings(_) | CliError::Pipeline { .. } => "configuration error",
            CliError::Tracing(_) => "telemetry error",
            CliError::Etl(_) => "pipeline error",
        }
    }

    /// Renders the error and its causes for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = format!("duckflow failed\ncategory: {}\nerror: {self}\n", self.category());

        // Aggregated errors already list every cause in their display form.
        if !matches!(self, CliError::Etl(err) if err.errors().is_some()) {
            let mut source = std::error::Error::source(self);
            let mut index = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {index}: {err}\n"));
                source = err.source();
                index += 1;
            }
        }

        out
    }
}
