use std::{
    borrow::Cow,
    fmt, io,
    path::{Path, PathBuf},
};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use rust_cli_config::FileFormat;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;
use crate::shared::{PipelineDefinition, ValidationError};

/// Directory containing optional settings files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for base and environment settings files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable settings.
const ENV_PREFIX: &str = "DUCKLAKE";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// Trait implemented by settings structures loaded through [`load_settings`].
pub trait Config {
    /// Keys whose values should be parsed as lists when read from the environment.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Identifies which settings file is currently being loaded.
#[derive(Debug, Clone, Copy)]
enum ConfigFileKind {
    /// Shared settings every environment loads.
    Base,
    /// Environment-specific overrides.
    Environment(Environment),
}

impl ConfigFileKind {
    fn stem(&self) -> Cow<'static, str> {
        match self {
            ConfigFileKind::Base => Cow::Borrowed("base"),
            ConfigFileKind::Environment(env) => Cow::Owned(env.to_string()),
        }
    }
}

impl fmt::Display for ConfigFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFileKind::Base => f.write_str("base configuration"),
            ConfigFileKind::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// Errors that can occur while loading settings and pipeline definitions.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// The pipeline definition file does not exist.
    #[error("pipeline definition `{0}` does not exist")]
    PipelineFileMissing(PathBuf),

    /// A file existed but could not be parsed.
    #[error("failed to load {kind_description} from `{path}`: {source}")]
    ConfigurationFileLoad {
        kind_description: String,
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    /// Environment variable settings failed to merge.
    #[error("failed to load configuration from environment variables: {0}")]
    EnvironmentVariables(#[source] rust_cli_config::ConfigError),

    /// The sources were parsed but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    /// The pipeline definition was parsed but violates an invariant.
    #[error("invalid pipeline definition: {0}")]
    Validation(#[from] ValidationError),

    /// Failed to determine the runtime environment (`APP_ENVIRONMENT`).
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[source] io::Error),

    /// Failed to initialize the configuration builder.
    #[error("failed to initialize configuration builder: {0}")]
    Builder(#[source] rust_cli_config::ConfigError),
}

/// Loads settings from optional files and `DUCKLAKE_`-prefixed environment variables.
///
/// When a `configuration` directory exists in the working directory, its
/// `base.(yaml|yml|json)` file is required and `{environment}.(yaml|yml|json)`
/// is applied on top when present. Environment variables always win. Nested
/// keys use double underscores (`DUCKLAKE_STORAGE__TYPE`). Values are read as
/// text and only converted where the target field is numeric or boolean.
pub fn load_settings<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let configuration_directory = base_path.join(CONFIGURATION_DIR);

    let mut builder = rust_cli_config::Config::builder();

    if configuration_directory.is_dir() {
        let environment = Environment::load().map_err(LoadConfigError::Environment)?;

        let base_file = find_configuration_file(&configuration_directory, ConfigFileKind::Base)
            .ok_or_else(|| missing_file_error(&configuration_directory, ConfigFileKind::Base))?;
        builder = builder.add_source(rust_cli_config::File::from(base_file.clone()));
        validate_configuration_source(&builder, ConfigFileKind::Base, &base_file)?;

        let kind = ConfigFileKind::Environment(environment);
        if let Some(environment_file) = find_configuration_file(&configuration_directory, kind) {
            builder = builder.add_source(rust_cli_config::File::from(environment_file.clone()));
            validate_configuration_source(&builder, kind, &environment_file)?;
        }
    }

    let mut environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source.list_separator(LIST_SEPARATOR);

        for key in <T as Config>::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::EnvironmentVariables)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Loads and validates a pipeline definition from a YAML file.
pub fn load_pipeline(path: &Path) -> Result<PipelineDefinition, LoadConfigError> {
    if !path.is_file() {
        return Err(LoadConfigError::PipelineFileMissing(path.to_path_buf()));
    }

    let settings = rust_cli_config::Config::builder()
        .add_source(rust_cli_config::File::from(path).format(FileFormat::Yaml))
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            kind_description: "pipeline definition".to_owned(),
            path: path.to_path_buf(),
            source,
        })?;

    let pipeline = settings
        .try_deserialize::<PipelineDefinition>()
        .map_err(LoadConfigError::Deserialization)?;
    pipeline.validate()?;

    Ok(pipeline)
}

/// Finds the settings file that matches the requested kind and supported extensions.
fn find_configuration_file(directory: &Path, kind: ConfigFileKind) -> Option<PathBuf> {
    let stem = kind.stem();

    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .find(|path| path.is_file())
}

fn missing_file_error(directory: &Path, kind: ConfigFileKind) -> LoadConfigError {
    let stem = kind.stem();
    let attempted = CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| format!("`{}`", directory.join(format!("{stem}.{extension}")).display()))
        .collect::<Vec<_>>()
        .join(", ");

    LoadConfigError::ConfigurationFileLoad {
        kind_description: kind.to_string(),
        path: directory.to_path_buf(),
        source: rust_cli_config::ConfigError::Message(format!("attempted: {attempted}")),
    }
}

fn validate_configuration_source(
    builder: &ConfigBuilder<DefaultState>,
    kind: ConfigFileKind,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            kind_description: kind.to_string(),
            path: path.to_path_buf(),
            source,
        })
        .map(|_| ())
}
