use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::load::Config;

/// Alias under which the remote catalog is attached when none is configured.
pub const DEFAULT_CATALOG_NAME: &str = "ducklake";

/// Placeholder rendered instead of secret values.
pub const REDACTED: &str = "***";

/// Object storage holding the data files of the attached catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Storage backend identifier, `s3` or `gcs`.
    ///
    /// Kept as free text here; the provisioner decides whether it is supported.
    #[serde(rename = "type")]
    pub storage_type: String,
    pub access_key_id: String,
    /// Sensitive and redacted in debug output.
    pub secret_access_key: SecretString,
    /// Root location of the data files, e.g. `s3://bucket/lake/`.
    pub data_path: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// `path` or `vhost`.
    #[serde(default)]
    pub url_style: Option<String>,
    #[serde(default)]
    pub use_ssl: Option<bool>,
}

/// Postgres-compatible database holding the catalog metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    pub dbname: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Sensitive and redacted in debug output.
    pub password: SecretString,
}

impl CatalogSettings {
    /// Renders the libpq `key=value` connection string expected by the catalog driver.
    ///
    /// Values containing whitespace, quotes or backslashes are single-quoted with
    /// quotes and backslashes escaped, as libpq requires.
    pub fn connection_string(&self) -> String {
        self.render_connection_string(self.password.expose_secret())
    }

    /// Same as [`CatalogSettings::connection_string`] with the password masked, for logs.
    pub fn redacted_connection_string(&self) -> String {
        self.render_connection_string(REDACTED)
    }

    fn render_connection_string(&self, password: &str) -> String {
        let port = self.port.to_string();
        let pairs = [
            ("dbname", self.dbname.as_str()),
            ("host", self.host.as_str()),
            ("port", port.as_str()),
            ("user", self.user.as_str()),
            ("password", password),
        ];

        pairs
            .iter()
            .map(|(key, value)| format!("{key}={}", libpq_value(value)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn libpq_value(value: &str) -> String {
    let needs_quoting = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');

    if needs_quoting {
        let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{escaped}'")
    } else {
        value.to_owned()
    }
}

/// Everything needed to provision a connection for one pipeline run.
///
/// Built once at the process boundary and never mutated afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    pub storage: StorageSettings,
    pub catalog: CatalogSettings,
    /// Alias the remote catalog is attached as.
    #[serde(default = "default_catalog_name")]
    pub catalog_name: String,
    /// When set, every provisioning statement is also appended to this file.
    #[serde(default)]
    pub setup_script_path: Option<PathBuf>,
}

fn default_catalog_name() -> String {
    DEFAULT_CATALOG_NAME.to_owned()
}

impl ConnectionSettings {
    /// Returns the setup script path, treating an empty path as unset.
    pub fn setup_script_path(&self) -> Option<&Path> {
        self.setup_script_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

impl Config for ConnectionSettings {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
