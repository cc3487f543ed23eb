//! Turns a fresh DuckDB connection into one attached to a DuckLake catalog.
//!
//! Provisioning runs a fixed sequence of statements: extension install and
//! load, storage credentials, then catalog attach and `USE`. The sequence is
//! planned up front so an unsupported storage backend fails before a
//! connection is opened. Statements are not retried.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use duckflow_config::shared::{ConnectionSettings, REDACTED, StorageSettings};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::bail;
use crate::ducklake::Connection;
use crate::ducklake::sql;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;

/// A DuckDB extension and the repository it is installed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuckDbExtension {
    pub name: &'static str,
    pub source: &'static str,
}

/// Extensions installed on every provisioned connection, in order.
pub const EXTENSIONS: &[DuckDbExtension] = &[
    DuckDbExtension {
        name: "ducklake",
        source: "core_nightly",
    },
    DuckDbExtension {
        name: "postgres",
        source: "core",
    },
];

/// Name of the secret holding GCS credentials.
pub const GCS_SECRET_NAME: &str = "gcs_secret";

/// Object storage backends the provisioner knows how to configure.
///
/// New backends need new code here; they cannot be added through settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Gcs,
}

impl StorageBackend {
    /// Resolves the backend named by `storage.type`.
    pub fn from_settings(storage: &StorageSettings) -> EtlResult<Self> {
        match storage.storage_type.as_str() {
            "s3" => Ok(StorageBackend::S3),
            "gcs" => Ok(StorageBackend::Gcs),
            other => bail!(
                ErrorKind::UnsupportedStorageBackend,
                "Unsupported storage backend",
                format!("storage type `{other}`, expected `s3` or `gcs`")
            ),
        }
    }
}

/// The provisioning step a statement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    Extensions,
    Storage,
    Catalog,
}

impl SetupStage {
    fn error(&self, statement: &SetupStatement, source: duckdb::Error) -> EtlError {
        let (kind, description) = match self {
            SetupStage::Extensions => (ErrorKind::ExtensionLoadFailed, "Failed to load extension"),
            SetupStage::Storage => (
                ErrorKind::StorageConfigurationFailed,
                "Failed to configure storage",
            ),
            SetupStage::Catalog => (ErrorKind::CatalogAttachFailed, "Failed to attach catalog"),
        };

        etl_error!(kind, description, statement.redacted.clone(), source: source)
    }
}

/// One statement of the provisioning sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupStatement {
    pub stage: SetupStage,
    /// Text executed and recorded in the setup script.
    pub sql: String,
    /// Text safe to log; equal to `sql` when no secret is involved.
    pub redacted: String,
}

impl SetupStatement {
    fn new(stage: SetupStage, sql: String) -> Self {
        Self {
            stage,
            redacted: sql.clone(),
            sql,
        }
    }

    fn with_redacted(stage: SetupStage, sql: String, redacted: String) -> Self {
        Self {
            stage,
            sql,
            redacted,
        }
    }
}

/// Builds and runs the provisioning sequence for one set of settings.
#[derive(Debug)]
pub struct ConnectionProvisioner<'a> {
    settings: &'a ConnectionSettings,
}

impl<'a> ConnectionProvisioner<'a> {
    pub fn new(settings: &'a ConnectionSettings) -> Self {
        Self { settings }
    }

    /// Returns every statement provisioning will issue, in order.
    pub fn plan(&self) -> EtlResult<Vec<SetupStatement>> {
        let mut statements = Vec::new();

        for extension in EXTENSIONS {
            statements.push(SetupStatement::new(
                SetupStage::Extensions,
                sql::install_extension(extension.name, extension.source),
            ));
            statements.push(SetupStatement::new(
                SetupStage::Extensions,
                sql::load_extension(extension.name),
            ));
        }

        let storage = &self.settings.storage;
        match StorageBackend::from_settings(storage)? {
            StorageBackend::S3 => statements.extend(s3_statements(storage)),
            StorageBackend::Gcs => {
                let secret = storage.secret_access_key.expose_secret();
                statements.push(SetupStatement::with_redacted(
                    SetupStage::Storage,
                    sql::create_gcs_secret(GCS_SECRET_NAME, &storage.access_key_id, secret),
                    sql::create_gcs_secret(GCS_SECRET_NAME, &storage.access_key_id, REDACTED),
                ));
            }
        }

        let catalog = &self.settings.catalog;
        let alias = &self.settings.catalog_name;
        statements.push(SetupStatement::with_redacted(
            SetupStage::Catalog,
            sql::attach_catalog(&catalog.connection_string(), alias, &storage.data_path),
            sql::attach_catalog(
                &catalog.redacted_connection_string(),
                alias,
                &storage.data_path,
            ),
        ));
        statements.push(SetupStatement::new(
            SetupStage::Catalog,
            sql::use_catalog(alias),
        ));

        Ok(statements)
    }

    /// Opens a connection and runs the provisioning sequence on it.
    pub fn provision(&self) -> EtlResult<Connection> {
        let plan = self.plan()?;

        let connection = Connection::open_in_memory()?;
        info!(version = %connection.version()?, "opened DuckDB connection");

        execute_plan(&connection, &plan, self.settings.setup_script_path())?;

        info!(
            catalog = %self.settings.catalog_name,
            data_path = %self.settings.storage.data_path,
            "attached DuckLake catalog"
        );

        Ok(connection)
    }
}

/// Provisions a connection for `settings`.
pub fn provision(settings: &ConnectionSettings) -> EtlResult<Connection> {
    ConnectionProvisioner::new(settings).provision()
}

/// One `SET s3_<key>` per configured field, skipping unset optional fields.
fn s3_statements(storage: &StorageSettings) -> Vec<SetupStatement> {
    let secret = storage.secret_access_key.expose_secret();
    let use_ssl = storage.use_ssl.map(|use_ssl| use_ssl.to_string());

    let options: [(&str, Option<&str>); 6] = [
        ("access_key_id", Some(storage.access_key_id.as_str())),
        ("secret_access_key", Some(secret.as_str())),
        ("endpoint", storage.endpoint.as_deref()),
        ("region", storage.region.as_deref()),
        ("url_style", storage.url_style.as_deref()),
        ("use_ssl", use_ssl.as_deref()),
    ];

    options
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .map(|(key, value)| {
            let statement = sql::set_s3_option(key, value);
            if key == "secret_access_key" {
                SetupStatement::with_redacted(
                    SetupStage::Storage,
                    statement,
                    sql::set_s3_option(key, REDACTED),
                )
            } else {
                SetupStatement::new(SetupStage::Storage, statement)
            }
        })
        .collect()
}

/// Runs `plan` on `connection`, stopping at the first failure.
///
/// When `script_path` is set the file is truncated first and each statement is
/// appended to it before it executes, so the script also holds the statement
/// that failed.
pub(crate) fn execute_plan(
    connection: &Connection,
    plan: &[SetupStatement],
    script_path: Option<&Path>,
) -> EtlResult<()> {
    let mut script = script_path.map(SetupScript::create).transpose()?;

    for statement in plan {
        if let Some(script) = script.as_mut() {
            script.record(&statement.sql)?;
        }

        debug!(stage = ?statement.stage, statement = %statement.redacted, "provisioning");
        connection
            .raw()
            .execute_batch(&statement.sql)
            .map_err(|e| statement.stage.error(statement, e))?;
    }

    Ok(())
}

/// Replayable record of the provisioning statements.
struct SetupScript {
    writer: BufWriter<File>,
}

impl SetupScript {
    fn create(path: &Path) -> EtlResult<Self> {
        let file = File::create(path).map_err(|e| {
            etl_error!(
                ErrorKind::IoError,
                "Failed to create setup script",
                path.display(),
                source: e
            )
        })?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn record(&mut self, statement: &str) -> EtlResult<()> {
        writeln!(self.writer, "{statement}")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use duckflow_config::shared::CatalogSettings;
    use secrecy::SecretString;

    use super::*;

    fn settings(storage_type: &str) -> ConnectionSettings {
        ConnectionSettings {
            storage: StorageSettings {
                storage_type: storage_type.to_owned(),
                access_key_id: "AKIA".to_owned(),
                secret_access_key: SecretString::new("s3cr3t".to_owned()),
                data_path: "s3://bucket/lake/".to_owned(),
                endpoint: None,
                region: Some("eu-west-1".to_owned()),
                url_style: None,
                use_ssl: Some(false),
            },
            catalog: CatalogSettings {
                dbname: "lake".to_owned(),
                host: "db".to_owned(),
                port: 5432,
                user: "etl".to_owned(),
                password: SecretString::new("pw".to_owned()),
            },
            catalog_name: "ducklake".to_owned(),
            setup_script_path: None,
        }
    }

    fn sql_of(plan: &[SetupStatement]) -> Vec<&str> {
        plan.iter().map(|statement| statement.sql.as_str()).collect()
    }

    #[test]
    fn s3_plan_sets_every_configured_field() {
        let plan = ConnectionProvisioner::new(&settings("s3")).plan().unwrap();

        assert_eq!(
            sql_of(&plan),
            vec![
                "INSTALL ducklake FROM core_nightly;",
                "LOAD ducklake;",
                "INSTALL postgres FROM core;",
                "LOAD postgres;",
                "SET s3_access_key_id='AKIA';",
                "SET s3_secret_access_key='s3cr3t';",
                "SET s3_region='eu-west-1';",
                "SET s3_use_ssl='false';",
                "ATTACH 'ducklake:postgres:dbname=lake host=db port=5432 user=etl password=pw' AS ducklake (DATA_PATH 's3://bucket/lake/');",
                "USE ducklake;",
            ]
        );
    }

    #[test]
    fn secrets_are_redacted_for_logging() {
        let plan = ConnectionProvisioner::new(&settings("s3")).plan().unwrap();
        for statement in &plan {
            assert!(!statement.redacted.contains("s3cr3t"), "{}", statement.redacted);
            assert!(!statement.redacted.contains("password=pw"), "{}", statement.redacted);
        }
    }

    #[test]
    fn gcs_plan_creates_a_secret() {
        let plan = ConnectionProvisioner::new(&settings("gcs")).plan().unwrap();
        let storage: Vec<_> = plan
            .iter()
            .filter(|statement| statement.stage == SetupStage::Storage)
            .collect();

        assert_eq!(storage.len(), 1);
        assert_eq!(
            storage[0].sql,
            "CREATE OR REPLACE SECRET gcs_secret (TYPE gcs, KEY_ID 'AKIA', SECRET 's3cr3t');"
        );
    }

    #[test]
    fn unsupported_storage_fails_before_connecting() {
        let err = provision(&settings("azure")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedStorageBackend);
        assert!(err.to_string().contains("azure"));
    }

    #[test]
    fn script_records_statements_up_to_the_failing_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.sql");
        let connection = Connection::open_in_memory().unwrap();
        let plan = vec![
            SetupStatement::new(SetupStage::Extensions, "SELECT 1;".to_owned()),
            SetupStatement::new(SetupStage::Catalog, "USE missing_catalog;".to_owned()),
            SetupStatement::new(SetupStage::Catalog, "SELECT 2;".to_owned()),
        ];

        let err = execute_plan(&connection, &plan, Some(&path)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CatalogAttachFailed);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "SELECT 1;\nUSE missing_catalog;\n"
        );
    }

    #[test]
    fn script_is_rewritten_on_each_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.sql");
        std::fs::write(&path, "stale\n").unwrap();
        let connection = Connection::open_in_memory().unwrap();
        let plan = vec![SetupStatement::new(
            SetupStage::Storage,
            "SELECT 1;".to_owned(),
        )];

        execute_plan(&connection, &plan, Some(&path)).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "SELECT 1;\n");
    }
}
