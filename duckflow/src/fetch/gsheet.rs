use std::path::Path;

use duckflow_config::shared::PipelineDefinition;
use reqwest::Url;
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::fetch::{Fetcher, empty_batch};
use crate::types::{Batch, Series};

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// Credentials for the Sheets API, read from a JSON file.
#[derive(Debug, Deserialize)]
pub struct GoogleSheetCredentials {
    api_key: SecretString,
}

impl GoogleSheetCredentials {
    /// Reads `{"api_key": "..."}` from `path`.
    pub fn from_file(path: &Path) -> EtlResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            etl_error!(
                ErrorKind::ConfigError,
                "Failed to read Google credentials file",
                path.display(),
                source: e
            )
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            etl_error!(
                ErrorKind::ConfigError,
                "Invalid Google credentials file",
                path.display(),
                source: e
            )
        })
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Reads a range of a Google spreadsheet; every column is a string.
#[derive(Debug)]
pub struct GoogleSheetFetcher {
    client: Client,
    base_url: Url,
    sheet_id: String,
    sheet_range: String,
    credentials: GoogleSheetCredentials,
}

impl GoogleSheetFetcher {
    pub fn new(
        sheet_id: String,
        sheet_range: String,
        credentials: GoogleSheetCredentials,
    ) -> EtlResult<Self> {
        let base_url = Url::parse(SHEETS_API_URL).map_err(|e| {
            etl_error!(ErrorKind::ConfigError, "Invalid Sheets API URL", source: e)
        })?;

        Ok(Self {
            client: Client::builder().build()?,
            base_url,
            sheet_id,
            sheet_range,
            credentials,
        })
    }

    /// `<base>/<sheet_id>/values/<range>` with each segment percent-encoded.
    fn values_url(&self) -> EtlResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                etl_error!(
                    ErrorKind::ConfigError,
                    "Sheets API URL cannot take path segments",
                    self.base_url.as_str()
                )
            })?
            .pop_if_empty()
            .extend([self.sheet_id.as_str(), "values", self.sheet_range.as_str()]);

        Ok(url)
    }
}

impl Fetcher for GoogleSheetFetcher {
    fn fetch(&self, pipeline: &PipelineDefinition) -> EtlResult<Batch> {
        info!(
            sheet_id = %self.sheet_id,
            range = %self.sheet_range,
            "reading spreadsheet range"
        );

        let range: ValueRange = self
            .client
            .get(self.values_url()?)
            .query(&[("key", self.credentials.api_key.expose_secret().as_str())])
            .send()?
            .error_for_status()?
            .json()?;

        if range.values.is_empty() {
            warn!(sheet_id = %self.sheet_id, "no data found in the sheet");
            return empty_batch(pipeline);
        }

        let batch = rows_to_batch(range.values)?;
        info!(rows = batch.num_rows(), columns = batch.num_columns(), "spreadsheet read");

        Ok(batch)
    }
}

/// Turns sheet rows into a batch using the first row as header.
///
/// The API omits trailing empty cells, so short rows are padded with nulls.
/// Cells beyond the header are dropped.
fn rows_to_batch(mut rows: Vec<Vec<String>>) -> EtlResult<Batch> {
    if rows.is_empty() {
        return Ok(Batch::empty());
    }

    let header = rows.remove(0);
    if let Some(position) = header.iter().position(|name| name.trim().is_empty()) {
        bail!(
            ErrorKind::SourceSchemaError,
            "Sheet header contains an empty column name",
            format!("column {}", position + 1)
        );
    }

    let series = header
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            Series::from_strings(name, rows.iter().map(|row| row.get(index).cloned()))
        })
        .collect();

    Batch::new(series)
}
