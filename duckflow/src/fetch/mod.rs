//! Sources a pipeline reads its single [`Batch`] from.

mod ducklake;
mod gsheet;
mod yfinance;

pub use ducklake::DuckLakeFetcher;
pub use gsheet::{GoogleSheetCredentials, GoogleSheetFetcher};
pub use yfinance::YFinanceFetcher;

use std::path::Path;

use duckflow_config::shared::{Datasource, PipelineDefinition};

use crate::ducklake::Connection;
use crate::error::EtlResult;
use crate::types::{Batch, Series};

/// Produces the batch of one pipeline run.
pub trait Fetcher {
    /// Reads every row of the source. Called once per run.
    fn fetch(&self, pipeline: &PipelineDefinition) -> EtlResult<Batch>;
}

/// Builds the fetcher for the pipeline's datasource.
///
/// `connection` serves `ducklake` queries and `secrets_dir` holds the files
/// named by credential settings.
pub fn create_fetcher<'a>(
    pipeline: &PipelineDefinition,
    connection: &'a Connection,
    secrets_dir: &Path,
) -> EtlResult<Box<dyn Fetcher + 'a>> {
    let fetcher: Box<dyn Fetcher + 'a> = match &pipeline.datasource {
        Datasource::GoogleSheet {
            sheet_id,
            sheet_range,
            credentials_file,
        } => {
            let credentials = GoogleSheetCredentials::from_file(&secrets_dir.join(credentials_file))?;
            Box::new(GoogleSheetFetcher::new(
                sheet_id.clone(),
                sheet_range.clone(),
                credentials,
            )?)
        }
        Datasource::DuckLake { query } => Box::new(DuckLakeFetcher::new(connection, query.clone())),
        Datasource::YFinance {
            symbol,
            period,
            interval,
        } => Box::new(YFinanceFetcher::new(
            symbol.clone(),
            period.clone(),
            interval.clone(),
        )?),
    };

    Ok(fetcher)
}

/// An empty batch shaped like the pipeline's declared columns, all strings.
pub(crate) fn empty_batch(pipeline: &PipelineDefinition) -> EtlResult<Batch> {
    Batch::new(
        pipeline
            .column_names()
            .into_iter()
            .map(|name| Series::from_strings(name, std::iter::empty::<Option<String>>()))
            .collect(),
    )
}
