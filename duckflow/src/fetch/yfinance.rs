use chrono::DateTime;
use duckflow_config::shared::PipelineDefinition;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::fetch::Fetcher;
use crate::types::{Batch, Cell, DataType, Series};

const CHART_API_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart/";
const USER_AGENT: &str = concat!("duckflow/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

/// Price history of one ticker symbol from the Yahoo Finance chart API.
#[derive(Debug)]
pub struct YFinanceFetcher {
    client: Client,
    symbol: String,
    period: String,
    interval: String,
}

impl YFinanceFetcher {
    pub fn new(symbol: String, period: String, interval: String) -> EtlResult<Self> {
        if symbol.trim().is_empty() {
            bail!(ErrorKind::ConfigError, "Ticker symbol is empty");
        }

        let client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            symbol,
            period,
            interval,
        })
    }

    fn chart_url(&self) -> EtlResult<Url> {
        let mut url = Url::parse(CHART_API_URL).map_err(|e| {
            etl_error!(ErrorKind::ConfigError, "Invalid chart API URL", source: e)
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                etl_error!(
                    ErrorKind::ConfigError,
                    "Chart API URL cannot take path segments",
                    CHART_API_URL
                )
            })?
            .pop_if_empty()
            .push(&self.symbol);
        url.query_pairs_mut()
            .append_pair("range", &self.period)
            .append_pair("interval", &self.interval);

        Ok(url)
    }
}

impl Fetcher for YFinanceFetcher {
    fn fetch(&self, _pipeline: &PipelineDefinition) -> EtlResult<Batch> {
        info!(
            symbol = %self.symbol,
            period = %self.period,
            interval = %self.interval,
            "downloading price history"
        );

        // Unknown symbols come back as 404 with a chart error body.
        let response: ChartResponse = self.client.get(self.chart_url()?).send()?.json()?;
        let batch = chart_to_batch(&self.symbol, response)?;

        info!(symbol = %self.symbol, rows = batch.num_rows(), "price history downloaded");

        Ok(batch)
    }
}

fn chart_to_batch(symbol: &str, response: ChartResponse) -> EtlResult<Batch> {
    if let Some(error) = response.chart.error {
        bail!(
            ErrorKind::SourceIoError,
            "Chart API returned an error",
            format!("symbol `{symbol}`: {} ({})", error.description, error.code)
        );
    }

    let Some(result) = response.chart.result.and_then(|results| results.into_iter().next()) else {
        warn!(symbol, "chart API returned no result");
        return price_batch(symbol, Vec::new(), Quote::default());
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let rows = result.timestamp.len();
    for (name, len) in [
        ("open", quote.open.len()),
        ("high", quote.high.len()),
        ("low", quote.low.len()),
        ("close", quote.close.len()),
        ("volume", quote.volume.len()),
    ] {
        if len != rows {
            bail!(
                ErrorKind::SourceSchemaError,
                "Chart quote series does not match the timestamps",
                format!("`{name}` has {len} values for {rows} timestamps")
            );
        }
    }

    let dates = result
        .timestamp
        .into_iter()
        .map(|seconds| {
            DateTime::from_timestamp(seconds, 0)
                .map(|date| Cell::Timestamp(date.naive_utc()))
                .ok_or_else(|| {
                    etl_error!(
                        ErrorKind::SourceSchemaError,
                        "Chart timestamp is out of range",
                        seconds.to_string()
                    )
                })
        })
        .collect::<EtlResult<Vec<_>>>()?;

    price_batch(symbol, dates, quote)
}

fn price_batch(symbol: &str, dates: Vec<Cell>, quote: Quote) -> EtlResult<Batch> {
    let prices = |name: &str, values: Vec<Option<f64>>| {
        let values = values.into_iter().map(|v| v.map_or(Cell::Null, Cell::F64));
        Series::new(name, DataType::Float64, values.collect())
    };
    let volume = quote
        .volume
        .into_iter()
        .map(|v| v.map_or(Cell::Null, Cell::I64))
        .collect();
    let symbols = vec![Cell::String(symbol.to_owned()); dates.len()];

    Batch::new(vec![
        Series::new("Date", DataType::Timestamp, dates)?,
        prices("Open", quote.open)?,
        prices("High", quote.high)?,
        prices("Low", quote.low)?,
        prices("Close", quote.close)?,
        Series::new("Volume", DataType::Int64, volume)?,
        Series::new("Symbol", DataType::Utf8, symbols)?,
    ])
}
