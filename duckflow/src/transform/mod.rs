//! Per-column transforms applied to a whole [`Batch`].
//!
//! Each declared column becomes one [`ColumnExpr`]: a reference to the input
//! column followed by its transforms in declaration order. The result holds
//! exactly the declared columns, in declared order.

mod expr;
pub mod ops;

pub use expr::ColumnExpr;

use duckflow_config::shared::Column;
use tracing::debug;

use crate::error::EtlResult;
use crate::types::Batch;

/// Projects `batch` onto `columns`, applying each column's transforms.
///
/// Columns not declared are dropped. An empty column list returns the batch
/// unchanged. Any failure discards the whole result.
pub fn transform(batch: Batch, columns: &[Column]) -> EtlResult<Batch> {
    if columns.is_empty() {
        return Ok(batch);
    }

    let exprs = columns
        .iter()
        .map(ColumnExpr::for_column)
        .collect::<EtlResult<Vec<_>>>()?;

    let series = exprs
        .iter()
        .map(|expr| expr.evaluate(&batch))
        .collect::<EtlResult<Vec<_>>>()?;

    let transformed = Batch::new(series)?;

    debug!(
        columns = transformed.num_columns(),
        dropped = batch.num_columns().saturating_sub(transformed.num_columns()),
        rows = transformed.num_rows(),
        "transformed batch"
    );

    Ok(transformed)
}
