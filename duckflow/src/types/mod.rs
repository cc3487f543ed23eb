//! In-memory columnar data moving through a pipeline run.

mod batch;
mod cell;

pub use batch::{Batch, Series};
pub use cell::{Cell, DataType};
pub(crate) use cell::epoch_date;
