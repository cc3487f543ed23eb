use std::cell::Cell as CallCount;

use duckflow_config::shared::PipelineDefinition;

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::fetch::Fetcher;
use crate::types::Batch;

/// Serves a clone of the same batch on every call and counts the calls.
#[derive(Debug)]
pub struct StaticFetcher {
    batch: Batch,
    calls: CallCount<usize>,
}

impl StaticFetcher {
    pub fn new(batch: Batch) -> Self {
        Self {
            batch,
            calls: CallCount::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, _pipeline: &PipelineDefinition) -> EtlResult<Batch> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.batch.clone())
    }
}

/// Fails every fetch with a [`ErrorKind::SourceIoError`].
#[derive(Debug, Default)]
pub struct FailingFetcher;

impl Fetcher for FailingFetcher {
    fn fetch(&self, pipeline: &PipelineDefinition) -> EtlResult<Batch> {
        Err(etl_error!(
            ErrorKind::SourceIoError,
            "Source is unavailable",
            pipeline.name.clone()
        ))
    }
}
