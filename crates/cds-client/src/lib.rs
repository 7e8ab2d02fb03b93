//! Copernicus Climate Data Store (CDS) retrieval.
//!
//! Requests are submitted as jobs, polled until the service reports them
//! done, and the resulting asset is streamed to a local file. The
//! [`ClimateDataSource`] trait is the seam the acquisition stage talks to,
//! so tests can stand in a fake source for the network client.

mod client;
mod error;
mod request;

pub use client::{CdsClient, CdsConfig, DownloadProgress, JobStatus};
pub use error::{CdsError, CdsResult};
pub use request::{RetrieveRequest, CORDEX_DATASET};

use std::path::Path;

use async_trait::async_trait;

/// Something that can materialize a retrieve request as a local file.
#[async_trait]
pub trait ClimateDataSource: Send + Sync {
    /// Retrieve `request` from `dataset` and write the result to `target`.
    ///
    /// Returns the number of bytes written.
    async fn retrieve(
        &self,
        dataset: &str,
        request: &RetrieveRequest,
        target: &Path,
    ) -> CdsResult<u64>;
}
