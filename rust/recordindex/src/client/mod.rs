//! Access to the Solr cluster.
//!
//! This module contains:
//! - [`SolrAdmin`] - The administrative operations every other component goes through
//! - [`SolrHttpClient`] - The implementation over Solr's HTTP APIs
//! - [`TestSolr`] - An in-memory cluster with failure injection
//! - [`SolrConnector`] - How the service obtains a fresh client handle

mod admin;
mod options;
mod solr_http_client;
mod test_solr;

use std::sync::Arc;

use recordindex_error::{ErrorCodes, RecordIndexError};
use thiserror::Error;

pub use admin::*;
pub use options::*;
pub use solr_http_client::*;
pub use test_solr::*;

/// No client handle could be built.
#[derive(Debug, Error)]
#[error("Failed to connect to Solr: {0}")]
pub struct ConnectError(#[from] pub SolrClientError);

impl RecordIndexError for ConnectError {
    fn code(&self) -> ErrorCodes {
        match self.0.code() {
            ErrorCodes::InvalidArgument => ErrorCodes::InvalidArgument,
            _ => ErrorCodes::Unavailable,
        }
    }
}

/// Builds client handles. The service calls it lazily, and again after
/// every `destroy()`.
pub trait SolrConnector: Send + Sync + std::fmt::Debug {
    fn connect(&self) -> Result<Arc<dyn SolrAdmin>, SolrClientError>;
}

/// Connects over HTTP with fixed options.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    options: SolrHttpClientOptions,
}

impl HttpConnector {
    pub fn new(options: SolrHttpClientOptions) -> Self {
        HttpConnector { options }
    }
}

impl SolrConnector for HttpConnector {
    fn connect(&self) -> Result<Arc<dyn SolrAdmin>, SolrClientError> {
        Ok(Arc::new(SolrHttpClient::new(self.options.clone())?))
    }
}

/// Every connection to a `TestSolr` sees the same cluster; connecting again
/// after a close reopens it.
impl SolrConnector for TestSolr {
    fn connect(&self) -> Result<Arc<dyn SolrAdmin>, SolrClientError> {
        self.reopen();
        Ok(Arc::new(self.clone()))
    }
}
