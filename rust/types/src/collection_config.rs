use crate::Schema;
use recordindex_error::{ErrorCodes, RecordIndexError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CollectionConfigError {
    #[error("Collection name cannot be empty")]
    EmptyCollectionName,
    #[error("Cluster address cannot be empty when it is given")]
    EmptyServerUrl,
    #[error("Number of shards must be at least 1")]
    InvalidShards,
    #[error("Number of replicas must be at least 1")]
    InvalidReplicas,
}

impl RecordIndexError for CollectionConfigError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// Everything needed to provision the collection behind one table.
///
/// Only constructible through [`CollectionConfig::builder`], which rejects
/// invalid topologies up front.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionConfig {
    collection_name: String,
    solr_server_url: Option<String>,
    shards: u32,
    replicas: u32,
    config_set: Option<String>,
    schema: Option<Schema>,
}

#[bon::bon]
impl CollectionConfig {
    #[builder]
    pub fn new(
        #[builder(into)] collection_name: String,
        #[builder(into)] solr_server_url: Option<String>,
        #[builder(default = 1)] shards: u32,
        #[builder(default = 1)] replicas: u32,
        #[builder(into)] config_set: Option<String>,
        schema: Option<Schema>,
    ) -> Result<Self, CollectionConfigError> {
        if collection_name.trim().is_empty() {
            return Err(CollectionConfigError::EmptyCollectionName);
        }
        if solr_server_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            return Err(CollectionConfigError::EmptyServerUrl);
        }
        if shards == 0 {
            return Err(CollectionConfigError::InvalidShards);
        }
        if replicas == 0 {
            return Err(CollectionConfigError::InvalidReplicas);
        }
        let config_set = config_set.filter(|name| !name.trim().is_empty());
        Ok(CollectionConfig {
            collection_name,
            solr_server_url,
            shards,
            replicas,
            config_set,
            schema,
        })
    }
}

impl CollectionConfig {
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn solr_server_url(&self) -> Option<&str> {
        self.solr_server_url.as_deref()
    }

    pub fn shards(&self) -> u32 {
        self.shards
    }

    pub fn replicas(&self) -> u32 {
        self.replicas
    }

    /// The config-set the collection is created from. Defaults to the
    /// collection's own name.
    pub fn config_set(&self) -> &str {
        self.config_set
            .as_deref()
            .unwrap_or(self.collection_name.as_str())
    }

    /// The config-set given explicitly, if any. A table's own config-set is
    /// cloned from it instead of the service-wide template.
    pub fn requested_config_set(&self) -> Option<&str> {
        self.config_set.as_deref()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }
}
