use recordindex_error::{ErrorCodes, RecordIndexError};
use recordindex_types::{CollectionConfig, NamingPolicy, RemoteEffect};
use thiserror::Error;

use crate::client::{ConnectError, SolrAdmin, SolrClientError};
use crate::schema_cache::SchemaCache;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateCollectionOutcome {
    Created,
    /// The collection was already there; nothing was changed.
    AlreadyExisted,
}

impl CreateCollectionOutcome {
    pub fn created(&self) -> bool {
        matches!(self, CreateCollectionOutcome::Created)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteCollectionOutcome {
    /// The collection and the table's own config-set are gone.
    Deleted,
    /// The collection is gone but no config-set was deleted: none named after
    /// the table existed. This is not a successful deletion in the sense of
    /// [`DeleteCollectionOutcome::is_complete`], since the config-set removal
    /// never took place.
    DeletedKeepingConfigSet,
    /// There was no collection to delete.
    NotFound,
}

impl DeleteCollectionOutcome {
    /// Whether a collection was removed, with or without its config-set.
    pub fn deleted(&self) -> bool {
        !matches!(self, DeleteCollectionOutcome::NotFound)
    }

    /// Whether both the collection and its config-set were removed. Only
    /// this counts as a successful deletion of the table's index.
    pub fn is_complete(&self) -> bool {
        matches!(self, DeleteCollectionOutcome::Deleted)
    }
}

#[derive(Debug, Error)]
pub enum CreateCollectionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("Table name '{0}' cannot be mapped to a collection name")]
    InvalidName(String),
    #[error("Error while checking the index of table '{table}': {source}")]
    Lookup {
        table: String,
        #[source]
        source: SolrClientError,
    },
    #[error("Error in deploying the index configuration '{config_set}' for table '{table}': {source}")]
    ConfigSet {
        table: String,
        config_set: String,
        #[source]
        source: SolrClientError,
    },
    #[error("Error in creating collection '{collection}' for table '{table}': {source}")]
    Collection {
        table: String,
        collection: String,
        /// Whether this call created the config-set the collection needed.
        config_set_created: bool,
        #[source]
        source: SolrClientError,
    },
}

impl CreateCollectionError {
    /// A config-set created by this call stays behind when the collection
    /// cannot be created. Calling `create_collection` again picks it up.
    pub fn remote_effect(&self) -> RemoteEffect {
        match self {
            CreateCollectionError::Collection {
                config_set_created: true,
                ..
            } => RemoteEffect::Partial,
            _ => RemoteEffect::None,
        }
    }
}

impl RecordIndexError for CreateCollectionError {
    fn code(&self) -> ErrorCodes {
        match self {
            CreateCollectionError::Connect(err) => err.code(),
            CreateCollectionError::InvalidName(_) => ErrorCodes::InvalidArgument,
            CreateCollectionError::Lookup { source, .. }
            | CreateCollectionError::ConfigSet { source, .. } => source.code(),
            CreateCollectionError::Collection { source, .. } => {
                if self.remote_effect().is_partial() {
                    ErrorCodes::Aborted
                } else {
                    source.code()
                }
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum DeleteCollectionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("Error while checking the index of table '{table}': {source}")]
    Lookup {
        table: String,
        #[source]
        source: SolrClientError,
    },
    #[error("Error in deleting collection '{collection}' of table '{table}': {source}")]
    Collection {
        table: String,
        collection: String,
        #[source]
        source: SolrClientError,
    },
    #[error("Collection of table '{table}' was deleted but its config-set '{config_set}' was not: {source}")]
    ConfigSet {
        table: String,
        config_set: String,
        #[source]
        source: SolrClientError,
    },
}

impl DeleteCollectionError {
    /// Once the collection is gone, a failure on its config-set leaves the
    /// table half deleted.
    pub fn remote_effect(&self) -> RemoteEffect {
        match self {
            DeleteCollectionError::ConfigSet { .. } => RemoteEffect::Partial,
            _ => RemoteEffect::None,
        }
    }
}

impl RecordIndexError for DeleteCollectionError {
    fn code(&self) -> ErrorCodes {
        match self {
            DeleteCollectionError::Connect(err) => err.code(),
            DeleteCollectionError::Lookup { source, .. }
            | DeleteCollectionError::Collection { source, .. } => source.code(),
            DeleteCollectionError::ConfigSet { .. } => ErrorCodes::Aborted,
        }
    }
}

/// Creates and deletes the collection and config-set behind a table.
///
/// Every table gets a config-set of its own, named like its collection, so
/// that schema changes to one table never leak into another.
#[derive(Debug, Clone)]
pub struct CollectionProvisioner {
    naming: NamingPolicy,
    base_config_set: String,
}

impl CollectionProvisioner {
    pub fn new(naming: NamingPolicy, base_config_set: impl Into<String>) -> Self {
        CollectionProvisioner {
            naming,
            base_config_set: base_config_set.into(),
        }
    }

    pub fn naming(&self) -> &NamingPolicy {
        &self.naming
    }

    pub async fn create_collection(
        &self,
        admin: &dyn SolrAdmin,
        config: &CollectionConfig,
    ) -> Result<CreateCollectionOutcome, CreateCollectionError> {
        let table = config.collection_name();
        let collection = self
            .naming
            .qualify(table)
            .ok_or_else(|| CreateCollectionError::InvalidName(table.to_string()))?;

        let lookup = |source| CreateCollectionError::Lookup {
            table: table.to_string(),
            source,
        };
        if admin.collection_exists(&collection).await.map_err(lookup)? {
            tracing::debug!(table, collection, "Collection already exists");
            return Ok(CreateCollectionOutcome::AlreadyExisted);
        }

        let config_set = collection.clone();
        let mut config_set_created = false;
        if !admin.config_exists(&config_set).await.map_err(lookup)? {
            let base = config
                .requested_config_set()
                .unwrap_or(self.base_config_set.as_str());
            tracing::info!(table, base, config_set, "Creating config-set");
            admin
                .create_config(base, &config_set)
                .await
                .and_then(|response| response.into_result())
                .map_err(|source| {
                    tracing::error!(table, config_set, error = %source, "Failed to create config-set");
                    CreateCollectionError::ConfigSet {
                        table: table.to_string(),
                        config_set: config_set.clone(),
                        source,
                    }
                })?;
            config_set_created = true;
        }

        tracing::info!(
            table,
            collection,
            shards = config.shards(),
            replicas = config.replicas(),
            "Creating collection"
        );
        admin
            .create_collection(&collection, &config_set, config.shards(), config.replicas())
            .await
            .and_then(|response| response.into_result())
            .map_err(|source| {
                tracing::error!(table, collection, error = %source, "Failed to create collection");
                CreateCollectionError::Collection {
                    table: table.to_string(),
                    collection: collection.clone(),
                    config_set_created,
                    source,
                }
            })?;

        Ok(CreateCollectionOutcome::Created)
    }

    /// Deletes the collection of `table`, then its config-set, and forgets
    /// the cached schema. A blank table name has nothing to delete.
    pub async fn delete_collection(
        &self,
        admin: &dyn SolrAdmin,
        cache: &SchemaCache,
        table: &str,
    ) -> Result<DeleteCollectionOutcome, DeleteCollectionError> {
        let Some(collection) = self.naming.qualify(table) else {
            return Ok(DeleteCollectionOutcome::NotFound);
        };

        let exists = admin
            .collection_exists(&collection)
            .await
            .map_err(|source| DeleteCollectionError::Lookup {
                table: table.to_string(),
                source,
            })?;
        if !exists {
            return Ok(DeleteCollectionOutcome::NotFound);
        }

        tracing::info!(table, collection, "Deleting collection");
        admin
            .delete_collection(&collection)
            .await
            .and_then(|response| response.into_result())
            .map_err(|source| {
                tracing::error!(table, collection, error = %source, "Failed to delete collection");
                DeleteCollectionError::Collection {
                    table: table.to_string(),
                    collection: collection.clone(),
                    source,
                }
            })?;
        cache.remove(&collection).await;

        let config_set = collection;
        let config_set_error = |source: SolrClientError| {
            tracing::error!(table, config_set, error = %source, "Failed to delete config-set");
            DeleteCollectionError::ConfigSet {
                table: table.to_string(),
                config_set: config_set.clone(),
                source,
            }
        };
        if !admin
            .config_exists(&config_set)
            .await
            .map_err(config_set_error)?
        {
            return Ok(DeleteCollectionOutcome::DeletedKeepingConfigSet);
        }
        tracing::info!(table, config_set, "Deleting config-set");
        admin
            .delete_config(&config_set)
            .await
            .and_then(|response| response.into_result())
            .map_err(config_set_error)?;

        Ok(DeleteCollectionOutcome::Deleted)
    }

    pub async fn collection_exists(
        &self,
        admin: &dyn SolrAdmin,
        table: &str,
    ) -> Result<bool, SolrClientError> {
        match self.naming.qualify(table) {
            Some(collection) => admin.collection_exists(&collection).await,
            None => Ok(false),
        }
    }

    pub async fn collection_config_exists(
        &self,
        admin: &dyn SolrAdmin,
        table: &str,
    ) -> Result<bool, SolrClientError> {
        match self.naming.qualify(table) {
            Some(config_set) => admin.config_exists(&config_set).await,
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{SolrOperation, TestSolr, DEFAULT_BASE_CONFIG_SET};
    use recordindex_types::{FieldType, Schema, SchemaField};

    fn provisioner() -> CollectionProvisioner {
        CollectionProvisioner::new(NamingPolicy::default(), DEFAULT_BASE_CONFIG_SET)
    }

    fn config(table: &str) -> CollectionConfig {
        CollectionConfig::builder()
            .collection_name(table)
            .shards(2)
            .build()
            .unwrap()
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_create_is_idempotent() {
        let solr = TestSolr::new();
        let provisioner = provisioner();

        let first = provisioner
            .create_collection(&solr, &config("orders"))
            .await
            .unwrap();
        let second = provisioner
            .create_collection(&solr, &config("orders"))
            .await
            .unwrap();

        assert_eq!(first, CreateCollectionOutcome::Created);
        assert_eq!(second, CreateCollectionOutcome::AlreadyExisted);
        assert_eq!(solr.collection_names(), vec!["DEFAULT_orders".to_string()]);
        assert_eq!(
            solr.config_set_names(),
            vec!["DEFAULT_orders".to_string(), DEFAULT_BASE_CONFIG_SET.to_string()]
        );
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_create_clones_requested_config_set() {
        let solr = TestSolr::new();
        let provisioner = provisioner();
        let template = Schema::with_fields([SchemaField::new("symbol", FieldType::String)]);
        solr.create_config(DEFAULT_BASE_CONFIG_SET, "records")
            .await
            .unwrap();
        solr.create_collection("records_holder", "records", 1, 1)
            .await
            .unwrap();
        assert!(solr.set_schema("records_holder", template.clone()));

        let config = CollectionConfig::builder()
            .collection_name("orders")
            .config_set("records")
            .build()
            .unwrap();
        provisioner.create_collection(&solr, &config).await.unwrap();

        assert_eq!(solr.schema_of("orders"), Some(template));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_config_set_failure_has_no_remote_effect() {
        let solr = TestSolr::new();
        solr.fail(SolrOperation::CreateConfig, 500);

        let err = provisioner()
            .create_collection(&solr, &config("orders"))
            .await
            .unwrap_err();

        assert!(matches!(err, CreateCollectionError::ConfigSet { .. }));
        assert_eq!(err.remote_effect(), RemoteEffect::None);
        assert!(solr.collection_names().is_empty());
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_collection_failure_after_config_set_is_partial_and_recoverable() {
        let solr = TestSolr::new();
        let provisioner = provisioner();
        solr.fail(SolrOperation::CreateCollection, 500);

        let err = provisioner
            .create_collection(&solr, &config("orders"))
            .await
            .unwrap_err();
        assert_eq!(err.remote_effect(), RemoteEffect::Partial);
        assert_eq!(err.code(), ErrorCodes::Aborted);
        assert!(solr.has_config_set("DEFAULT_orders"));
        assert!(!solr.has_collection("DEFAULT_orders"));

        solr.clear_failure(SolrOperation::CreateCollection);
        let outcome = provisioner
            .create_collection(&solr, &config("orders"))
            .await
            .unwrap();
        assert_eq!(outcome, CreateCollectionOutcome::Created);
        assert!(solr.has_collection("DEFAULT_orders"));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_rejected_collection_without_new_config_set_is_not_partial() {
        let solr = TestSolr::new();
        solr.create_config(DEFAULT_BASE_CONFIG_SET, "DEFAULT_orders")
            .await
            .unwrap();
        solr.fail(SolrOperation::CreateCollection, 400);

        let err = provisioner()
            .create_collection(&solr, &config("orders"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CreateCollectionError::Collection {
                config_set_created: false,
                ..
            }
        ));
        assert_eq!(err.remote_effect(), RemoteEffect::None);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_lookup_failure_is_an_error_not_absence() {
        let solr = TestSolr::new();
        solr.fail(SolrOperation::CollectionExists, 503);
        let provisioner = provisioner();

        assert!(matches!(
            provisioner.create_collection(&solr, &config("orders")).await,
            Err(CreateCollectionError::Lookup { .. })
        ));
        assert!(provisioner.collection_exists(&solr, "orders").await.is_err());
        assert!(matches!(
            provisioner
                .delete_collection(&solr, &SchemaCache::default(), "orders")
                .await,
            Err(DeleteCollectionError::Lookup { .. })
        ));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_delete_is_symmetric() {
        let solr = TestSolr::new();
        let cache = SchemaCache::default();
        let provisioner = provisioner();

        assert_eq!(
            provisioner
                .delete_collection(&solr, &cache, "orders")
                .await
                .unwrap(),
            DeleteCollectionOutcome::NotFound
        );

        provisioner
            .create_collection(&solr, &config("orders"))
            .await
            .unwrap();
        cache.put("DEFAULT_orders", Schema::default()).await;

        assert_eq!(
            provisioner
                .delete_collection(&solr, &cache, "orders")
                .await
                .unwrap(),
            DeleteCollectionOutcome::Deleted
        );
        assert!(!provisioner.collection_exists(&solr, "orders").await.unwrap());
        assert!(!provisioner
            .collection_config_exists(&solr, "orders")
            .await
            .unwrap());
        assert!(cache.get("DEFAULT_orders").await.is_none());
        assert_eq!(
            provisioner
                .delete_collection(&solr, &cache, "orders")
                .await
                .unwrap(),
            DeleteCollectionOutcome::NotFound
        );
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_delete_without_own_config_set() {
        let solr = TestSolr::new();
        solr.create_collection("DEFAULT_orders", DEFAULT_BASE_CONFIG_SET, 1, 1)
            .await
            .unwrap();

        let outcome = provisioner()
            .delete_collection(&solr, &SchemaCache::default(), "orders")
            .await
            .unwrap();
        assert_eq!(outcome, DeleteCollectionOutcome::DeletedKeepingConfigSet);
        assert!(outcome.deleted());
        assert!(!outcome.is_complete());
        assert!(solr.has_config_set(DEFAULT_BASE_CONFIG_SET));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_config_set_deletion_failure_is_partial() {
        let solr = TestSolr::new();
        let cache = SchemaCache::default();
        let provisioner = provisioner();
        provisioner
            .create_collection(&solr, &config("orders"))
            .await
            .unwrap();
        cache.put("DEFAULT_orders", Schema::default()).await;
        solr.fail(SolrOperation::DeleteConfig, 500);

        let err = provisioner
            .delete_collection(&solr, &cache, "orders")
            .await
            .unwrap_err();
        assert_eq!(err.remote_effect(), RemoteEffect::Partial);
        assert!(!solr.has_collection("DEFAULT_orders"));
        assert!(cache.get("DEFAULT_orders").await.is_none());
    }

    #[tokio::test]
    async fn test_blank_names() {
        let solr = TestSolr::new();
        let provisioner = provisioner();
        assert!(!provisioner.collection_exists(&solr, " ").await.unwrap());
        assert!(!provisioner.collection_config_exists(&solr, "").await.unwrap());
        assert_eq!(
            provisioner
                .delete_collection(&solr, &SchemaCache::default(), "")
                .await
                .unwrap(),
            DeleteCollectionOutcome::NotFound
        );
        assert_eq!(solr.calls(), 0);
    }
}
