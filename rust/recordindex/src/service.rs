use std::sync::Arc;

use parking_lot::RwLock;
use recordindex_config::ConfigError;
use recordindex_error::{ErrorCodes, RecordIndexError};
use recordindex_types::{CollectionConfig, IndexDocument, NamingPolicy, RemoteEffect, Schema};

use crate::client::{ConnectError, HttpConnector, SolrAdmin, SolrClientError, SolrConnector};
use crate::config::IndexerConfig;
use crate::documents::{self, DocumentError};
use crate::provisioner::{
    CollectionProvisioner, CreateCollectionError, CreateCollectionOutcome, DeleteCollectionError,
    DeleteCollectionOutcome,
};
use crate::reconciler::{GetSchemaError, SchemaReconciler, UpdateSchemaError};
use crate::schema_cache::SchemaCache;

#[derive(Debug, thiserror::Error)]
pub enum EnsureTableIndexError {
    #[error(transparent)]
    Create(#[from] CreateCollectionError),
    #[error(transparent)]
    Schema(#[from] UpdateSchemaError),
}

impl RecordIndexError for EnsureTableIndexError {
    fn code(&self) -> ErrorCodes {
        match self {
            EnsureTableIndexError::Create(err) => err.code(),
            EnsureTableIndexError::Schema(err) => err.code(),
        }
    }
}

impl EnsureTableIndexError {
    /// A failed schema merge leaves the collection in place without the
    /// declared schema.
    pub fn remote_effect(&self) -> RemoteEffect {
        match self {
            EnsureTableIndexError::Create(err) => err.remote_effect(),
            EnsureTableIndexError::Schema(_) => RemoteEffect::Partial,
        }
    }
}

/// The entry point embedders hold on to: one per process and cluster.
///
/// The client handle is created on first use and shared by every operation
/// until [`IndexerService::destroy`] closes it; the next operation connects
/// again.
#[derive(Debug)]
pub struct IndexerService {
    config: IndexerConfig,
    naming: NamingPolicy,
    provisioner: CollectionProvisioner,
    reconciler: SchemaReconciler,
    schema_cache: SchemaCache,
    connector: Arc<dyn SolrConnector>,
    client: RwLock<Option<Arc<dyn SolrAdmin>>>,
}

impl IndexerService {
    /// Validates `config` and connects over HTTP on first use.
    pub fn new(config: IndexerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let options = config
            .client_options()
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Ok(Self::with_connector(
            config,
            Arc::new(HttpConnector::new(options)),
        ))
    }

    pub fn with_connector(config: IndexerConfig, connector: Arc<dyn SolrConnector>) -> Self {
        let naming = config.naming_policy();
        IndexerService {
            provisioner: CollectionProvisioner::new(naming.clone(), config.config_set.clone()),
            reconciler: SchemaReconciler::new(naming.clone()),
            schema_cache: SchemaCache::new(&config.schema_cache),
            naming,
            connector,
            client: RwLock::new(None),
            config,
        }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn naming(&self) -> &NamingPolicy {
        &self.naming
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    /// The shared client handle, connecting if there is none.
    pub fn client(&self) -> Result<Arc<dyn SolrAdmin>, ConnectError> {
        if let Some(client) = self.client.read().as_ref() {
            return Ok(client.clone());
        }
        let mut slot = self.client.write();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        tracing::info!(url = %self.config.solr_server_url, "Connecting to Solr");
        let client = self.connector.connect().map_err(|err| {
            tracing::error!(error = %err, "Failed to connect to Solr");
            ConnectError(err)
        })?;
        *slot = Some(client.clone());
        Ok(client)
    }

    pub fn get_service_client(&self) -> Result<Arc<dyn SolrAdmin>, ConnectError> {
        self.client()
    }

    /// Closes the client handle, if any. Cached schemas are kept.
    pub async fn destroy(&self) -> Result<(), SolrClientError> {
        let client = self.client.write().take();
        match client {
            Some(client) => {
                tracing::info!("Closing Solr client");
                client.close().await
            }
            None => Ok(()),
        }
    }

    pub async fn create_collection(
        &self,
        config: &CollectionConfig,
    ) -> Result<CreateCollectionOutcome, CreateCollectionError> {
        let client = self.client()?;
        self.provisioner
            .create_collection(client.as_ref(), config)
            .await
    }

    pub async fn delete_collection(
        &self,
        table: &str,
    ) -> Result<DeleteCollectionOutcome, DeleteCollectionError> {
        let client = self.client()?;
        self.provisioner
            .delete_collection(client.as_ref(), &self.schema_cache, table)
            .await
    }

    pub async fn collection_exists(&self, table: &str) -> Result<bool, SolrClientError> {
        let client = self.client().map_err(|err| err.0)?;
        self.provisioner
            .collection_exists(client.as_ref(), table)
            .await
    }

    pub async fn collection_config_exists(&self, table: &str) -> Result<bool, SolrClientError> {
        let client = self.client().map_err(|err| err.0)?;
        self.provisioner
            .collection_config_exists(client.as_ref(), table)
            .await
    }

    pub async fn get_schema(&self, table: &str) -> Result<Schema, GetSchemaError> {
        let client = self.client()?;
        self.reconciler
            .get_schema(client.as_ref(), &self.schema_cache, table)
            .await
    }

    pub async fn update_schema(
        &self,
        table: &str,
        desired: &Schema,
        merge: bool,
    ) -> Result<(), UpdateSchemaError> {
        let client = self.client()?;
        self.reconciler
            .update_schema(client.as_ref(), &self.schema_cache, table, desired, merge)
            .await
    }

    /// Forgets the cached schema of `table`; the next read goes to the
    /// cluster.
    pub async fn invalidate_schema(&self, table: &str) {
        if let Some(collection) = self.naming.qualify(table) {
            self.schema_cache.remove(&collection).await;
        }
    }

    /// Creates the collection of a table if needed and merges the schema the
    /// table declares into it.
    pub async fn ensure_table_index(
        &self,
        config: &CollectionConfig,
    ) -> Result<CreateCollectionOutcome, EnsureTableIndexError> {
        let outcome = self.create_collection(config).await?;
        if let Some(schema) = config.schema() {
            self.update_schema(config.collection_name(), schema, true)
                .await?;
        }
        Ok(outcome)
    }

    pub async fn index_documents(
        &self,
        table: &str,
        docs: &[IndexDocument],
    ) -> Result<(), DocumentError> {
        if docs.is_empty() {
            return Ok(());
        }
        let client = self.client()?;
        documents::index_documents(client.as_ref(), table, docs).await
    }

    pub async fn delete_documents_by_ids(
        &self,
        table: &str,
        ids: &[String],
    ) -> Result<(), DocumentError> {
        if ids.is_empty() {
            return Ok(());
        }
        let client = self.client()?;
        documents::delete_documents_by_ids(client.as_ref(), table, ids).await
    }

    pub async fn delete_documents_by_query(
        &self,
        table: &str,
        query: &str,
    ) -> Result<(), DocumentError> {
        if query.trim().is_empty() {
            return Ok(());
        }
        let client = self.client()?;
        documents::delete_documents_by_query(client.as_ref(), table, query).await
    }
}
