use recordindex_error::{ErrorCodes, RecordIndexError};
use recordindex_types::{NamingPolicy, Schema, SchemaFieldError};
use thiserror::Error;

use crate::client::{ConnectError, SchemaUpdate, SolrAdmin, SolrClientError};
use crate::schema_cache::SchemaCache;

#[derive(Debug, Error)]
pub enum GetSchemaError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("No schema found for table '{0}'")]
    SchemaNotFound(String),
    #[error("Error in fetching the schema of table '{table}': {source}")]
    Remote {
        table: String,
        #[source]
        source: SolrClientError,
    },
    #[error("Schema of table '{table}' could not be read: {source}")]
    Malformed {
        table: String,
        #[source]
        source: SchemaFieldError,
    },
}

impl RecordIndexError for GetSchemaError {
    fn code(&self) -> ErrorCodes {
        match self {
            GetSchemaError::Connect(err) => err.code(),
            GetSchemaError::SchemaNotFound(_) => ErrorCodes::NotFound,
            GetSchemaError::Remote { source, .. } => source.code(),
            GetSchemaError::Malformed { .. } => ErrorCodes::Internal,
        }
    }
}

#[derive(Debug, Error)]
pub enum UpdateSchemaError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error("No schema found for table '{0}'")]
    SchemaNotFound(String),
    #[error(transparent)]
    GetSchema(GetSchemaError),
    #[error("Schema update of table '{table}' was rejected: {source}")]
    Rejected {
        table: String,
        #[source]
        source: SolrClientError,
    },
}

impl From<GetSchemaError> for UpdateSchemaError {
    fn from(err: GetSchemaError) -> Self {
        match err {
            GetSchemaError::Connect(err) => UpdateSchemaError::Connect(err),
            GetSchemaError::SchemaNotFound(table) => UpdateSchemaError::SchemaNotFound(table),
            err => UpdateSchemaError::GetSchema(err),
        }
    }
}

impl RecordIndexError for UpdateSchemaError {
    fn code(&self) -> ErrorCodes {
        match self {
            UpdateSchemaError::Connect(err) => err.code(),
            UpdateSchemaError::SchemaNotFound(_) => ErrorCodes::NotFound,
            UpdateSchemaError::GetSchema(err) => err.code(),
            UpdateSchemaError::Rejected { source, .. } => source.code(),
        }
    }
}

/// Computes the update batch that turns `current` into `desired`, together
/// with the schema the collection serves once the batch is applied.
///
/// In replace mode every field of `current` is deleted except the protected
/// ones (the unique key and `_version_`), then every desired field is added.
/// Protected fields survive the deletes, so desired definitions for them are
/// sent as replacements. All deletes come before any other command.
///
/// In merge mode nothing is deleted: desired fields already in `current` are
/// replaced and the others are added.
pub fn plan_schema_update(
    current: &Schema,
    desired: &Schema,
    merge: bool,
) -> (Vec<SchemaUpdate>, Schema) {
    if merge {
        let mut working = current.clone();
        let mut updates = Vec::with_capacity(desired.len());
        for field in desired.iter() {
            if working.contains_field(field.name()) {
                updates.push(SchemaUpdate::ReplaceField(field.clone()));
            } else {
                updates.push(SchemaUpdate::AddField(field.clone()));
            }
            working.add_field(field.clone());
        }
        return (updates, current.merged_with(desired));
    }

    let kept = |name: &str| current.contains_field(name) && current.is_protected(name);
    let mut updates = current
        .field_names()
        .filter(|name| !current.is_protected(name))
        .map(|name| SchemaUpdate::DeleteField(name.to_string()))
        .collect::<Vec<_>>();
    updates.extend(desired.iter().map(|field| {
        if kept(field.name()) {
            SchemaUpdate::ReplaceField(field.clone())
        } else {
            SchemaUpdate::AddField(field.clone())
        }
    }));
    (updates, desired.clone())
}

/// Reads and rewrites table schemas, keeping the schema cache in step with
/// what the cluster confirmed.
///
/// Schema introspection and updates address the collection by its table
/// name; the cluster resolves the tenant on its side. Cache entries and the
/// config-set lookup use the qualified name.
#[derive(Debug, Clone)]
pub struct SchemaReconciler {
    naming: NamingPolicy,
}

impl SchemaReconciler {
    pub fn new(naming: NamingPolicy) -> Self {
        SchemaReconciler { naming }
    }

    pub async fn get_schema(
        &self,
        admin: &dyn SolrAdmin,
        cache: &SchemaCache,
        table: &str,
    ) -> Result<Schema, GetSchemaError> {
        let Some(collection) = self.naming.qualify(table) else {
            return Err(GetSchemaError::SchemaNotFound(table.to_string()));
        };
        if let Some(schema) = cache.get(&collection).await {
            tracing::trace!(table, "Schema cache hit");
            return Ok(schema);
        }

        let remote = |source: SolrClientError| {
            tracing::error!(table, error = %source, "Failed to fetch schema");
            GetSchemaError::Remote {
                table: table.to_string(),
                source,
            }
        };
        if !admin.config_exists(&collection).await.map_err(remote)? {
            return Err(GetSchemaError::SchemaNotFound(table.to_string()));
        }
        let fields = admin.list_fields(table).await.map_err(remote)?;
        let unique_key = admin.unique_key(table).await.map_err(remote)?;
        let schema =
            Schema::from_remote(unique_key, fields).map_err(|source| GetSchemaError::Malformed {
                table: table.to_string(),
                source,
            })?;

        cache.put(&collection, schema.clone()).await;
        Ok(schema)
    }

    /// Brings the schema of `table` to `desired`, merging into the current
    /// schema or replacing it. The cache is only written once the cluster
    /// accepted the whole batch.
    pub async fn update_schema(
        &self,
        admin: &dyn SolrAdmin,
        cache: &SchemaCache,
        table: &str,
        desired: &Schema,
        merge: bool,
    ) -> Result<(), UpdateSchemaError> {
        let current = self.get_schema(admin, cache, table).await?;
        let (updates, updated) = plan_schema_update(&current, desired, merge);
        if updates.is_empty() {
            tracing::debug!(table, merge, "No schema commands to submit");
            if !merge {
                self.cache_updated(cache, table, updated).await;
            }
            return Ok(());
        }
        tracing::debug!(
            table,
            merge,
            commands = updates.len(),
            "Submitting schema update"
        );
        for update in &updates {
            tracing::trace!(table, command = update.command(), field = update.field_name());
        }

        admin
            .submit_schema_updates(table, &updates)
            .await
            .and_then(|response| response.into_result())
            .map_err(|source| {
                tracing::error!(table, error = %source, "Schema update was rejected");
                UpdateSchemaError::Rejected {
                    table: table.to_string(),
                    source,
                }
            })?;

        self.cache_updated(cache, table, updated).await;
        Ok(())
    }

    async fn cache_updated(&self, cache: &SchemaCache, table: &str, updated: Schema) {
        if let Some(collection) = self.naming.qualify(table) {
            cache.put(&collection, updated).await;
        }
    }
}
