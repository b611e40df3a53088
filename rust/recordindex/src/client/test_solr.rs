use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use recordindex_types::{
    FieldType, IndexDocument, NamingPolicy, Schema, SchemaField, FIELD_ID, FIELD_VERSION,
};
use serde_json::{json, Map, Value};

use crate::client::{
    AdminResponse, CollectionAdminResponse, SchemaUpdate, SchemaUpdateResponse, SolrAdmin,
    SolrClientError,
};

pub const DEFAULT_BASE_CONFIG_SET: &str = "_default";

/// A remote call `TestSolr` can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SolrOperation {
    CollectionExists,
    ConfigExists,
    CreateConfig,
    CreateCollection,
    DeleteCollection,
    DeleteConfig,
    ListFields,
    UniqueKey,
    SubmitSchemaUpdates,
    AddDocuments,
    DeleteByIds,
    DeleteByQuery,
    Commit,
}

#[derive(Debug, Default)]
struct ClusterState {
    // Config-set name to the managed schema it holds.
    config_sets: HashMap<String, Schema>,
    // Collection name to the config-set it was created from.
    collections: HashMap<String, String>,
    // Collection name to documents, keyed by id. Uncommitted until `commit`.
    pending: HashMap<String, HashMap<String, IndexDocument>>,
    committed: HashMap<String, HashMap<String, IndexDocument>>,
    pending_deletes: HashMap<String, HashSet<String>>,
    failures: HashMap<SolrOperation, i32>,
    closed: bool,
}

/// An in-memory Solr cluster.
///
/// Collections share the managed schema of the config-set they were created
/// from, like they do on a real cluster. Schema and document calls accept the
/// table name either as the physical collection name or as the logical name
/// it qualifies to under the cluster's naming policy.
#[derive(Debug, Clone)]
pub struct TestSolr {
    naming: NamingPolicy,
    state: Arc<Mutex<ClusterState>>,
    calls: Arc<AtomicUsize>,
}

impl Default for TestSolr {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSolr {
    /// A cluster holding only the `_default` config-set, whose schema has the
    /// `id` unique key and the `_version_` field.
    pub fn new() -> Self {
        Self::with_naming(NamingPolicy::default())
    }

    pub fn with_naming(naming: NamingPolicy) -> Self {
        let mut state = ClusterState::default();
        state
            .config_sets
            .insert(DEFAULT_BASE_CONFIG_SET.to_string(), base_schema());
        TestSolr {
            naming,
            state: Arc::new(Mutex::new(state)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes every following call of `operation` fail with `status` until
    /// [`TestSolr::clear_failure`] is called.
    pub fn fail(&self, operation: SolrOperation, status: i32) {
        self.state.lock().failures.insert(operation, status);
    }

    pub fn clear_failure(&self, operation: SolrOperation) {
        self.state.lock().failures.remove(&operation);
    }

    /// Number of remote calls served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn reopen(&self) {
        self.state.lock().closed = false;
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.state.lock().collections.contains_key(name)
    }

    pub fn has_config_set(&self, name: &str) -> bool {
        self.state.lock().config_sets.contains_key(name)
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names = self
            .state
            .lock()
            .collections
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn config_set_names(&self) -> Vec<String> {
        let mut names = self
            .state
            .lock()
            .config_sets
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    /// The schema a collection currently serves, looked up like the Schema
    /// API does.
    pub fn schema_of(&self, table: &str) -> Option<Schema> {
        let state = self.state.lock();
        let collection = self.resolve(&state, table)?;
        let config_set = state.collections.get(&collection)?;
        state.config_sets.get(config_set).cloned()
    }

    /// Writes a schema straight into the config-set of `table`, bypassing
    /// the Schema API.
    pub fn set_schema(&self, table: &str, schema: Schema) -> bool {
        let mut state = self.state.lock();
        let Some(collection) = self.resolve(&state, table) else {
            return false;
        };
        let Some(config_set) = state.collections.get(&collection).cloned() else {
            return false;
        };
        state.config_sets.insert(config_set, schema);
        true
    }

    /// Committed documents of `table`, sorted by id.
    pub fn documents(&self, table: &str) -> Vec<IndexDocument> {
        let state = self.state.lock();
        let Some(collection) = self.resolve(&state, table) else {
            return Vec::new();
        };
        let mut docs = state
            .committed
            .get(&collection)
            .map(|docs| docs.iter().collect::<Vec<_>>())
            .unwrap_or_default();
        docs.sort_by(|(a, _), (b, _)| a.cmp(b));
        docs.into_iter().map(|(_, doc)| doc.clone()).collect()
    }

    fn resolve(&self, state: &ClusterState, table: &str) -> Option<String> {
        if state.collections.contains_key(table) {
            return Some(table.to_string());
        }
        self.naming
            .qualify(table)
            .filter(|qualified| state.collections.contains_key(qualified))
    }

    /// Counts the call and returns the state guard, or the injected failure.
    fn enter(
        &self,
        operation: SolrOperation,
    ) -> Result<parking_lot::MutexGuard<'_, ClusterState>, SolrClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        if state.closed {
            return Err(SolrClientError::Closed);
        }
        if let Some(status) = state.failures.get(&operation) {
            return Err(SolrClientError::Api {
                status: *status,
                errors: json!({ "msg": format!("injected failure for {operation:?}") }),
            });
        }
        Ok(state)
    }

    fn collection_for(
        &self,
        state: &ClusterState,
        table: &str,
    ) -> Result<String, SolrClientError> {
        self.resolve(state, table).ok_or_else(|| SolrClientError::Api {
            status: 404,
            errors: json!({ "msg": format!("Can not find collection: {table}") }),
        })
    }
}

fn base_schema() -> Schema {
    Schema::new(
        FIELD_ID,
        [
            SchemaField::new(FIELD_ID, FieldType::String)
                .with_indexed(true)
                .with_stored(true)
                .with_property("required", true),
            SchemaField::new(FIELD_VERSION, FieldType::Long)
                .with_indexed(false)
                .with_stored(false),
        ],
    )
}

fn rejected(status: i32, msg: String) -> AdminResponse {
    AdminResponse {
        status,
        errors: Some(json!([{ "errorMessages": [msg] }])),
    }
}

fn apply_update(schema: &mut Schema, update: &SchemaUpdate) -> Result<(), String> {
    match update {
        SchemaUpdate::AddField(field) => {
            if schema.contains_field(field.name()) {
                return Err(format!("Field '{}' already exists.", field.name()));
            }
            schema.add_field(field.clone());
        }
        SchemaUpdate::ReplaceField(field) => {
            if !schema.contains_field(field.name()) {
                return Err(format!(
                    "The field '{}' is not present in this schema, and so cannot be replaced.",
                    field.name()
                ));
            }
            schema.add_field(field.clone());
        }
        SchemaUpdate::DeleteField(name) => {
            if !schema.contains_field(name) {
                return Err(format!(
                    "The field '{name}' is not present in this schema, and so cannot be deleted."
                ));
            }
            if name == schema.unique_key() {
                return Err(format!("Can't delete '{name}' because it's the uniqueKey field."));
            }
            let remaining = schema.iter().filter(|field| field.name() != name).cloned();
            *schema = Schema::new(schema.unique_key(), remaining.collect::<Vec<_>>());
        }
    }
    Ok(())
}

#[async_trait]
impl SolrAdmin for TestSolr {
    async fn collection_exists(&self, name: &str) -> Result<bool, SolrClientError> {
        let state = self.enter(SolrOperation::CollectionExists)?;
        Ok(state.collections.contains_key(name))
    }

    async fn config_exists(&self, name: &str) -> Result<bool, SolrClientError> {
        let state = self.enter(SolrOperation::ConfigExists)?;
        Ok(state.config_sets.contains_key(name))
    }

    async fn create_config(
        &self,
        base_config: &str,
        new_config: &str,
    ) -> Result<AdminResponse, SolrClientError> {
        let mut state = self.enter(SolrOperation::CreateConfig)?;
        if state.config_sets.contains_key(new_config) {
            return Ok(rejected(
                400,
                format!("ConfigSet already exists: {new_config}"),
            ));
        }
        let Some(base) = state.config_sets.get(base_config).cloned() else {
            return Ok(rejected(
                400,
                format!("Base ConfigSet does not exist: {base_config}"),
            ));
        };
        state.config_sets.insert(new_config.to_string(), base);
        Ok(AdminResponse::ok())
    }

    async fn create_collection(
        &self,
        name: &str,
        config_name: &str,
        shards: u32,
        replicas: u32,
    ) -> Result<CollectionAdminResponse, SolrClientError> {
        let mut state = self.enter(SolrOperation::CreateCollection)?;
        let failure = if state.collections.contains_key(name) {
            Some(format!("collection already exists: {name}"))
        } else if !state.config_sets.contains_key(config_name) {
            Some(format!("Can not find the specified config set: {config_name}"))
        } else if shards == 0 || replicas == 0 {
            Some("numShards and replicationFactor must be positive".to_string())
        } else {
            None
        };
        if let Some(msg) = failure {
            return Ok(CollectionAdminResponse {
                status: 400,
                success: false,
                errors: Some(json!({ "msg": msg })),
            });
        }
        state
            .collections
            .insert(name.to_string(), config_name.to_string());
        Ok(CollectionAdminResponse {
            status: 0,
            success: true,
            errors: None,
        })
    }

    async fn delete_collection(
        &self,
        name: &str,
    ) -> Result<CollectionAdminResponse, SolrClientError> {
        let mut state = self.enter(SolrOperation::DeleteCollection)?;
        if state.collections.remove(name).is_none() {
            return Ok(CollectionAdminResponse {
                status: 400,
                success: false,
                errors: Some(json!({ "msg": format!("Could not find collection : {name}") })),
            });
        }
        state.pending.remove(name);
        state.committed.remove(name);
        state.pending_deletes.remove(name);
        Ok(CollectionAdminResponse {
            status: 0,
            success: true,
            errors: None,
        })
    }

    async fn delete_config(&self, name: &str) -> Result<AdminResponse, SolrClientError> {
        let mut state = self.enter(SolrOperation::DeleteConfig)?;
        if state.collections.values().any(|config_set| config_set == name) {
            return Ok(rejected(
                400,
                format!("Can not delete ConfigSet as it is currently being used by a collection: {name}"),
            ));
        }
        if state.config_sets.remove(name).is_none() {
            return Ok(rejected(400, format!("ConfigSet does not exist to delete: {name}")));
        }
        Ok(AdminResponse::ok())
    }

    async fn list_fields(&self, table: &str) -> Result<Vec<Map<String, Value>>, SolrClientError> {
        let state = self.enter(SolrOperation::ListFields)?;
        let collection = self.collection_for(&state, table)?;
        let schema = state
            .collections
            .get(&collection)
            .and_then(|config_set| state.config_sets.get(config_set))
            .cloned()
            .unwrap_or_default();
        Ok(schema.iter().map(SchemaField::to_properties).collect())
    }

    async fn unique_key(&self, table: &str) -> Result<String, SolrClientError> {
        let state = self.enter(SolrOperation::UniqueKey)?;
        let collection = self.collection_for(&state, table)?;
        Ok(state
            .collections
            .get(&collection)
            .and_then(|config_set| state.config_sets.get(config_set))
            .map(|schema| schema.unique_key().to_string())
            .unwrap_or_else(|| FIELD_ID.to_string()))
    }

    async fn submit_schema_updates(
        &self,
        table: &str,
        updates: &[SchemaUpdate],
    ) -> Result<SchemaUpdateResponse, SolrClientError> {
        let mut state = self.enter(SolrOperation::SubmitSchemaUpdates)?;
        let collection = self.collection_for(&state, table)?;
        let Some(config_set) = state.collections.get(&collection).cloned() else {
            return Ok(rejected(404, format!("No config-set for {collection}")));
        };
        let mut schema = state.config_sets.get(&config_set).cloned().unwrap_or_default();
        // The batch is all-or-nothing.
        for update in updates {
            if let Err(msg) = apply_update(&mut schema, update) {
                return Ok(rejected(400, msg));
            }
        }
        state.config_sets.insert(config_set, schema);
        Ok(AdminResponse::ok())
    }

    async fn add_documents(
        &self,
        table: &str,
        docs: &[IndexDocument],
    ) -> Result<AdminResponse, SolrClientError> {
        let mut state = self.enter(SolrOperation::AddDocuments)?;
        let collection = self.collection_for(&state, table)?;
        let mut staged = Vec::with_capacity(docs.len());
        for doc in docs {
            match doc.id() {
                Some(id) => staged.push((id, doc.clone())),
                None => {
                    return Ok(rejected(
                        400,
                        "Document is missing mandatory uniqueKey field: id".to_string(),
                    ))
                }
            }
        }
        let pending = state.pending.entry(collection.clone()).or_default();
        for (id, doc) in staged {
            pending.insert(id, doc);
        }
        Ok(AdminResponse::ok())
    }

    async fn delete_by_ids(
        &self,
        table: &str,
        ids: &[String],
    ) -> Result<AdminResponse, SolrClientError> {
        let mut state = self.enter(SolrOperation::DeleteByIds)?;
        let collection = self.collection_for(&state, table)?;
        state
            .pending_deletes
            .entry(collection)
            .or_default()
            .extend(ids.iter().cloned());
        Ok(AdminResponse::ok())
    }

    async fn delete_by_query(
        &self,
        table: &str,
        query: &str,
    ) -> Result<AdminResponse, SolrClientError> {
        let mut state = self.enter(SolrOperation::DeleteByQuery)?;
        let collection = self.collection_for(&state, table)?;
        // Only match-all and `field:value` term queries are understood.
        let matched = match query.trim() {
            "*:*" => state
                .committed
                .get(&collection)
                .map(|docs| docs.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default(),
            term => {
                let Some((field, value)) = term.split_once(':') else {
                    return Ok(rejected(400, format!("Cannot parse '{term}'")));
                };
                state
                    .committed
                    .get(&collection)
                    .map(|docs| {
                        docs.iter()
                            .filter(|(_, doc)| match doc.field(field) {
                                Some(Value::String(s)) => s == value,
                                Some(other) => other.to_string() == value,
                                None => false,
                            })
                            .map(|(id, _)| id.clone())
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            }
        };
        state
            .pending_deletes
            .entry(collection)
            .or_default()
            .extend(matched);
        Ok(AdminResponse::ok())
    }

    async fn commit(&self, table: &str) -> Result<AdminResponse, SolrClientError> {
        let mut state = self.enter(SolrOperation::Commit)?;
        let collection = self.collection_for(&state, table)?;
        let deletes = state.pending_deletes.remove(&collection).unwrap_or_default();
        let adds = state.pending.remove(&collection).unwrap_or_default();
        let committed = state.committed.entry(collection).or_default();
        for id in deletes {
            committed.remove(&id);
        }
        committed.extend(adds);
        Ok(AdminResponse::ok())
    }

    async fn close(&self) -> Result<(), SolrClientError> {
        self.state.lock().closed = true;
        Ok(())
    }
}
