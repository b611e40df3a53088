use async_trait::async_trait;
use recordindex_error::{ErrorCodes, RecordIndexError};
use recordindex_types::{IndexDocument, SchemaField};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised by a [`SolrAdmin`] implementation.
#[derive(Error, Debug)]
pub enum SolrClientError {
    /// Network-level HTTP request failed.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    /// Solr answered with a non-zero status or an error payload.
    #[error("Solr returned status {status}, errors: {errors}")]
    Api { status: i32, errors: Value },
    #[error("Serialization/Deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The response parsed but did not carry what the request asks for.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("Invalid Solr URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("The Solr client has been closed")]
    Closed,
}

impl SolrClientError {
    pub fn status(&self) -> Option<i32> {
        match self {
            SolrClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl RecordIndexError for SolrClientError {
    fn code(&self) -> ErrorCodes {
        match self {
            SolrClientError::Request(_) => ErrorCodes::Unavailable,
            SolrClientError::Api { status, .. } => match u16::try_from(*status)
                .ok()
                .and_then(|status| reqwest::StatusCode::from_u16(status).ok())
                .map(ErrorCodes::from)
            {
                Some(ErrorCodes::Success) | Some(ErrorCodes::Unknown) | None => {
                    ErrorCodes::Internal
                }
                Some(code) => code,
            },
            SolrClientError::Serde(_) => ErrorCodes::Internal,
            SolrClientError::UnexpectedResponse(_) => ErrorCodes::Internal,
            SolrClientError::InvalidUrl(_) | SolrClientError::InvalidHeader(_) => {
                ErrorCodes::InvalidArgument
            }
            SolrClientError::Closed => ErrorCodes::FailedPrecondition,
        }
    }
}

/// `responseHeader.status` plus whatever error payload came with it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdminResponse {
    pub status: i32,
    pub errors: Option<Value>,
}

impl AdminResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_success(&self) -> bool {
        self.status == 0 && self.errors.is_none()
    }

    /// Turns a non-successful response into [`SolrClientError::Api`].
    pub fn into_result(self) -> Result<Self, SolrClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SolrClientError::Api {
                status: self.status,
                errors: self.errors.unwrap_or(Value::Null),
            })
        }
    }
}

/// Collections API responses also say whether the cluster reported success
/// for every node involved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectionAdminResponse {
    pub status: i32,
    pub success: bool,
    pub errors: Option<Value>,
}

impl CollectionAdminResponse {
    pub fn is_success(&self) -> bool {
        self.success && self.status == 0 && self.errors.is_none()
    }

    pub fn into_result(self) -> Result<Self, SolrClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SolrClientError::Api {
                status: self.status,
                errors: self.errors.unwrap_or(Value::Null),
            })
        }
    }
}

pub type SchemaUpdateResponse = AdminResponse;

/// One command of a Schema API multi-update.
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaUpdate {
    AddField(SchemaField),
    ReplaceField(SchemaField),
    DeleteField(String),
}

impl SchemaUpdate {
    /// The Schema API command name.
    pub fn command(&self) -> &'static str {
        match self {
            SchemaUpdate::AddField(_) => "add-field",
            SchemaUpdate::ReplaceField(_) => "replace-field",
            SchemaUpdate::DeleteField(_) => "delete-field",
        }
    }

    pub fn field_name(&self) -> &str {
        match self {
            SchemaUpdate::AddField(field) | SchemaUpdate::ReplaceField(field) => field.name(),
            SchemaUpdate::DeleteField(name) => name,
        }
    }

    /// The command's argument object.
    pub fn payload(&self) -> Value {
        match self {
            SchemaUpdate::AddField(field) | SchemaUpdate::ReplaceField(field) => {
                Value::Object(field.to_properties())
            }
            SchemaUpdate::DeleteField(name) => {
                let mut payload = Map::new();
                payload.insert("name".to_string(), Value::String(name.clone()));
                Value::Object(payload)
            }
        }
    }
}

/// Administrative access to a Solr cluster.
///
/// Collection and config-set calls take physical (qualified) names. Schema and
/// document calls take the table name as given and leave any tenant
/// resolution to the cluster side.
#[async_trait]
pub trait SolrAdmin: Send + Sync + std::fmt::Debug {
    async fn collection_exists(&self, name: &str) -> Result<bool, SolrClientError>;

    async fn config_exists(&self, name: &str) -> Result<bool, SolrClientError>;

    async fn create_config(
        &self,
        base_config: &str,
        new_config: &str,
    ) -> Result<AdminResponse, SolrClientError>;

    async fn create_collection(
        &self,
        name: &str,
        config_name: &str,
        shards: u32,
        replicas: u32,
    ) -> Result<CollectionAdminResponse, SolrClientError>;

    async fn delete_collection(&self, name: &str)
        -> Result<CollectionAdminResponse, SolrClientError>;

    async fn delete_config(&self, name: &str) -> Result<AdminResponse, SolrClientError>;

    /// One property object per field, as the Schema API reports them.
    async fn list_fields(&self, table: &str) -> Result<Vec<Map<String, Value>>, SolrClientError>;

    async fn unique_key(&self, table: &str) -> Result<String, SolrClientError>;

    /// Applies all `updates` as a single multi-update request.
    async fn submit_schema_updates(
        &self,
        table: &str,
        updates: &[SchemaUpdate],
    ) -> Result<SchemaUpdateResponse, SolrClientError>;

    async fn add_documents(
        &self,
        table: &str,
        docs: &[IndexDocument],
    ) -> Result<AdminResponse, SolrClientError>;

    async fn delete_by_ids(
        &self,
        table: &str,
        ids: &[String],
    ) -> Result<AdminResponse, SolrClientError>;

    async fn delete_by_query(
        &self,
        table: &str,
        query: &str,
    ) -> Result<AdminResponse, SolrClientError>;

    async fn commit(&self, table: &str) -> Result<AdminResponse, SolrClientError>;

    /// Releases the connection. Calls made afterwards fail with
    /// [`SolrClientError::Closed`].
    async fn close(&self) -> Result<(), SolrClientError>;
}
