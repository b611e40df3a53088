use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use recordindex_types::IndexDocument;
use reqwest::header::{HeaderValue, CONTENT_TYPE, USER_AGENT as USER_AGENT_HEADER};
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::client::{
    AdminResponse, CollectionAdminResponse, SchemaUpdate, SchemaUpdateResponse, SolrAdmin,
    SolrClientError, SolrHttpClientOptions,
};

const USER_AGENT: &str = concat!("recordindex v", env!("CARGO_PKG_VERSION"));

const COLLECTIONS_PATH: &[&str] = &["admin", "collections"];
const CONFIGS_PATH: &[&str] = &["admin", "configs"];

/// Talks to a Solr cluster over its HTTP APIs: Collections and ConfigSets for
/// provisioning, the Schema API for field management and the JSON update
/// handler for documents.
///
/// Cloning is cheap and clones share the connection pool and the closed flag.
#[derive(Debug, Clone)]
pub struct SolrHttpClient {
    base_url: reqwest::Url,
    client: reqwest::Client,
    closed: Arc<AtomicBool>,
}

impl SolrHttpClient {
    pub fn new(options: SolrHttpClientOptions) -> Result<Self, SolrClientError> {
        let mut headers = options.headers();
        headers.insert(USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.request_timeout)
            .build()?;

        Ok(SolrHttpClient {
            base_url: options.endpoint,
            client,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The URL of `segments` below the endpoint. Every segment is
    /// percent-encoded on its own, `/` included, so a segment can never
    /// escape into another path, the query or another host.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, SolrClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SolrClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// The URL of a handler of the collection serving `table`.
    fn table_url(&self, table: &str, handler: &[&str]) -> Result<reqwest::Url, SolrClientError> {
        if matches!(table.trim(), "" | "." | "..") {
            return Err(SolrClientError::InvalidUrl(format!(
                "'{table}' is not a collection name"
            )));
        }
        let mut segments = Vec::with_capacity(handler.len() + 1);
        segments.push(table);
        segments.extend_from_slice(handler);
        self.url(&segments)
    }

    async fn list_names(
        &self,
        path: &[&str],
        attribute: &str,
    ) -> Result<Vec<String>, SolrClientError> {
        let json = self
            .send(Method::GET, self.url(path)?, &[("action", "LIST")], None)
            .await?;
        admin_response(&json).into_result()?;
        let names = json
            .get(attribute)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SolrClientError::UnexpectedResponse(format!(
                    "missing '{attribute}' in {}",
                    path.join("/")
                ))
            })?;
        Ok(names
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    async fn post_update(
        &self,
        table: &str,
        body: String,
    ) -> Result<AdminResponse, SolrClientError> {
        let json = self
            .send(
                Method::POST,
                self.table_url(table, &["update"])?,
                &[] as &[(&str, &str)],
                Some(body),
            )
            .await?;
        Ok(admin_response(&json))
    }

    /// Sends one request and returns the decoded JSON body.
    ///
    /// Solr reports most failures with a non-2xx status and a JSON envelope
    /// (`responseHeader.status` plus an `error` object); those become
    /// [`SolrClientError::Api`]. Anything else that fails is a transport or
    /// decoding error.
    pub(crate) async fn send<QueryParams: Serialize + ?Sized>(
        &self,
        method: Method,
        url: reqwest::Url,
        query_params: &QueryParams,
        body: Option<String>,
    ) -> Result<Value, SolrClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SolrClientError::Closed);
        }

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .query(&[("wt", "json")])
            .query(query_params);
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body);
        }

        tracing::trace!(url = %url, method =? method, "Sending request");

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return match serde_json::from_str::<Value>(&text) {
                Ok(json) => {
                    let parsed = admin_response(&json);
                    tracing::trace!(
                        url = %url,
                        method =? method,
                        "Received error response: {}",
                        json
                    );
                    Err(SolrClientError::Api {
                        status: if parsed.status != 0 {
                            parsed.status
                        } else {
                            status.as_u16() as i32
                        },
                        errors: parsed.errors.unwrap_or(json),
                    })
                }
                Err(_) => {
                    tracing::trace!(
                        url = %url,
                        method =? method,
                        "Received non-JSON error response: {}",
                        text
                    );
                    Err(SolrClientError::Api {
                        status: status.as_u16() as i32,
                        errors: Value::String(format!("Non-JSON error response: {text}")),
                    })
                }
            };
        }

        let json = serde_json::from_str::<Value>(&text)?;

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                url = %url,
                method =? method,
                "Received response: {}",
                serde_json::to_string_pretty(&json)
                    .unwrap_or_else(|_| "<failed to serialize>".to_string())
            );
        }

        Ok(json)
    }
}

#[async_trait]
impl SolrAdmin for SolrHttpClient {
    async fn collection_exists(&self, name: &str) -> Result<bool, SolrClientError> {
        let collections = self.list_names(COLLECTIONS_PATH, "collections").await?;
        Ok(collections.iter().any(|collection| collection == name))
    }

    async fn config_exists(&self, name: &str) -> Result<bool, SolrClientError> {
        let config_sets = self.list_names(CONFIGS_PATH, "configSets").await?;
        Ok(config_sets.iter().any(|config_set| config_set == name))
    }

    async fn create_config(
        &self,
        base_config: &str,
        new_config: &str,
    ) -> Result<AdminResponse, SolrClientError> {
        let json = self
            .send(
                Method::GET,
                self.url(CONFIGS_PATH)?,
                &[
                    ("action", "CREATE"),
                    ("name", new_config),
                    ("baseConfigSet", base_config),
                ],
                None,
            )
            .await?;
        Ok(admin_response(&json))
    }

    async fn create_collection(
        &self,
        name: &str,
        config_name: &str,
        shards: u32,
        replicas: u32,
    ) -> Result<CollectionAdminResponse, SolrClientError> {
        let shards = shards.to_string();
        let replicas = replicas.to_string();
        let json = self
            .send(
                Method::GET,
                self.url(COLLECTIONS_PATH)?,
                &[
                    ("action", "CREATE"),
                    ("name", name),
                    ("collection.configName", config_name),
                    ("numShards", shards.as_str()),
                    ("replicationFactor", replicas.as_str()),
                    ("maxShardsPerNode", shards.as_str()),
                ],
                None,
            )
            .await?;
        Ok(collection_admin_response(&json))
    }

    async fn delete_collection(
        &self,
        name: &str,
    ) -> Result<CollectionAdminResponse, SolrClientError> {
        let json = self
            .send(
                Method::GET,
                self.url(COLLECTIONS_PATH)?,
                &[("action", "DELETE"), ("name", name)],
                None,
            )
            .await?;
        Ok(collection_admin_response(&json))
    }

    async fn delete_config(&self, name: &str) -> Result<AdminResponse, SolrClientError> {
        let json = self
            .send(
                Method::GET,
                self.url(CONFIGS_PATH)?,
                &[("action", "DELETE"), ("name", name)],
                None,
            )
            .await?;
        Ok(admin_response(&json))
    }

    async fn list_fields(&self, table: &str) -> Result<Vec<Map<String, Value>>, SolrClientError> {
        let json = self
            .send(
                Method::GET,
                self.table_url(table, &["schema", "fields"])?,
                &[] as &[(&str, &str)],
                None,
            )
            .await?;
        admin_response(&json).into_result()?;
        let fields = json
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SolrClientError::UnexpectedResponse(format!("missing 'fields' for {table}"))
            })?;
        fields
            .iter()
            .map(|field| {
                field.as_object().cloned().ok_or_else(|| {
                    SolrClientError::UnexpectedResponse(format!(
                        "field of {table} is not an object: {field}"
                    ))
                })
            })
            .collect()
    }

    async fn unique_key(&self, table: &str) -> Result<String, SolrClientError> {
        let json = self
            .send(
                Method::GET,
                self.table_url(table, &["schema", "uniquekey"])?,
                &[] as &[(&str, &str)],
                None,
            )
            .await?;
        admin_response(&json).into_result()?;
        json.get("uniqueKey")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                SolrClientError::UnexpectedResponse(format!("missing 'uniqueKey' for {table}"))
            })
    }

    async fn submit_schema_updates(
        &self,
        table: &str,
        updates: &[SchemaUpdate],
    ) -> Result<SchemaUpdateResponse, SolrClientError> {
        let body = schema_update_body(updates)?;
        let json = self
            .send(
                Method::POST,
                self.table_url(table, &["schema"])?,
                &[] as &[(&str, &str)],
                Some(body),
            )
            .await?;
        Ok(admin_response(&json))
    }

    async fn add_documents(
        &self,
        table: &str,
        docs: &[IndexDocument],
    ) -> Result<AdminResponse, SolrClientError> {
        let body = serde_json::to_string(docs)?;
        self.post_update(table, body).await
    }

    async fn delete_by_ids(
        &self,
        table: &str,
        ids: &[String],
    ) -> Result<AdminResponse, SolrClientError> {
        let body = serde_json::to_string(&json!({ "delete": ids }))?;
        self.post_update(table, body).await
    }

    async fn delete_by_query(
        &self,
        table: &str,
        query: &str,
    ) -> Result<AdminResponse, SolrClientError> {
        let body = serde_json::to_string(&json!({ "delete": { "query": query } }))?;
        self.post_update(table, body).await
    }

    async fn commit(&self, table: &str) -> Result<AdminResponse, SolrClientError> {
        let body = serde_json::to_string(&json!({ "commit": {} }))?;
        self.post_update(table, body).await
    }

    async fn close(&self) -> Result<(), SolrClientError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Builds a Schema API multi-update body. Solr takes repeated command keys in
/// one object and applies them in order, which a JSON map cannot express, so
/// the object is assembled by hand.
pub(crate) fn schema_update_body(updates: &[SchemaUpdate]) -> Result<String, SolrClientError> {
    let commands = updates
        .iter()
        .map(|update| {
            Ok(format!(
                "{}:{}",
                serde_json::to_string(update.command())?,
                serde_json::to_string(&update.payload())?
            ))
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;
    Ok(format!("{{{}}}", commands.join(",")))
}

fn response_status(json: &Value) -> i32 {
    json.pointer("/responseHeader/status")
        .and_then(Value::as_i64)
        .unwrap_or_default() as i32
}

fn response_errors(json: &Value) -> Option<Value> {
    ["errors", "error", "failure", "exception"]
        .iter()
        .filter_map(|key| json.get(*key))
        .find(|value| !value.is_null())
        .cloned()
}

fn admin_response(json: &Value) -> AdminResponse {
    AdminResponse {
        status: response_status(json),
        errors: response_errors(json),
    }
}

fn collection_admin_response(json: &Value) -> CollectionAdminResponse {
    let AdminResponse { status, errors } = admin_response(json);
    CollectionAdminResponse {
        status,
        success: json.get("success").is_some() || (status == 0 && errors.is_none()),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;
    use recordindex_types::{FieldType, SchemaField};

    fn client_for(server: &MockServer) -> SolrHttpClient {
        let options = SolrHttpClientOptions::with_endpoint(&server.url("/solr")).unwrap();
        SolrHttpClient::new(options).unwrap()
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_collection_exists_reads_collection_list() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/solr/admin/collections")
                    .query_param("action", "LIST");
                then.status(200).body(
                    r#"{"responseHeader":{"status":0,"QTime":1},"collections":["DEFAULT_orders"]}"#,
                );
            })
            .await;

        let client = client_for(&server);
        assert!(client.collection_exists("DEFAULT_orders").await.unwrap());
        assert!(!client.collection_exists("DEFAULT_items").await.unwrap());
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_config_exists_reads_config_set_list() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/solr/admin/configs")
                    .query_param("action", "LIST");
                then.status(200).body(
                    r#"{"responseHeader":{"status":0},"configSets":["_default","DEFAULT_orders"]}"#,
                );
            })
            .await;

        let client = client_for(&server);
        assert!(client.config_exists("_default").await.unwrap());
        assert!(!client.config_exists("DEFAULT_items").await.unwrap());
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_list_with_error_payload_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/solr/admin/collections");
                then.status(200).body(
                    r#"{"responseHeader":{"status":0},"collections":[],"errors":["zk unavailable"]}"#,
                );
            })
            .await;

        let err = client_for(&server)
            .collection_exists("DEFAULT_orders")
            .await
            .unwrap_err();
        assert!(matches!(err, SolrClientError::Api { status: 0, .. }));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_create_collection_sends_topology() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/solr/admin/collections")
                    .query_param("action", "CREATE")
                    .query_param("name", "DEFAULT_orders")
                    .query_param("collection.configName", "DEFAULT_orders")
                    .query_param("numShards", "2")
                    .query_param("replicationFactor", "1")
                    .query_param("maxShardsPerNode", "2");
                then.status(200).body(
                    r#"{"responseHeader":{"status":0},"success":{"node1:8983_solr":{"responseHeader":{"status":0}}}}"#,
                );
            })
            .await;

        let response = client_for(&server)
            .create_collection("DEFAULT_orders", "DEFAULT_orders", 2, 1)
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_create_config_clones_base() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/solr/admin/configs")
                    .query_param("action", "CREATE")
                    .query_param("name", "DEFAULT_orders")
                    .query_param("baseConfigSet", "_default");
                then.status(200)
                    .body(r#"{"responseHeader":{"status":0,"QTime":120}}"#);
            })
            .await;

        let response = client_for(&server)
            .create_config("_default", "DEFAULT_orders")
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_error_envelope_is_parsed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/solr/admin/configs");
                then.status(400).body(
                    r#"{"responseHeader":{"status":400,"QTime":2},"error":{"msg":"ConfigSet already exists: DEFAULT_orders","code":400}}"#,
                );
            })
            .await;

        let err = client_for(&server)
            .create_config("_default", "DEFAULT_orders")
            .await
            .unwrap_err();
        match err {
            SolrClientError::Api { status, errors } => {
                assert_eq!(status, 400);
                assert_eq!(errors["msg"], "ConfigSet already exists: DEFAULT_orders");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_non_json_error_keeps_http_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/solr/orders/schema/uniquekey");
                then.status(502).body("Bad Gateway");
            })
            .await;

        let err = client_for(&server).unique_key("orders").await.unwrap_err();
        assert_eq!(err.status(), Some(502));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_schema_introspection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/solr/orders/schema/fields");
                then.status(200).body(
                    r#"{"responseHeader":{"status":0},"fields":[
                        {"name":"_version_","type":"plong","indexed":false,"stored":false},
                        {"name":"id","type":"string","multiValued":false,"indexed":true,"required":true,"stored":true}
                    ]}"#,
                );
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/solr/orders/schema/uniquekey");
                then.status(200)
                    .body(r#"{"responseHeader":{"status":0},"uniqueKey":"id"}"#);
            })
            .await;

        let client = client_for(&server);
        let fields = client.list_fields("orders").await.unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1]["required"], true);
        assert_eq!(client.unique_key("orders").await.unwrap(), "id");
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_submit_schema_updates_posts_to_table() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST").path("/solr/orders/schema");
                then.status(200).body(r#"{"responseHeader":{"status":0,"QTime":40}}"#);
            })
            .await;

        let response = client_for(&server)
            .submit_schema_updates(
                "orders",
                &[SchemaUpdate::AddField(SchemaField::new(
                    "total",
                    FieldType::Double,
                ))],
            )
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn test_schema_update_body_keeps_command_order() {
        let body = schema_update_body(&[
            SchemaUpdate::DeleteField("stale".to_string()),
            SchemaUpdate::AddField(SchemaField::new("fresh", FieldType::Long)),
            SchemaUpdate::ReplaceField(SchemaField::new("kept", FieldType::Int)),
            SchemaUpdate::DeleteField("gone".to_string()),
        ])
        .unwrap();

        let delete_stale = body.find(r#""delete-field":{"name":"stale"}"#).unwrap();
        let add_fresh = body.find(r#""add-field":"#).unwrap();
        let replace_kept = body.find(r#""replace-field":"#).unwrap();
        let delete_gone = body.find(r#""delete-field":{"name":"gone"}"#).unwrap();
        assert!(delete_stale < add_fresh);
        assert!(add_fresh < replace_kept);
        assert!(replace_kept < delete_gone);
        assert!(body.starts_with('{') && body.ends_with('}'));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_documents_go_through_update_handler() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST").path("/solr/orders/update");
                then.status(200).body(r#"{"responseHeader":{"status":0,"QTime":3}}"#);
            })
            .await;

        let client = client_for(&server);
        let docs = vec![IndexDocument::new().with_field("id", "1")];
        assert!(client.add_documents("orders", &docs).await.unwrap().is_success());
        assert!(client
            .delete_by_ids("orders", &["1".to_string()])
            .await
            .unwrap()
            .is_success());
        assert!(client
            .delete_by_query("orders", "*:*")
            .await
            .unwrap()
            .is_success());
        assert!(client.commit("orders").await.unwrap().is_success());
        assert_eq!(mock.calls(), 4);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_table_name_stays_one_path_segment() {
        let server = MockServer::start_async().await;
        let delete = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/solr/admin/collections")
                    .query_param("action", "DELETE");
                then.status(200).body(r#"{"responseHeader":{"status":0},"success":{}}"#);
            })
            .await;

        let client = client_for(&server);
        let table = "admin/collections?action=DELETE&name=DEFAULT_orders#";
        assert!(client.list_fields(table).await.is_err());
        assert!(client.unique_key(table).await.is_err());
        assert_eq!(delete.calls(), 0);

        let url = client.table_url(table, &["schema", "fields"]).unwrap();
        assert_eq!(
            url.path(),
            "/solr/admin%2Fcollections%3Faction=DELETE&name=DEFAULT_orders%23/schema/fields"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.host_str(), client.base_url.host_str());

        let url = client.table_url("http://elsewhere/solr", &["update"]).unwrap();
        assert_eq!(url.host_str(), client.base_url.host_str());

        for table in ["", " ", ".", ".."] {
            assert!(matches!(
                client.list_fields(table).await,
                Err(SolrClientError::InvalidUrl(_))
            ));
        }
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_closed_client_refuses_requests() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET").path("/solr/admin/collections");
                then.status(200)
                    .body(r#"{"responseHeader":{"status":0},"collections":[]}"#);
            })
            .await;

        let client = client_for(&server);
        client.close().await.unwrap();
        assert!(matches!(
            client.collection_exists("DEFAULT_orders").await,
            Err(SolrClientError::Closed)
        ));
        assert_eq!(mock.calls(), 0);
    }
}
