use std::time::Duration;

use recordindex_cache::CacheConfig;
use recordindex_config::{helpers, load_from_path, ConfigError, Configurable};
use recordindex_error::RecordIndexError;
use recordindex_types::NamingPolicy;
use serde::{Deserialize, Serialize};

use crate::client::{SolrAuthMethod, SolrClientError, SolrHttpClient, SolrHttpClientOptions};

pub const DEFAULT_CONFIG_PATH: &str = "./indexer_config.yaml";
pub const CONFIG_PATH_ENV_VAR: &str = "RECORDINDEX_CONFIG_PATH";
const ENV_PREFIX: &str = "RECORDINDEX_";

fn default_config_set() -> String {
    "_default".to_string()
}

fn default_shards() -> u32 {
    1
}

fn default_replicas() -> u32 {
    1
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// # Description
/// Service-wide settings of the indexer: where the cluster is, which
/// config-set new tables are cloned from and the default topology. Read from
/// a YAML file, and secondarily from environment variables prefixed with
/// `RECORDINDEX_`, which take precedence. Nested keys are separated by `__`.
pub struct IndexerConfig {
    pub solr_server_url: String,
    #[serde(default = "default_config_set")]
    pub config_set: String,
    #[serde(default = "default_shards")]
    pub shards: u32,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default)]
    pub tenant_domain: Option<String>,
    #[serde(
        rename = "request_timeout_ms",
        default = "default_request_timeout",
        deserialize_with = "helpers::deserialize_duration_from_millis",
        serialize_with = "helpers::serialize_duration_to_millis"
    )]
    pub request_timeout: Duration,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub schema_cache: CacheConfig,
}

impl IndexerConfig {
    /// A configuration with every optional setting at its default.
    pub fn new(solr_server_url: impl Into<String>) -> Self {
        IndexerConfig {
            solr_server_url: solr_server_url.into(),
            config_set: default_config_set(),
            shards: default_shards(),
            replicas: default_replicas(),
            tenant_domain: None,
            request_timeout: default_request_timeout(),
            auth_token: None,
            schema_cache: CacheConfig::default(),
        }
    }

    /// # Description
    /// Load the config from the path named by `RECORDINDEX_CONFIG_PATH`, or
    /// from `./indexer_config.yaml` when it is unset.
    /// # Errors
    /// - If the config file cannot be found or read.
    /// - If the config file or the environment hold malformed values.
    /// - If the result does not pass [`IndexerConfig::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        let config: IndexerConfig = load_from_path(path, ENV_PREFIX)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.solr_server_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "solr_server_url cannot be empty".to_string(),
            ));
        }
        if self.config_set.trim().is_empty() {
            return Err(ConfigError::Invalid("config_set cannot be empty".to_string()));
        }
        if self.shards == 0 {
            return Err(ConfigError::Invalid(
                "shards must be greater than 0".to_string(),
            ));
        }
        if self.replicas == 0 {
            return Err(ConfigError::Invalid(
                "replicas must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn naming_policy(&self) -> NamingPolicy {
        self.tenant_domain
            .as_deref()
            .map(NamingPolicy::new)
            .unwrap_or_default()
    }

    pub fn client_options(&self) -> Result<SolrHttpClientOptions, SolrClientError> {
        let mut options = SolrHttpClientOptions::with_endpoint(&self.solr_server_url)?;
        options.request_timeout = self.request_timeout;
        if let Some(token) = &self.auth_token {
            options.auth_method = SolrAuthMethod::bearer_token(token)?;
        }
        Ok(options)
    }
}

impl Configurable<IndexerConfig> for SolrHttpClient {
    fn try_from_config(config: &IndexerConfig) -> Result<Self, Box<dyn RecordIndexError>> {
        let options = config.client_options().map_err(|err| err.boxed())?;
        SolrHttpClient::new(options).map_err(|err| err.boxed())
    }
}
