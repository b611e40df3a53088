use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, AUTHORIZATION};

use crate::client::SolrClientError;

const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:8983/solr/";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub enum SolrAuthMethod {
    None,
    HeaderAuth {
        header: HeaderName,
        value: HeaderValue,
    },
}

impl SolrAuthMethod {
    pub fn bearer_token(token: &str) -> Result<Self, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        value.set_sensitive(true);

        Ok(SolrAuthMethod::HeaderAuth {
            header: AUTHORIZATION,
            value,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SolrHttpClientOptions {
    /// Base URL of the Solr web application, e.g. `http://host:8983/solr/`.
    pub endpoint: reqwest::Url,
    pub auth_method: SolrAuthMethod,
    pub request_timeout: Duration,
}

impl Default for SolrHttpClientOptions {
    fn default() -> Self {
        SolrHttpClientOptions {
            endpoint: DEFAULT_LOCAL_ENDPOINT.parse().expect("valid URL"),
            auth_method: SolrAuthMethod::None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SolrHttpClientOptions {
    /// Parses `endpoint`. A trailing `/` is added when missing so that
    /// relative API paths resolve underneath it instead of replacing its last
    /// segment.
    pub fn with_endpoint(endpoint: &str) -> Result<Self, SolrClientError> {
        let endpoint = endpoint.trim();
        let endpoint = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{endpoint}/")
        };
        let endpoint = endpoint
            .parse::<reqwest::Url>()
            .map_err(|err| SolrClientError::InvalidUrl(format!("{endpoint}: {err}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(SolrClientError::InvalidUrl(endpoint.to_string()));
        }
        Ok(SolrHttpClientOptions {
            endpoint,
            ..Default::default()
        })
    }

    pub(crate) fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let SolrAuthMethod::HeaderAuth { header, value } = &self.auth_method {
            headers.insert(header.clone(), value.clone());
        }
        headers
    }
}
