use async_trait::async_trait;
use reqwest::{header, Client, Proxy, StatusCode};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::config::Config;

/// Opaque search filter forwarded to count and listing queries unmodified.
pub type Filter = Map<String, Value>;

const OP_COUNT: &str = "SearchTotalCount";
const OP_LIST: &str = "FeaturedItemsRow";
const OP_DETAIL: &str = "CurrentItem";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{operation} timed out")]
    Timeout { operation: String },
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: String,
        status: StatusCode,
        body: String,
    },
    #[error("{operation} failed: {source}")]
    Network {
        operation: String,
        source: reqwest::Error,
    },
    #[error("{operation} returned malformed JSON: {source}")]
    Decode {
        operation: String,
        source: reqwest::Error,
    },
}

/// The upstream listing API, abstracted so the orchestrator can be driven by
/// a scripted source in tests.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn total_count(&self, filter: &Filter) -> Result<u64, TransportError>;
    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<Value>, TransportError>;
    async fn fetch_detail(&self, id: &str) -> Result<Value, TransportError>;
}

/// GraphQL persisted-query client. Stateless aside from the pooled
/// connection; cloning shares the pool, so workers clone freely.
#[derive(Clone)]
pub struct GraphqlFetcher {
    client: Client,
    endpoint: String,
    list_hash: String,
    count_hash: String,
    detail_hash: String,
}

impl GraphqlFetcher {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(header::REFERER, header::HeaderValue::from_str(&cfg.referer)?);
        headers.insert(
            "X-Requested-With",
            header::HeaderValue::from_static("XMLHttpRequest"),
        );

        let mut builder = Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .default_headers(headers)
            .timeout(cfg.request_timeout());
        if let Some(proxy) = &cfg.proxy_url {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: cfg.endpoint.clone(),
            list_hash: cfg.list_hash.clone(),
            count_hash: cfg.count_hash.clone(),
            detail_hash: cfg.detail_hash.clone(),
        })
    }

    /// One GET against the fixed endpoint: the operation name, the JSON-encoded
    /// variable bag and the persisted-query extensions travel as query
    /// parameters, the operation name again as the Apollo header.
    pub async fn request(
        &self,
        operation: &str,
        variables: Value,
        hash: &str,
    ) -> Result<Value, TransportError> {
        let extensions = json!({
            "persistedQuery": {"version": 1, "sha256Hash": hash}
        });

        let response = self
            .client
            .get(&self.endpoint)
            .header("X-APOLLO-OPERATION-NAME", operation)
            .query(&[
                ("operationName", operation.to_string()),
                ("variables", variables.to_string()),
                ("extensions", extensions.to_string()),
            ])
            .send()
            .await
            .map_err(|e| send_error(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                operation: operation.to_string(),
                status,
                body,
            });
        }

        response.json().await.map_err(|e| decode_error(operation, e))
    }
}

#[async_trait]
impl ListingSource for GraphqlFetcher {
    async fn total_count(&self, filter: &Filter) -> Result<u64, TransportError> {
        let data = self
            .request(OP_COUNT, json!({"filter": filter}), &self.count_hash)
            .await?;
        match extract_count(&data) {
            Some(count) => Ok(count),
            None => {
                // Degrade-to-empty policy: the raw body is the only way to
                // tell "genuinely zero" from "malformed" afterwards.
                warn!(response = %data, "count response missing totalCount, treating as zero");
                Ok(0)
            }
        }
    }

    async fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<Value>, TransportError> {
        let data = self
            .request(OP_LIST, json!({"limit": limit, "offset": offset}), &self.list_hash)
            .await?;
        Ok(extract_items(&data))
    }

    async fn fetch_detail(&self, id: &str) -> Result<Value, TransportError> {
        let data = self
            .request(OP_DETAIL, json!({"id": id}), &self.detail_hash)
            .await?;
        Ok(extract_item(&data))
    }
}

fn send_error(operation: &str, source: reqwest::Error) -> TransportError {
    if source.is_timeout() {
        TransportError::Timeout {
            operation: operation.to_string(),
        }
    } else {
        TransportError::Network {
            operation: operation.to_string(),
            source,
        }
    }
}

fn decode_error(operation: &str, source: reqwest::Error) -> TransportError {
    if source.is_timeout() {
        TransportError::Timeout {
            operation: operation.to_string(),
        }
    } else {
        TransportError::Decode {
            operation: operation.to_string(),
            source,
        }
    }
}

fn extract_count(data: &Value) -> Option<u64> {
    data.pointer("/data/itemsConnection/totalCount")
        .and_then(Value::as_u64)
}

fn extract_items(data: &Value) -> Vec<Value> {
    data.pointer("/data/items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn extract_item(data: &Value) -> Value {
    data.pointer("/data/item")
        .cloned()
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({}))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn count_reads_nested_total() {
        let data = json!({"data": {"itemsConnection": {"totalCount": 4213}}});
        assert_eq!(extract_count(&data), Some(4213));
    }

    #[test]
    fn malformed_count_degrades_to_none() {
        assert_eq!(extract_count(&json!({})), None);
        assert_eq!(extract_count(&json!({"data": null})), None);
        assert_eq!(
            extract_count(&json!({"data": {"itemsConnection": {"totalCount": "many"}}})),
            None
        );
    }

    #[test]
    fn missing_items_array_is_empty_page() {
        assert!(extract_items(&json!({})).is_empty());
        assert!(extract_items(&json!({"data": {"items": null}})).is_empty());

        let data = json!({"data": {"items": [{"id": "1"}, {"id": "2"}]}});
        assert_eq!(extract_items(&data).len(), 2);
    }

    #[test]
    fn missing_item_object_is_empty_record() {
        assert_eq!(extract_item(&json!({})), json!({}));
        assert_eq!(extract_item(&json!({"data": {"item": null}})), json!({}));
        assert_eq!(
            extract_item(&json!({"data": {"item": {"address": "Nizami küç. 5"}}})),
            json!({"address": "Nizami küç. 5"})
        );
    }
}
