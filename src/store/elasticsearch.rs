use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::{json, Value};
use tracing::{debug, error};

use super::{DocumentStore, StoredDocument};
use crate::{metrics, GatewayError, Result};

/// [`DocumentStore`] backed by the Elasticsearch REST API.
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: Client,
    base_url: Url,
}

impl ElasticsearchStore {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            GatewayError::Config(format!("Invalid Elasticsearch URL '{}': {}", base_url, e))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Config(format!(
                "Elasticsearch URL '{}' cannot be used as a base",
                base_url
            )));
        }

        Ok(Self { client, base_url })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response> {
        metrics::record_store_operation(operation);
        request.send().await.map_err(|e| {
            metrics::record_store_failure(operation);
            error!("Store {} failed: {}", operation, e);
            GatewayError::from(e)
        })
    }

    async fn upstream_error(operation: &'static str, response: Response) -> GatewayError {
        metrics::record_store_failure(operation);
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("Store {} returned {}: {}", operation, status, body);
        GatewayError::Upstream(format!("{} returned {}: {}", operation, status, body))
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>> {
        let url = self.endpoint(&[index, "_doc", id]);
        debug!("GET {}", url);

        let response = self.send("get", self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::upstream_error("get", response).await);
        }

        let body: Value = response.json().await?;
        if body.get("found").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }
        Ok(body.get("_source").cloned())
    }

    async fn list(&self, index: &str, limit: usize) -> Result<Vec<StoredDocument>> {
        let url = self.endpoint(&[index, "_search"]);
        debug!("POST {}", url);

        let body = json!({
            "size": limit,
            "query": { "match_all": {} }
        });
        let response = self.send("list", self.client.post(url).json(&body)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Self::upstream_error("list", response).await);
        }

        let body: Value = response.json().await?;
        let hits = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                GatewayError::MalformedResponse(format!("search on {} returned no hits array", index))
            })?;

        hits.iter()
            .map(|hit| {
                let id = hit.get("_id").and_then(Value::as_str).ok_or_else(|| {
                    GatewayError::MalformedResponse("hit without _id".to_string())
                })?;
                Ok(StoredDocument {
                    id: id.to_string(),
                    source: hit.get("_source").cloned().unwrap_or(Value::Null),
                })
            })
            .collect()
    }

    async fn put(&self, index: &str, id: &str, document: &Value) -> Result<()> {
        let url = self.endpoint(&[index, "_doc", id]);
        debug!("PUT {}", url);

        let response = self.send("put", self.client.put(url).json(document)).await?;
        if !response.status().is_success() {
            return Err(Self::upstream_error("put", response).await);
        }
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let url = self.endpoint(&[index]);
        debug!("HEAD {}", url);

        let response = self.send("exists", self.client.head(url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(Self::upstream_error("exists", response).await),
        }
    }

    async fn search(&self, indices: &[String], body: &Value) -> Result<Value> {
        let joined = indices.join(",");
        let mut url = self.endpoint(&[joined.as_str(), "_search"]);
        url.query_pairs_mut().append_pair("ignore_unavailable", "true");
        debug!("POST {} body={}", url, body);

        let response = self.send("search", self.client.post(url).json(body)).await?;
        if !response.status().is_success() {
            return Err(Self::upstream_error("search", response).await);
        }
        Ok(response.json().await?)
    }
}
