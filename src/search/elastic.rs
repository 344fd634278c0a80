//! Elasticsearch over its REST API.

use super::{BulkFailure, Hit, SearchBackend, SearchDocument, SearchError, SearchQuery, SearchResults};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;

const ALREADY_EXISTS: &str = "resource_already_exists_exception";

pub struct ElasticBackend {
    client: Client,
    base: String,
}

#[derive(Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: String,
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    total: Total,
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct Total {
    value: u64,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: SearchDocument,
}

#[derive(Deserialize)]
struct CatIndex {
    index: String,
}

impl ElasticBackend {
    /// Client for the engine at `address`. A bare `host:port` gets `http://`.
    pub fn new(address: &str, timeout: Duration) -> Result<Self, SearchError> {
        let base = if address.contains("://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", address.trim_end_matches('/'))
        };
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Turn a non-success response into [`SearchError::Status`].
    async fn check(response: Response) -> Result<Response, SearchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(SearchError::NotFound(body));
        }
        Err(SearchError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// `_bulk` request body: one action line and one source line per document.
fn bulk_body(docs: &[SearchDocument]) -> Result<String, SearchError> {
    let mut body = String::new();
    for doc in docs {
        body.push_str(&serde_json::to_string(&json!({"index": {"_id": doc.id}}))?);
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

fn bulk_failures(response: BulkResponse) -> Vec<BulkFailure> {
    if !response.errors {
        return Vec::new();
    }
    response
        .items
        .into_iter()
        .flat_map(|item| item.into_values())
        .filter(|item| item.status >= 300)
        .map(|item| BulkFailure {
            reason: item
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("status {}", item.status)),
            id: item.id,
        })
        .collect()
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    fn name(&self) -> &str {
        &self.base
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> Result<(), SearchError> {
        let response = self
            .client
            .put(self.url(index))
            .json(&json!({"mappings": mapping}))
            .send()
            .await?;
        match Self::check(response).await {
            Err(SearchError::Status { status: 400, body }) if body.contains(ALREADY_EXISTS) => {
                Err(SearchError::IndexExists(index.to_string()))
            }
            other => other.map(|_| ()),
        }
    }

    async fn bulk_index(&self, index: &str, docs: &[SearchDocument]) -> Result<Vec<BulkFailure>, SearchError> {
        let response = self
            .client
            .post(self.url(&format!("{index}/_bulk")))
            .header("content-type", "application/x-ndjson")
            .body(bulk_body(docs)?)
            .send()
            .await?;
        let parsed: BulkResponse = Self::check(response).await?.json().await?;
        Ok(bulk_failures(parsed))
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<(), SearchError> {
        let response = self.client.delete(self.url(&format!("{index}/_doc/{id}"))).send().await?;
        Self::check(response).await.map(|_| ())
    }

    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>, SearchError> {
        let response = self.client.get(self.url(&format!("_alias/{alias}"))).send().await?;
        match Self::check(response).await {
            Ok(response) => {
                let body: HashMap<String, Value> = response.json().await?;
                Ok(body.into_keys().collect())
            }
            Err(SearchError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn swap_alias(&self, alias: &str, index: &str) -> Result<(), SearchError> {
        let mut actions: Vec<Value> = self
            .alias_targets(alias)
            .await?
            .into_iter()
            .map(|old| json!({"remove": {"index": old, "alias": alias}}))
            .collect();
        actions.push(json!({"add": {"index": index, "alias": alias}}));

        let response = self
            .client
            .post(self.url("_aliases"))
            .json(&json!({"actions": actions}))
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }

    async fn list_indices(&self, prefix: &str) -> Result<Vec<String>, SearchError> {
        let response = self
            .client
            .get(self.url(&format!("_cat/indices/{prefix}*")))
            .query(&[("format", "json"), ("h", "index")])
            .send()
            .await?;
        let rows: Vec<CatIndex> = Self::check(response).await?.json().await?;
        Ok(rows.into_iter().map(|r| r.index).collect())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchError> {
        let response = self.client.delete(self.url(index)).send().await?;
        Self::check(response).await.map(|_| ())
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResults, SearchError> {
        let response = self
            .client
            .post(self.url(&format!("{index}/_search")))
            .json(&query.to_json())
            .send()
            .await?;
        let parsed: SearchResponse = Self::check(response).await?.json().await?;
        Ok(SearchResults {
            total: parsed.hits.total.value,
            hits: parsed
                .hits
                .hits
                .into_iter()
                .map(|raw| {
                    let mut document = raw.source;
                    document.id = raw.id.clone();
                    Hit {
                        id: raw.id,
                        score: raw.score.unwrap_or_default(),
                        document,
                    }
                })
                .collect(),
        })
    }

    async fn health(&self) -> Result<String, SearchError> {
        let response = self.client.get(self.url("_cluster/health")).send().await?;
        let body: Value = Self::check(response).await?.json().await?;
        Ok(body["status"].as_str().unwrap_or("unknown").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataRecord;
    use crate::search::DocumentType;

    #[test]
    fn bare_address_gets_scheme() {
        let backend = ElasticBackend::new("localhost:9200/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url("/gallery/_search"), "http://localhost:9200/gallery/_search");
        let backend = ElasticBackend::new("https://es.example:9200", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url("_aliases"), "https://es.example:9200/_aliases");
    }

    #[test]
    fn bulk_body_is_ndjson_pairs() {
        let mut meta = MetadataRecord::default();
        meta.set("title", "Dune");
        let doc = SearchDocument::from_record("trip/a.jpg".into(), &meta, DocumentType::Image);
        let body = bulk_body(std::slice::from_ref(&doc)).unwrap();
        let lines: Vec<Value> = body.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], json!({"index": {"_id": doc.id}}));
        assert_eq!(lines[1], json!({"path": "trip/a.jpg", "title": "Dune", "type": "Image"}));
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn bulk_failures_collects_rejected_items() {
        let response: BulkResponse = serde_json::from_value(json!({
            "errors": true,
            "items": [
                {"index": {"_id": "ok", "status": 201}},
                {"index": {"_id": "bad", "status": 400, "error": {"type": "mapper_parsing_exception"}}},
            ]
        }))
        .unwrap();
        let failures = bulk_failures(response);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, "bad");
        assert!(failures[0].reason.contains("mapper_parsing_exception"));
    }

    #[test]
    fn search_response_parses_hits() {
        let parsed: SearchResponse = serde_json::from_value(json!({
            "hits": {
                "total": {"value": 12, "relation": "eq"},
                "hits": [
                    {"_id": "x", "_score": 4.5, "_source": {"path": "trip", "type": "Album"}},
                ]
            }
        }))
        .unwrap();
        assert_eq!(parsed.hits.total.value, 12);
        assert_eq!(parsed.hits.hits[0].source.kind, DocumentType::Album);
        assert_eq!(parsed.hits.hits[0].score, Some(4.5));
    }
}
