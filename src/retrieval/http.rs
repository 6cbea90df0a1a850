//! HTTP collaborators: a JSON search endpoint and a cross-encoder re-ranker.

use super::{Reranker, ScoredHit, SearchBackend, SearchHit};
use crate::config::SearchConfig;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    top_k: usize,
}

/// Search backend that POSTs `{query, top_k}` to `<api_base>/search`.
///
/// The endpoint must answer with a JSON array of `{content, id, distance}`
/// objects, closest first.
#[derive(Clone)]
pub struct HttpSearchBackend {
    client: Client,
    api_base: String,
}

impl HttpSearchBackend {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EvalError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/search", self.api_base)
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        debug!(top_k, "Sending search request");

        let response = self
            .client
            .post(self.endpoint())
            .json(&SearchRequest { query, top_k })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EvalError::Search(format!(
                "Search API returned error {status}: {body}"
            )));
        }

        let mut hits: Vec<SearchHit> = serde_json::from_str(&body)
            .map_err(|e| EvalError::Search(format!("Failed to parse search response: {e}")))?;
        if hits.len() > top_k {
            hits.truncate(top_k);
        }

        debug!(hits = hits.len(), "Search complete");
        Ok(hits)
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

/// Re-ranker speaking the Jina/vLLM `/rerank` protocol.
#[derive(Clone)]
pub struct HttpReranker {
    client: Client,
    api_base: String,
    model: String,
}

impl HttpReranker {
    pub fn new(api_base: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EvalError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

/// Order result positions by descending score, NaN scores last.
fn order_by_score(mut results: Vec<RerankResult>, candidates: usize, top_k: usize) -> Vec<usize> {
    results.retain(|r| {
        let in_range = r.index < candidates;
        if !in_range {
            warn!(index = r.index, "Rerank API returned out-of-bounds index, dropping result");
        }
        in_range
    });
    results.sort_by(|a, b| match (a.relevance_score.is_nan(), b.relevance_score.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b
            .relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal),
    });

    let mut order: Vec<usize> = Vec::with_capacity(top_k.min(results.len()));
    for r in results {
        if order.len() == top_k {
            break;
        }
        if !order.contains(&r.index) {
            order.push(r.index);
        }
    }
    order
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, hits: &[ScoredHit], top_k: usize) -> Result<Vec<usize>> {
        if hits.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let request = RerankRequest {
            model: &self.model,
            query,
            documents: hits.iter().map(|h| h.content.as_str()).collect(),
            top_n: top_k,
        };

        debug!(candidates = hits.len(), top_k, "Sending rerank request");

        let response = self
            .client
            .post(format!("{}/rerank", self.api_base))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EvalError::Rerank(format!(
                "Rerank API returned error {status}: {body}"
            )));
        }

        let parsed: RerankResponse = serde_json::from_str(&body)
            .map_err(|e| EvalError::Rerank(format!("Failed to parse rerank response: {e}")))?;

        Ok(order_by_score(parsed.results, hits.len(), top_k))
    }
}
