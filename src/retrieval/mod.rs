//! Retrieval hits and the search collaborators that produce them.
//!
//! A search backend returns raw `(content, id, distance)` hits. They are
//! ranked, converted to similarities once, and from then on travel as
//! [`ScoredHit`]s: re-ranking reorders whole records by position, so a
//! similarity can never be re-attached to the wrong chunk.

mod fixture;
mod http;

pub use fixture::FixtureSearchBackend;
pub use http::{HttpReranker, HttpSearchBackend};

use crate::error::{EvalError, Result};
use crate::quality::Similarity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A raw hit as returned by a search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Chunk text.
    pub content: String,
    /// Stable identifier of the source document or chunk.
    pub id: String,
    /// Nearest-neighbour distance, smaller is closer.
    pub distance: f64,
}

/// A search hit with its 1-based position in the backend's ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub rank: usize,
    pub id: String,
    pub content: String,
    pub distance: f64,
}

impl RankedHit {
    /// Assign ranks to hits in the order the backend returned them.
    pub fn rank_all(hits: Vec<SearchHit>) -> Vec<RankedHit> {
        hits.into_iter()
            .enumerate()
            .map(|(i, hit)| RankedHit {
                rank: i + 1,
                id: hit.id,
                content: hit.content,
                distance: hit.distance,
            })
            .collect()
    }
}

/// A ranked hit whose distance has been converted to a similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHit {
    /// Rank in the original retrieval ordering (1-based).
    pub rank: usize,
    pub id: String,
    pub content: String,
    pub similarity: Similarity,
}

impl ScoredHit {
    /// Convert a ranked hit, rejecting invalid distances.
    pub fn from_ranked(hit: RankedHit) -> Result<Self> {
        Ok(Self {
            rank: hit.rank,
            similarity: Similarity::from_distance(hit.distance)?,
            id: hit.id,
            content: hit.content,
        })
    }
}

/// Rank backend hits and convert their distances to similarities.
pub fn score_hits(hits: Vec<SearchHit>) -> Result<Vec<ScoredHit>> {
    RankedHit::rank_all(hits)
        .into_iter()
        .map(ScoredHit::from_ranked)
        .collect()
}

/// Document IDs of the hits, in order.
pub fn hit_ids(hits: &[ScoredHit]) -> Vec<String> {
    hits.iter().map(|h| h.id.clone()).collect()
}

/// Capability to run a nearest-neighbour search for a query.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Return up to `top_k` hits, closest first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>>;
}

/// Capability to reorder candidate hits by relevance to a query.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Return positions into `hits`, most relevant first, at most `top_k` long.
    async fn rerank(&self, query: &str, hits: &[ScoredHit], top_k: usize) -> Result<Vec<usize>>;
}

/// Reorder `hits` by the positions in `order`.
///
/// Every position must be in range and appear at most once.
pub fn apply_ordering(hits: &[ScoredHit], order: &[usize]) -> Result<Vec<ScoredHit>> {
    let mut seen = HashSet::with_capacity(order.len());
    order
        .iter()
        .map(|&position| {
            if !seen.insert(position) {
                return Err(EvalError::Rerank(format!(
                    "position {position} returned more than once"
                )));
            }
            hits.get(position).cloned().ok_or_else(|| {
                EvalError::Rerank(format!(
                    "position {position} out of range for {} candidates",
                    hits.len()
                ))
            })
        })
        .collect()
}

/// A retrieved chunk annotated with its ground-truth relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub rank: usize,
    pub id: String,
    pub content: String,
    pub similarity: f64,
    pub is_relevant: bool,
}

/// Mark which hits are in the ground-truth set.
pub fn annotate_relevance(hits: &[ScoredHit], relevant_ids: &[String]) -> Vec<RetrievedChunk> {
    let relevant: HashSet<&str> = relevant_ids.iter().map(String::as_str).collect();
    hits.iter()
        .map(|hit| RetrievedChunk {
            rank: hit.rank,
            id: hit.id.clone(),
            content: hit.content.clone(),
            similarity: hit.similarity.value(),
            is_relevant: relevant.contains(hit.id.as_str()),
        })
        .collect()
}
