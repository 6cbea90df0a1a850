//! Set-based retrieval metrics: precision, recall and reciprocal rank.
//!
//! All functions here are pure. Identifiers can be any hashable type, so the
//! same calculator works for `String` document IDs, `&str` slices or numeric
//! chunk IDs.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// Recall reported when a query has no ground-truth documents.
///
/// Without ground truth nothing can be credited, so the default is 0.0.
pub const DEFAULT_EMPTY_GROUND_TRUTH_RECALL: f64 = 0.0;

/// Precision, recall and MRR for a single query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    /// Fraction of retrieved items that are relevant.
    pub precision: f64,
    /// Fraction of relevant items that were retrieved.
    pub recall: f64,
    /// Reciprocal rank of the first relevant item.
    pub mrr: f64,
}

impl RetrievalMetrics {
    /// All-zero metrics.
    pub const ZERO: Self = Self {
        precision: 0.0,
        recall: 0.0,
        mrr: 0.0,
    };
}

/// Conventions applied where a metric is mathematically undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsPolicy {
    /// Recall to report when the relevant set is empty.
    #[serde(default = "default_empty_ground_truth_recall")]
    pub empty_ground_truth_recall: f64,
}

fn default_empty_ground_truth_recall() -> f64 {
    DEFAULT_EMPTY_GROUND_TRUTH_RECALL
}

impl MetricsPolicy {
    /// Check that the policy keeps recall within [0, 1].
    pub fn validate(&self) -> Result<()> {
        let recall = self.empty_ground_truth_recall;
        if !(0.0..=1.0).contains(&recall) {
            return Err(EvalError::Config(format!(
                "metrics.empty_ground_truth_recall must lie in [0, 1], got {recall}"
            )));
        }
        Ok(())
    }
}

impl Default for MetricsPolicy {
    fn default() -> Self {
        Self {
            empty_ground_truth_recall: DEFAULT_EMPTY_GROUND_TRUTH_RECALL,
        }
    }
}

/// Computes [`RetrievalMetrics`] under a given [`MetricsPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCalculator {
    policy: MetricsPolicy,
}

impl MetricsCalculator {
    /// Create a calculator with a custom policy.
    pub fn new(policy: MetricsPolicy) -> Self {
        Self { policy }
    }

    /// The policy in effect.
    pub fn policy(&self) -> MetricsPolicy {
        self.policy
    }

    /// Calculate all retrieval metrics for a single query.
    ///
    /// `retrieved_ids` must be in retrieval order. Duplicates in either list
    /// count once towards the intersection, but precision divides by the raw
    /// length of `retrieved_ids`.
    pub fn calculate<T: Eq + Hash>(
        &self,
        retrieved_ids: &[T],
        relevant_ids: &[T],
    ) -> RetrievalMetrics {
        let relevant: HashSet<&T> = relevant_ids.iter().collect();
        let retrieved: HashSet<&T> = retrieved_ids.iter().collect();
        let hits = retrieved.intersection(&relevant).count();

        RetrievalMetrics {
            precision: precision(hits, retrieved_ids.len()),
            recall: if relevant_ids.is_empty() {
                self.policy.empty_ground_truth_recall
            } else {
                hits as f64 / relevant_ids.len() as f64
            },
            mrr: reciprocal_rank(retrieved_ids, &relevant),
        }
    }
}

/// Calculate precision, recall and MRR with the default policy.
pub fn calculate_retrieval_metrics<T: Eq + Hash>(
    retrieved_ids: &[T],
    relevant_ids: &[T],
) -> RetrievalMetrics {
    MetricsCalculator::default().calculate(retrieved_ids, relevant_ids)
}

fn precision(hits: usize, retrieved: usize) -> f64 {
    if retrieved == 0 {
        return 0.0;
    }
    hits as f64 / retrieved as f64
}

fn reciprocal_rank<T: Eq + Hash>(retrieved_ids: &[T], relevant: &HashSet<&T>) -> f64 {
    retrieved_ids
        .iter()
        .position(|id| relevant.contains(id))
        .map(|index| 1.0 / (index as f64 + 1.0))
        .unwrap_or(0.0)
}

/// Mean of a collection of per-query metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Number of queries averaged.
    pub count: usize,
    /// Mean precision.
    pub precision: f64,
    /// Mean recall.
    pub recall: f64,
    /// Mean reciprocal rank.
    pub mrr: f64,
}

impl MetricsSummary {
    /// Average the given metrics. An empty input yields a zero summary.
    pub fn mean<'a>(metrics: impl IntoIterator<Item = &'a RetrievalMetrics>) -> Self {
        let mut count = 0usize;
        let mut total = RetrievalMetrics::ZERO;
        for m in metrics {
            count += 1;
            total.precision += m.precision;
            total.recall += m.recall;
            total.mrr += m.mrr;
        }

        if count == 0 {
            return Self {
                count,
                precision: 0.0,
                recall: 0.0,
                mrr: 0.0,
            };
        }

        let n = count as f64;
        Self {
            count,
            precision: total.precision / n,
            recall: total.recall / n,
            mrr: total.mrr / n,
        }
    }
}
