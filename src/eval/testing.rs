//! In-memory collaborators for evaluation tests.

use super::evaluator::RagEvaluator;
use super::generator::AnswerGenerator;
use super::judge::{AnswerJudge, Judgement};
use crate::error::{EvalError, Result};
use crate::retrieval::{Reranker, ScoredHit, SearchBackend, SearchHit};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn hit(id: &str, content: &str, distance: f64) -> SearchHit {
    SearchHit {
        content: content.to_string(),
        id: id.to_string(),
        distance,
    }
}

/// Always answers with the same text.
pub struct StaticGenerator {
    answer: String,
}

impl StaticGenerator {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for StaticGenerator {
    async fn generate(&self, _question: &str, _context: &[String]) -> Result<String> {
        Ok(self.answer.clone())
    }
}

/// Answers with the question itself, failing on questions containing "fail".
pub struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(&self, question: &str, _context: &[String]) -> Result<String> {
        if question.contains("fail") {
            return Err(EvalError::LlmApi(format!("generation failed for {question}")));
        }
        Ok(question.to_string())
    }
}

/// Tracks how many generations run at once.
#[derive(Default)]
pub struct SlowGenerator {
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub finished: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl SlowGenerator {
    /// Fires `cancel` once `count` generations have finished.
    pub fn cancelling_after(count: usize, cancel: CancellationToken) -> Self {
        Self {
            cancel_after: Some((count, cancel)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl AnswerGenerator for SlowGenerator {
    async fn generate(&self, question: &str, _context: &[String]) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let finished = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((count, cancel)) = &self.cancel_after {
            if finished >= *count {
                cancel.cancel();
            }
        }
        Ok(question.to_string())
    }
}

/// Correct when the response contains the expected answer, ignoring case.
pub struct KeywordJudge;

#[async_trait]
impl AnswerJudge for KeywordJudge {
    async fn judge(
        &self,
        _question: &str,
        response: &str,
        expected_answer: &str,
    ) -> Result<Judgement> {
        let is_correct = response
            .to_lowercase()
            .contains(&expected_answer.to_lowercase());
        Ok(Judgement {
            is_correct,
            reasoning: Some(format!("keyword match: {is_correct}")),
        })
    }
}

pub struct FailingSearch;

#[async_trait]
impl SearchBackend for FailingSearch {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchHit>> {
        Err(EvalError::Search("backend unavailable".to_string()))
    }
}

/// Returns every query the same single hit.
pub struct OneHitSearch;

#[async_trait]
impl SearchBackend for OneHitSearch {
    async fn search(&self, query: &str, _top_k: usize) -> Result<Vec<SearchHit>> {
        Ok(vec![hit(query, query, 0.5)])
    }
}

/// Returns a fixed ordering.
pub struct FixedOrderReranker(pub Vec<usize>);

#[async_trait]
impl Reranker for FixedOrderReranker {
    async fn rerank(&self, _query: &str, _hits: &[ScoredHit], top_k: usize) -> Result<Vec<usize>> {
        Ok(self.0.iter().copied().take(top_k).collect())
    }
}

pub fn evaluator_with(search: Arc<dyn SearchBackend>, answer: &str) -> RagEvaluator {
    RagEvaluator::new(
        search,
        Arc::new(StaticGenerator::new(answer)),
        Arc::new(KeywordJudge),
    )
}
