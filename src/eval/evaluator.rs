//! Per-question evaluation: retrieve, score, answer, judge.

use super::dataset::TestQuestion;
use super::generator::AnswerGenerator;
use super::judge::AnswerJudge;
use crate::config::EvaluationConfig;
use crate::error::Result;
use crate::llm::clean_answer;
use crate::metrics::{MetricsCalculator, MetricsPolicy, RetrievalMetrics};
use crate::quality::{QualityScorer, RetrievalQualityReport, ScoringConfig};
use crate::retrieval::{
    Reranker, RetrievedChunk, ScoredHit, SearchBackend, annotate_relevance, apply_ordering,
    hit_ids, score_hits,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything known about one evaluated question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: String,
    pub generated_answer: String,
    pub expected_answer: String,
    pub is_correct: bool,
    pub reasoning: String,
    /// IDs of all candidates, in retrieval order.
    pub retrieved_doc_ids: Vec<String>,
    /// Ground truth, when the question had any.
    pub relevant_doc_ids: Option<Vec<String>>,
    /// `None` when the question had no ground truth.
    pub metrics: Option<RetrievalMetrics>,
    /// Quality of the context the answer was generated from.
    pub quality: RetrievalQualityReport,
    /// Candidates marked relevant or not.
    pub retrieved_chunks: Vec<RetrievedChunk>,
}

/// Hits for one query: the full candidate list and the answer context.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub candidates: Vec<ScoredHit>,
    pub context: Vec<ScoredHit>,
}

/// An answer together with the quality of the context behind it.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredAnswer {
    pub answer: String,
    pub quality: RetrievalQualityReport,
}

/// Runs the retrieval, generation and judging collaborators for questions
/// and scores the results.
#[derive(Clone)]
pub struct RagEvaluator {
    search: Arc<dyn SearchBackend>,
    reranker: Option<Arc<dyn Reranker>>,
    generator: Arc<dyn AnswerGenerator>,
    judge: Arc<dyn AnswerJudge>,
    metrics: MetricsCalculator,
    scorer: QualityScorer,
    config: EvaluationConfig,
}

impl RagEvaluator {
    pub fn new(
        search: Arc<dyn SearchBackend>,
        generator: Arc<dyn AnswerGenerator>,
        judge: Arc<dyn AnswerJudge>,
    ) -> Self {
        Self {
            search,
            reranker: None,
            generator,
            judge,
            metrics: MetricsCalculator::default(),
            scorer: QualityScorer::default(),
            config: EvaluationConfig::default(),
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scorer = QualityScorer::new(scoring);
        self
    }

    pub fn with_metrics_policy(mut self, policy: MetricsPolicy) -> Self {
        self.metrics = MetricsCalculator::new(policy);
        self
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Fetch candidates and pick the answer context.
    ///
    /// Without a re-ranker the context is the first `context_k` candidates.
    pub async fn retrieve(&self, question: &str) -> Result<Retrieval> {
        let raw = self.search.search(question, self.config.candidate_k).await?;
        let candidates = score_hits(raw)?;

        let context = match &self.reranker {
            Some(reranker) => {
                let order = reranker
                    .rerank(question, &candidates, self.config.context_k)
                    .await?;
                let mut reordered = apply_ordering(&candidates, &order)?;
                reordered.truncate(self.config.context_k);
                reordered
            }
            None => candidates
                .iter()
                .take(self.config.context_k)
                .cloned()
                .collect(),
        };

        debug!(
            candidates = candidates.len(),
            context = context.len(),
            "Retrieved hits"
        );
        Ok(Retrieval {
            candidates,
            context,
        })
    }

    /// Answer a question and report the quality of its context.
    pub async fn query_with_scores(&self, question: &str) -> Result<ScoredAnswer> {
        let retrieval = self.retrieve(question).await?;
        let answer = self.answer(question, &retrieval.context).await?;
        Ok(ScoredAnswer {
            answer,
            quality: self.scorer.report(&retrieval.context),
        })
    }

    /// Evaluate a single question end to end.
    pub async fn evaluate(&self, item: &TestQuestion) -> Result<EvaluationRecord> {
        let retrieval = self.retrieve(&item.question).await?;
        let answer = self.answer(&item.question, &retrieval.context).await?;
        let judgement = self
            .judge
            .judge(&item.question, &answer, &item.expected_answer)
            .await?;

        let retrieved_doc_ids = hit_ids(&retrieval.candidates);
        let metrics = item.relevant_doc_ids.as_ref().map(|relevant| {
            self.metrics
                .calculate(retrieved_doc_ids.as_slice(), relevant.as_slice())
        });
        let quality = self.scorer.report(&retrieval.context);
        let retrieved_chunks = annotate_relevance(
            &retrieval.candidates,
            item.relevant_doc_ids.as_deref().unwrap_or_default(),
        );

        match &metrics {
            Some(m) => info!(
                correct = judgement.is_correct,
                precision = m.precision,
                recall = m.recall,
                mrr = m.mrr,
                quality = quality.quality_score,
                grade = %quality.grade,
                "Evaluated question"
            ),
            None => info!(
                correct = judgement.is_correct,
                quality = quality.quality_score,
                grade = %quality.grade,
                "Evaluated question without ground truth"
            ),
        }

        Ok(EvaluationRecord {
            question: item.question.clone(),
            generated_answer: clean_answer(&answer),
            expected_answer: item.expected_answer.clone(),
            is_correct: judgement.is_correct,
            reasoning: judgement
                .reasoning
                .unwrap_or_else(|| "No reasoning provided".to_string()),
            retrieved_doc_ids,
            relevant_doc_ids: item.relevant_doc_ids.clone(),
            metrics,
            quality,
            retrieved_chunks,
        })
    }

    async fn answer(&self, question: &str, context: &[ScoredHit]) -> Result<String> {
        let chunks: Vec<String> = context.iter().map(|h| h.content.clone()).collect();
        self.generator.generate(question, &chunks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::eval::testing::{
        FailingSearch, FixedOrderReranker, KeywordJudge, StaticGenerator, evaluator_with, hit,
    };
    use crate::quality::Grade;
    use crate::retrieval::FixtureSearchBackend;

    fn backend() -> FixtureSearchBackend {
        let mut backend = FixtureSearchBackend::default();
        backend.insert(
            "Who created Python?",
            vec![
                hit("intro.md", "Python overview", 0.0),
                hit("history.md", "Guido van Rossum created Python", 0.0),
                hit("pep8.md", "Style guide", 0.0),
                hit("typing.md", "Type hints", 0.0),
                hit("asyncio.md", "Async IO", 0.0),
            ],
        );
        backend
    }

    #[tokio::test]
    async fn test_evaluate_with_ground_truth() {
        let evaluator = evaluator_with(Arc::new(backend()), "Guido van Rossum");
        let item = TestQuestion::new("Who created Python?", "Guido van Rossum")
            .with_relevant_ids(["history.md", "missing.md"]);

        let record = evaluator.evaluate(&item).await.unwrap();

        assert!(record.is_correct);
        assert_eq!(record.generated_answer, "Guido van Rossum");
        assert_eq!(record.retrieved_doc_ids.len(), 5);

        let metrics = record.metrics.unwrap();
        assert!((metrics.precision - 0.2).abs() < 1e-12);
        assert!((metrics.recall - 0.5).abs() < 1e-12);
        assert!((metrics.mrr - 0.5).abs() < 1e-12);

        assert_eq!(record.quality.num_sources, 5);
        assert_eq!(record.quality.quality_score, 100.0);
        assert_eq!(record.quality.grade, Grade::APlus);

        assert!(record.retrieved_chunks[1].is_relevant);
        assert!(!record.retrieved_chunks[0].is_relevant);
    }

    #[tokio::test]
    async fn test_missing_ground_truth_leaves_metrics_empty() {
        let evaluator = evaluator_with(Arc::new(backend()), "Guido van Rossum");
        let item = TestQuestion::new("Who created Python?", "Guido van Rossum");

        let record = evaluator.evaluate(&item).await.unwrap();
        assert!(record.metrics.is_none());
        assert!(record.relevant_doc_ids.is_none());
        assert!(record.retrieved_chunks.iter().all(|c| !c.is_relevant));
    }

    #[tokio::test]
    async fn test_empty_ground_truth_is_computed_as_zero() {
        let evaluator = evaluator_with(Arc::new(backend()), "Guido van Rossum");
        let item = TestQuestion::new("Who created Python?", "Guido")
            .with_relevant_ids(Vec::<String>::new());

        let record = evaluator.evaluate(&item).await.unwrap();
        assert_eq!(record.metrics, Some(RetrievalMetrics::ZERO));
    }

    #[tokio::test]
    async fn test_no_hits_scores_zero() {
        let evaluator = evaluator_with(Arc::new(FixtureSearchBackend::default()), "no idea");
        let item = TestQuestion::new("Unknown?", "something").with_relevant_ids(["a"]);

        let record = evaluator.evaluate(&item).await.unwrap();
        assert!(!record.is_correct);
        assert_eq!(record.quality.quality_score, 0.0);
        assert_eq!(record.quality.grade, Grade::CMinus);
        assert_eq!(record.metrics, Some(RetrievalMetrics::ZERO));
    }

    #[tokio::test]
    async fn test_context_limited_to_context_k() {
        let evaluator = evaluator_with(Arc::new(backend()), "x").with_config(EvaluationConfig {
            candidate_k: 5,
            context_k: 2,
            max_concurrency: 1,
        });

        let retrieval = evaluator.retrieve("Who created Python?").await.unwrap();
        assert_eq!(retrieval.candidates.len(), 5);
        assert_eq!(retrieval.context.len(), 2);
        assert_eq!(retrieval.context[0].id, "intro.md");
    }

    #[tokio::test]
    async fn test_reranked_context_keeps_scores() {
        let mut search = FixtureSearchBackend::default();
        search.insert(
            "q",
            vec![
                hit("a", "duplicate", 0.1),
                hit("b", "duplicate", 3.0),
                hit("c", "unique", 1.0),
            ],
        );
        let evaluator = evaluator_with(Arc::new(search), "x")
            .with_reranker(Arc::new(FixedOrderReranker(vec![1, 2, 0])));

        let retrieval = evaluator.retrieve("q").await.unwrap();
        let ids: Vec<&str> = retrieval.context.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert!((retrieval.context[0].similarity.value() - (-3.0f64).exp()).abs() < 1e-12);
        assert!((retrieval.context[2].similarity.value() - (-0.1f64).exp()).abs() < 1e-12);
        // metrics still see the backend ordering
        assert_eq!(retrieval.candidates[0].id, "a");
    }

    #[tokio::test]
    async fn test_query_with_scores() {
        let evaluator = evaluator_with(Arc::new(backend()), "Guido van Rossum");
        let scored = evaluator
            .query_with_scores("Who created Python?")
            .await
            .unwrap();
        assert_eq!(scored.answer, "Guido van Rossum");
        assert_eq!(scored.quality.num_sources, 5);
    }

    #[tokio::test]
    async fn test_search_failure_propagates() {
        let evaluator = RagEvaluator::new(
            Arc::new(FailingSearch),
            Arc::new(StaticGenerator::new("x")),
            Arc::new(KeywordJudge),
        );
        let err = evaluator
            .evaluate(&TestQuestion::new("q", "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Search(_)));
    }
}
