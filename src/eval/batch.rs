//! Concurrent evaluation over a dataset.

use super::dataset::TestQuestion;
use super::evaluator::{EvaluationRecord, RagEvaluator};
use crate::metrics::MetricsSummary;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Result of one question in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QueryOutcome {
    Completed(Box<EvaluationRecord>),
    Failed { question: String, error: String },
    Cancelled { question: String },
}

impl QueryOutcome {
    pub fn question(&self) -> &str {
        match self {
            Self::Completed(record) => &record.question,
            Self::Failed { question, .. } | Self::Cancelled { question } => question,
        }
    }

    pub fn record(&self) -> Option<&EvaluationRecord> {
        match self {
            Self::Completed(record) => Some(&**record),
            _ => None,
        }
    }
}

/// Aggregates over a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Completed questions the judge accepted.
    pub correct: usize,
    /// Mean metrics over completed questions that had ground truth.
    pub metrics: MetricsSummary,
    /// Mean quality score over completed questions.
    pub avg_quality_score: f64,
    pub total_time_secs: f64,
}

impl BatchSummary {
    fn from_outcomes(outcomes: &[QueryOutcome], total_time_secs: f64) -> Self {
        let records: Vec<&EvaluationRecord> =
            outcomes.iter().filter_map(QueryOutcome::record).collect();
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, QueryOutcome::Failed { .. }))
            .count();

        let avg_quality_score = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.quality.quality_score).sum::<f64>() / records.len() as f64
        };

        Self {
            total: outcomes.len(),
            completed: records.len(),
            failed,
            cancelled: outcomes.len() - records.len() - failed,
            correct: records.iter().filter(|r| r.is_correct).count(),
            metrics: MetricsSummary::mean(records.iter().filter_map(|r| r.metrics.as_ref())),
            avg_quality_score,
            total_time_secs,
        }
    }

    /// Share of completed questions judged correct.
    pub fn accuracy(&self) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            self.correct as f64 / self.completed as f64
        }
    }
}

/// Outcomes in input order plus their summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub dataset_name: String,
    pub outcomes: Vec<QueryOutcome>,
    pub summary: BatchSummary,
}

impl BatchReport {
    /// Print summary to stdout.
    pub fn print_summary(&self) {
        let s = &self.summary;
        println!("\n========== Evaluation Results ==========");
        println!("Dataset: {}", self.dataset_name);
        println!("Total questions: {}", s.total);
        println!(
            "Completed: {}  Failed: {}  Cancelled: {}",
            s.completed, s.failed, s.cancelled
        );
        println!("----------------------------------------");
        println!("Correct: {} ({:.1}%)", s.correct, s.accuracy() * 100.0);
        println!("----------------------------------------");
        if s.metrics.count > 0 {
            println!("Retrieval metrics ({} with ground truth):", s.metrics.count);
            println!("  Precision: {:.3}", s.metrics.precision);
            println!("  Recall:    {:.3}", s.metrics.recall);
            println!("  MRR:       {:.3}", s.metrics.mrr);
        } else {
            println!("Retrieval metrics: no ground truth");
        }
        println!("----------------------------------------");
        println!("Avg quality score: {:.1}/100", s.avg_quality_score);
        println!("Total time: {:.1}s", s.total_time_secs);
        println!("========================================\n");
    }
}

impl RagEvaluator {
    /// Evaluate questions with at most `max_concurrency` in flight.
    ///
    /// A failing question is recorded and does not stop the others. Once
    /// `cancel` fires no further results are collected and every unfinished
    /// question is recorded as cancelled.
    pub async fn evaluate_batch(
        &self,
        dataset_name: &str,
        questions: &[TestQuestion],
        cancel: &CancellationToken,
    ) -> BatchReport {
        let start = Instant::now();
        let limit = self.config().max_concurrency.max(1);
        info!(
            dataset = dataset_name,
            questions = questions.len(),
            concurrency = limit,
            "Starting batch evaluation"
        );

        let finished: Vec<(usize, QueryOutcome)> = stream::iter(questions.iter().enumerate())
            .map(|(index, item)| async move {
                let outcome = match self.evaluate(item).await {
                    Ok(record) => QueryOutcome::Completed(Box::new(record)),
                    Err(e) => {
                        error!(question = %item.question, error = %e, "Question failed");
                        QueryOutcome::Failed {
                            question: item.question.clone(),
                            error: e.to_string(),
                        }
                    }
                };
                (index, outcome)
            })
            .buffer_unordered(limit)
            .take_until(cancel.cancelled())
            .collect()
            .await;

        let mut slots: Vec<Option<QueryOutcome>> = vec![None; questions.len()];
        for (index, outcome) in finished {
            slots[index] = Some(outcome);
        }
        let outcomes: Vec<QueryOutcome> = slots
            .into_iter()
            .zip(questions)
            .map(|(slot, item)| {
                slot.unwrap_or_else(|| QueryOutcome::Cancelled {
                    question: item.question.clone(),
                })
            })
            .collect();

        let summary = BatchSummary::from_outcomes(&outcomes, start.elapsed().as_secs_f64());
        if summary.cancelled > 0 {
            warn!(cancelled = summary.cancelled, "Batch evaluation cancelled");
        }
        info!(
            completed = summary.completed,
            failed = summary.failed,
            correct = summary.correct,
            "Batch evaluation finished"
        );

        BatchReport {
            dataset_name: dataset_name.to_string(),
            outcomes,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationConfig;
    use crate::eval::testing::{EchoGenerator, KeywordJudge, OneHitSearch, SlowGenerator};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn questions(texts: &[&str]) -> Vec<TestQuestion> {
        texts
            .iter()
            .map(|t| TestQuestion::new(*t, *t).with_relevant_ids([*t]))
            .collect()
    }

    fn echo_evaluator(max_concurrency: usize) -> RagEvaluator {
        RagEvaluator::new(
            Arc::new(OneHitSearch),
            Arc::new(EchoGenerator),
            Arc::new(KeywordJudge),
        )
        .with_config(EvaluationConfig {
            max_concurrency,
            ..EvaluationConfig::default()
        })
    }

    #[tokio::test]
    async fn test_outcomes_keep_input_order() {
        let evaluator = echo_evaluator(4);
        let items = questions(&["q1", "q2", "q3", "q4", "q5", "q6"]);

        let report = evaluator
            .evaluate_batch("ordered", &items, &CancellationToken::new())
            .await;

        let order: Vec<&str> = report.outcomes.iter().map(|o| o.question()).collect();
        assert_eq!(order, vec!["q1", "q2", "q3", "q4", "q5", "q6"]);
        assert_eq!(report.summary.completed, 6);
        assert_eq!(report.summary.correct, 6);
        assert!((report.summary.accuracy() - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let evaluator = echo_evaluator(2);
        let items = questions(&["ok one", "please fail", "ok two"]);

        let report = evaluator
            .evaluate_batch("mixed", &items, &CancellationToken::new())
            .await;

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes[0].record().is_some());
        assert!(matches!(
            &report.outcomes[1],
            QueryOutcome::Failed { question, error }
                if question == "please fail" && error.contains("generation failed")
        ));
        assert!(report.outcomes[2].record().is_some());
        assert_eq!(report.summary.completed, 2);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.cancelled, 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let generator = Arc::new(SlowGenerator::default());
        let evaluator = RagEvaluator::new(
            Arc::new(OneHitSearch),
            generator.clone(),
            Arc::new(KeywordJudge),
        )
        .with_config(EvaluationConfig {
            max_concurrency: 3,
            ..EvaluationConfig::default()
        });
        let texts: Vec<String> = (0..12).map(|i| format!("question {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let report = evaluator
            .evaluate_batch("capped", &questions(&refs), &CancellationToken::new())
            .await;

        assert_eq!(report.summary.completed, 12);
        let peak = generator.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency was {peak}");
        assert!(peak >= 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let evaluator = echo_evaluator(2);
        let items = questions(&["q1", "q2", "q3"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = evaluator.evaluate_batch("cancelled", &items, &cancel).await;

        assert_eq!(report.outcomes.len(), 3);
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| matches!(o, QueryOutcome::Cancelled { .. }))
        );
        assert_eq!(report.outcomes[2].question(), "q3");
        assert_eq!(report.summary.cancelled, 3);
        assert_eq!(report.summary.completed, 0);
        assert_eq!(report.summary.avg_quality_score, 0.0);
    }

    #[tokio::test]
    async fn test_cancelled_mid_batch_keeps_finished_records() {
        let cancel = CancellationToken::new();
        let generator = Arc::new(SlowGenerator::cancelling_after(2, cancel.clone()));
        let evaluator = RagEvaluator::new(
            Arc::new(OneHitSearch),
            generator.clone(),
            Arc::new(KeywordJudge),
        )
        .with_config(EvaluationConfig {
            max_concurrency: 2,
            ..EvaluationConfig::default()
        });
        let items = questions(&["q1", "q2", "q3", "q4", "q5", "q6"]);

        let report = evaluator.evaluate_batch("interrupted", &items, &cancel).await;

        assert!(cancel.is_cancelled());
        assert_eq!(report.outcomes.len(), 6);
        let order: Vec<&str> = report.outcomes.iter().map(|o| o.question()).collect();
        assert_eq!(order, vec!["q1", "q2", "q3", "q4", "q5", "q6"]);

        for outcome in &report.outcomes[..2] {
            let record = outcome.record().expect("finished before the token fired");
            assert_eq!(record.question, outcome.question());
            assert!(record.is_correct);
            assert!(record.metrics.is_some());
        }
        assert!(
            report.outcomes[2..]
                .iter()
                .all(|o| matches!(o, QueryOutcome::Cancelled { .. }))
        );

        assert_eq!(report.summary.completed, 2);
        assert_eq!(report.summary.cancelled, 4);
        assert_eq!(report.summary.failed, 0);
        assert_eq!(
            report.summary.completed + report.summary.cancelled,
            report.summary.total
        );
        assert_eq!(report.summary.correct, 2);
    }

    #[tokio::test]
    async fn test_summary_averages_completed_questions() {
        let evaluator = echo_evaluator(2);
        let mut items = questions(&["q1", "q2"]);
        items.push(TestQuestion::new("q3", "q3"));

        let report = evaluator
            .evaluate_batch("summary", &items, &CancellationToken::new())
            .await;

        // every question retrieves exactly its own id at distance 0.5
        let s = &report.summary;
        assert_eq!(s.metrics.count, 2);
        assert!((s.metrics.precision - 1.0).abs() < 1e-12);
        assert!((s.metrics.mrr - 1.0).abs() < 1e-12);

        let expected = report.outcomes[0].record().unwrap().quality.quality_score;
        assert!((s.avg_quality_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = QueryOutcome::Cancelled {
            question: "q".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "cancelled");
        assert_eq!(json["question"], "q");
    }
}
