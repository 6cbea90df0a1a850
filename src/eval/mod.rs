//! End-to-end evaluation of a retrieval-augmented pipeline.
//!
//! This module provides:
//! - Ground-truth datasets of questions, answers and relevant document IDs
//! - Answer generation and LLM-as-judge collaborators
//! - Per-question evaluation and bounded concurrent batch runs

pub mod batch;
pub mod dataset;
pub mod evaluator;
pub mod generator;
pub mod judge;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchReport, BatchSummary, QueryOutcome};
pub use dataset::{Dataset, TestQuestion, create_sample_dataset};
pub use evaluator::{EvaluationRecord, RagEvaluator, Retrieval, ScoredAnswer};
pub use generator::{AnswerGenerator, LlmGenerator};
pub use judge::{AnswerJudge, Judgement, LlmJudge};
