//! RAG Retrieval Eval - quality scoring and ground-truth metrics for
//! retrieval-augmented generation pipelines.
//!
//! # Overview
//!
//! Given the ranked hits a vector store returns for a query, this crate:
//! 1. Converts distances into similarities with `exp(-distance)`
//! 2. Scores the set on a 0-100 scale from mean similarity, consistency and
//!    source count, and assigns a letter grade
//! 3. Computes precision, recall and MRR against known relevant document IDs
//! 4. Runs datasets of questions through search, generation and judging with
//!    bounded concurrency
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_retrieval_eval::{
//!     calculate_retrieval_metrics, compute_quality_report,
//!     retrieval::{SearchHit, score_hits},
//! };
//!
//! fn main() -> rag_retrieval_eval::Result<()> {
//!     let hits = score_hits(vec![
//!         SearchHit { content: "Guido van Rossum".into(), id: "history.md".into(), distance: 0.2 },
//!         SearchHit { content: "PEP 8".into(), id: "pep8.md".into(), distance: 0.9 },
//!     ])?;
//!
//!     let report = compute_quality_report(&hits);
//!     println!("{} ({})", report.quality_score, report.grade);
//!
//!     let metrics = calculate_retrieval_metrics(&["history.md", "pep8.md"], &["history.md"]);
//!     println!("P={:.2} R={:.2} MRR={:.2}", metrics.precision, metrics.recall, metrics.mrr);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **quality**: similarity conversion, quality score and grades
//! - **metrics**: precision, recall and MRR against ground truth
//! - **retrieval**: search hits, re-ranking and the search backends
//! - **eval**: datasets, answer generation, judging and batch runs
//! - **llm**: OpenAI-compatible API client and prompts

pub mod config;
pub mod error;
pub mod eval;
pub mod llm;
pub mod metrics;
pub mod quality;
pub mod retrieval;

// Re-export commonly used types
pub use config::Config;
pub use error::{EvalError, Result};
pub use eval::{BatchReport, EvaluationRecord, QueryOutcome, RagEvaluator, TestQuestion};
pub use llm::LlmClient;
pub use metrics::{MetricsCalculator, MetricsPolicy, RetrievalMetrics, calculate_retrieval_metrics};
pub use metrics::calculate_retrieval_metrics as compute_metrics;
pub use quality::{
    Grade, QualityScorer, RetrievalQualityReport, ScoringConfig, Similarity,
    compute_quality_report,
};
pub use retrieval::{ScoredHit, SearchBackend, SearchHit};
