//! Retrieval quality scoring.
//!
//! Turns the similarity scores of the hits returned for a query into
//! aggregate statistics, a composite 0-100 quality score and a letter grade.
//!
//! The composite score blends three components:
//! - average similarity (weight 60 by default)
//! - consistency, i.e. low variance between hit scores (weight 20)
//! - source count, saturating at five hits (weight 20)

use crate::error::{EvalError, Result};
use crate::retrieval::ScoredHit;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Variance at or above which a result set gets no consistency credit.
pub const DEFAULT_VARIANCE_CEILING: f64 = 0.1;

/// Number of sources at which the source component saturates.
pub const DEFAULT_SOURCE_SATURATION: usize = 5;

/// Upper bound of the composite score; the weights may not add up past it.
pub const MAX_QUALITY_SCORE: f64 = 100.0;

/// A similarity in `[0, 1]`, higher meaning more similar.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Similarity(f64);

impl Similarity {
    /// Wrap a raw similarity value.
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(EvalError::InvalidSimilarity(value));
        }
        Ok(Self(value))
    }

    /// Convert a nearest-neighbour distance into a similarity via `exp(-d)`.
    ///
    /// Distance 0 maps to 1.0 and the result decays towards 0 as the distance
    /// grows. Negative or non-finite distances are rejected.
    pub fn from_distance(distance: f64) -> Result<Self> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(EvalError::InvalidDistance(distance));
        }
        Ok(Self((-distance).exp()))
    }

    /// The underlying value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Similarity {
    type Error = EvalError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Similarity> for f64 {
    fn from(similarity: Similarity) -> Self {
        similarity.0
    }
}

/// Letter grade for a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl Grade {
    /// Lower bounds of each grade, highest first. Bounds are inclusive.
    const THRESHOLDS: [(f64, Grade); 8] = [
        (90.0, Grade::APlus),
        (85.0, Grade::A),
        (80.0, Grade::AMinus),
        (75.0, Grade::BPlus),
        (70.0, Grade::B),
        (65.0, Grade::BMinus),
        (60.0, Grade::CPlus),
        (55.0, Grade::C),
    ];

    /// Map a quality score to its grade.
    pub fn from_score(score: f64) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(floor, _)| score >= *floor)
            .map(|(_, grade)| *grade)
            .unwrap_or(Grade::CMinus)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative reading of the score variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    High,
    Medium,
    Low,
}

impl Consistency {
    pub fn from_variance(variance: f64) -> Self {
        if variance < 0.01 {
            Consistency::High
        } else if variance < 0.05 {
            Consistency::Medium
        } else {
            Consistency::Low
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Consistency::High => "High",
            Consistency::Medium => "Medium",
            Consistency::Low => "Low",
        };
        f.write_str(label)
    }
}

/// Weights and calibration constants for the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of the average similarity component.
    #[serde(default = "default_average_weight")]
    pub average_weight: f64,

    /// Weight of the consistency component.
    #[serde(default = "default_component_weight")]
    pub consistency_weight: f64,

    /// Weight of the source count component.
    #[serde(default = "default_component_weight")]
    pub source_weight: f64,

    /// Variance treated as "fully inconsistent".
    #[serde(default = "default_variance_ceiling")]
    pub variance_ceiling: f64,

    /// Source count that earns the full source component.
    #[serde(default = "default_source_saturation")]
    pub source_saturation: usize,
}

fn default_average_weight() -> f64 {
    60.0
}

fn default_component_weight() -> f64 {
    20.0
}

fn default_variance_ceiling() -> f64 {
    DEFAULT_VARIANCE_CEILING
}

fn default_source_saturation() -> usize {
    DEFAULT_SOURCE_SATURATION
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            average_weight: default_average_weight(),
            consistency_weight: default_component_weight(),
            source_weight: default_component_weight(),
            variance_ceiling: default_variance_ceiling(),
            source_saturation: default_source_saturation(),
        }
    }
}

impl ScoringConfig {
    /// Check that the calibration constants are usable.
    pub fn validate(&self) -> Result<()> {
        if self.variance_ceiling.is_nan() || self.variance_ceiling <= 0.0 {
            return Err(EvalError::Config(format!(
                "scoring.variance_ceiling must be positive, got {}",
                self.variance_ceiling
            )));
        }
        if self.source_saturation == 0 {
            return Err(EvalError::Config(
                "scoring.source_saturation must be at least 1".to_string(),
            ));
        }
        let weights = [
            self.average_weight,
            self.consistency_weight,
            self.source_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EvalError::Config(
                "scoring weights must be finite and non-negative".to_string(),
            ));
        }
        let total: f64 = weights.iter().sum();
        if total > MAX_QUALITY_SCORE {
            return Err(EvalError::Config(format!(
                "scoring weights must sum to at most {MAX_QUALITY_SCORE}, got {total}"
            )));
        }
        Ok(())
    }
}

/// Aggregate quality of the hits retrieved for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalQualityReport {
    /// Mean similarity.
    pub avg_score: f64,
    /// Highest similarity.
    pub top_score: f64,
    /// Number of hits.
    pub num_sources: usize,
    /// Sample variance of the similarities (0.0 below two hits).
    pub score_variance: f64,
    /// Composite score, rounded to one decimal.
    pub quality_score: f64,
    /// Letter grade of `quality_score`.
    pub grade: Grade,
    /// The hits the report was computed from, in their final order.
    pub sources_with_scores: Vec<ScoredHit>,
}

impl RetrievalQualityReport {
    /// Report for a query that returned nothing.
    pub fn empty() -> Self {
        Self {
            avg_score: 0.0,
            top_score: 0.0,
            num_sources: 0,
            score_variance: 0.0,
            quality_score: 0.0,
            grade: Grade::CMinus,
            sources_with_scores: Vec::new(),
        }
    }

    pub fn consistency(&self) -> Consistency {
        Consistency::from_variance(self.score_variance)
    }

    /// Contents of the hits, in order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources_with_scores.iter().map(|h| h.content.as_str())
    }
}

/// Computes [`RetrievalQualityReport`]s under a [`ScoringConfig`].
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    config: ScoringConfig,
}

impl QualityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Build the quality report for a query's hits.
    ///
    /// Order does not matter for the statistics, so raw and re-ranked hit
    /// lists can be passed interchangeably.
    pub fn report(&self, hits: &[ScoredHit]) -> RetrievalQualityReport {
        if hits.is_empty() {
            return RetrievalQualityReport::empty();
        }

        let scores: Vec<f64> = hits.iter().map(|h| h.similarity.value()).collect();
        let avg_score = mean(&scores);
        let top_score = scores.iter().copied().fold(f64::MIN, f64::max);
        let score_variance = sample_variance(&scores, avg_score);
        let quality_score = self.quality_score(avg_score, score_variance, hits.len());

        RetrievalQualityReport {
            avg_score,
            top_score,
            num_sources: hits.len(),
            score_variance,
            quality_score,
            grade: Grade::from_score(quality_score),
            sources_with_scores: hits.to_vec(),
        }
    }

    /// Composite 0-100 score from the aggregate statistics.
    pub fn quality_score(&self, avg_score: f64, score_variance: f64, num_sources: usize) -> f64 {
        let c = &self.config;

        let avg_component = avg_score * c.average_weight;
        let consistency_component =
            (1.0 - score_variance / c.variance_ceiling).max(0.0) * c.consistency_weight;
        let source_component =
            (num_sources as f64 / c.source_saturation as f64).min(1.0) * c.source_weight;

        round_to_tenth(avg_component + consistency_component + source_component)
    }
}

/// Quality report with the default scoring configuration.
pub fn compute_quality_report(hits: &[ScoredHit]) -> RetrievalQualityReport {
    QualityScorer::default().report(hits)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Bessel-corrected variance; 0.0 for fewer than two values.
fn sample_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let squared: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    squared / (values.len() - 1) as f64
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}
