//! Relevance re-ranking of similarity search results.

use crate::error::MemoryError;
use crate::model::{Emphasis, MAX_IMPORTANCE, RetrievalResult};
use std::cmp::Ordering;

const WEIGHT_EPSILON: f64 = 1e-6;

/// Blends similarity with stored importance and assigns emphasis tiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceRanker {
    similarity_weight: f64,
    importance_weight: f64,
    high_threshold: f64,
    medium_threshold: f64,
}

impl Default for RelevanceRanker {
    fn default() -> Self {
        Self {
            similarity_weight: 0.7,
            importance_weight: 0.3,
            high_threshold: 0.85,
            medium_threshold: 0.70,
        }
    }
}

impl RelevanceRanker {
    /// Build a ranker; weights must lie in `[0, 1]` and sum to 1.
    pub fn new(similarity_weight: f64, importance_weight: f64) -> Result<Self, MemoryError> {
        for (name, weight) in [
            ("similarity_weight", similarity_weight),
            ("importance_weight", importance_weight),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(MemoryError::InvalidParameter(format!(
                    "{name} must be between 0 and 1 (got {weight})"
                )));
            }
        }
        if (similarity_weight + importance_weight - 1.0).abs() > WEIGHT_EPSILON {
            return Err(MemoryError::InvalidParameter(format!(
                "ranking weights must sum to 1 (got {})",
                similarity_weight + importance_weight
            )));
        }
        Ok(Self {
            similarity_weight,
            importance_weight,
            ..Self::default()
        })
    }

    /// Replace the emphasis thresholds; requires `0 <= medium <= high <= 1`.
    pub fn with_thresholds(mut self, high: f64, medium: f64) -> Result<Self, MemoryError> {
        if !(0.0..=1.0).contains(&high) || !(0.0..=1.0).contains(&medium) || medium > high {
            return Err(MemoryError::InvalidParameter(format!(
                "emphasis thresholds must satisfy 0 <= medium <= high <= 1 (high={high}, medium={medium})"
            )));
        }
        self.high_threshold = high;
        self.medium_threshold = medium;
        Ok(self)
    }

    /// Relevance for a similarity and importance pair.
    pub fn relevance(&self, similarity: f64, importance: u8) -> f64 {
        let importance = f64::from(importance.min(MAX_IMPORTANCE)) / f64::from(MAX_IMPORTANCE);
        (similarity * self.similarity_weight + importance * self.importance_weight).clamp(0.0, 1.0)
    }

    /// Emphasis tier for a relevance score.
    pub fn emphasis(&self, relevance: f64) -> Emphasis {
        if relevance >= self.high_threshold {
            Emphasis::High
        } else if relevance >= self.medium_threshold {
            Emphasis::Medium
        } else {
            Emphasis::Low
        }
    }

    /// Score, tier, and sort results by relevance descending.
    ///
    /// The sort is stable, so ties keep their incoming order.
    pub fn rank(&self, mut results: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
        for result in &mut results {
            result.relevance = self.relevance(result.similarity, result.record.importance);
            result.emphasis = self.emphasis(result.relevance);
        }
        results.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(Ordering::Equal)
        });
        results
    }
}
