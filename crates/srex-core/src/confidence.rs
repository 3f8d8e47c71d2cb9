//! Heuristic confidence score for a normalized document.
//!
//! Fixed 0-100 integer scale. The score is advisory and never blocks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{DocumentField, GenerationContext, NormalizedDocument};

pub const MAX_SCORE: u8 = 100;
pub const MISSING_EXPLANATION_PENALTY: u8 = 30;
pub const MISSING_SUGGESTIONS_PENALTY: u8 = 20;
pub const HIGH_TEMPERATURE_PENALTY: u8 = 20;

/// Bounded confidence, 0 to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfidenceScore(u8);

impl ConfidenceScore {
    pub fn new(value: u8) -> Self {
        Self(value.min(MAX_SCORE))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// The same score on a 0.0-1.0 scale.
    pub fn as_fraction(&self) -> f64 {
        f64::from(self.0) / f64::from(MAX_SCORE)
    }
}

impl fmt::Display for ConfidenceScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/100", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    high_temperature_threshold: f32,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(0.8)
    }
}

impl ConfidenceScorer {
    pub fn new(high_temperature_threshold: f32) -> Self {
        Self {
            high_temperature_threshold,
        }
    }

    pub fn score(&self, doc: &NormalizedDocument, ctx: &GenerationContext) -> ConfidenceScore {
        let mut score = MAX_SCORE;
        if doc.is_field_empty(DocumentField::Explanation) {
            score = score.saturating_sub(MISSING_EXPLANATION_PENALTY);
        }
        if doc.is_field_empty(DocumentField::Suggestions) {
            score = score.saturating_sub(MISSING_SUGGESTIONS_PENALTY);
        }
        if ctx.temperature > self.high_temperature_threshold {
            score = score.saturating_sub(HIGH_TEMPERATURE_PENALTY);
        }
        ConfidenceScore::new(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Suggestion;

    #[test]
    fn test_penalties() {
        let scorer = ConfidenceScorer::default();
        let ctx = GenerationContext::new("api", "");
        let mut doc = NormalizedDocument::default();
        assert_eq!(scorer.score(&doc, &ctx).value(), 50);

        doc.explanation = "Latency is the main risk.".to_string();
        assert_eq!(scorer.score(&doc, &ctx).value(), 80);

        doc.suggestions.push(Suggestion::placeholder());
        assert_eq!(scorer.score(&doc, &ctx).value(), 80);

        doc.suggestions.push(Suggestion {
            metric: "latency".to_string(),
            recommendation: "Set p99 budget to 300ms".to_string(),
        });
        assert_eq!(scorer.score(&doc, &ctx).value(), 100);

        let hot = ctx.with_temperature(1.2);
        assert_eq!(scorer.score(&doc, &hot).value(), 80);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let scorer = ConfidenceScorer::new(0.8);
        let doc = NormalizedDocument {
            explanation: "x".to_string(),
            ..Default::default()
        };
        let ctx = GenerationContext::new("api", "").with_temperature(0.8);
        assert_eq!(scorer.score(&doc, &ctx).value(), 80);
    }

    #[test]
    fn test_scale() {
        assert_eq!(ConfidenceScore::new(250).value(), 100);
        assert!((ConfidenceScore::new(65).as_fraction() - 0.65).abs() < 1e-9);
        assert_eq!(ConfidenceScore::new(40).to_string(), "40/100");
    }
}
