//! Generation stages of a multi-step run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::contract::Contract;
use crate::domain::{DocumentField, Result, SrexError};

/// The five stages, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Discover indicators for the component.
    IndicatorDiscovery,

    /// Derive objectives from the discovered indicators.
    ObjectiveGeneration,

    /// Derive alert rules.
    AlertGeneration,

    /// Explanation and numeric remediation suggestions.
    AnalysisAndRecommendation,

    /// Produce the integrated document.
    ValidationAndIntegration,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::IndicatorDiscovery,
        Stage::ObjectiveGeneration,
        Stage::AlertGeneration,
        Stage::AnalysisAndRecommendation,
        Stage::ValidationAndIntegration,
    ];

    pub fn first() -> Self {
        Stage::IndicatorDiscovery
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::IndicatorDiscovery => "indicator_discovery",
            Stage::ObjectiveGeneration => "objective_generation",
            Stage::AlertGeneration => "alert_generation",
            Stage::AnalysisAndRecommendation => "analysis_and_recommendation",
            Stage::ValidationAndIntegration => "validation_and_integration",
        }
    }

    /// 1-based position in the run.
    pub fn number(&self) -> usize {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .map_or(0, |i| i + 1)
    }

    /// `None` after the last stage (`Done`).
    pub fn next(&self) -> Option<Stage> {
        Self::ALL.get(self.number()).copied()
    }

    pub fn contract(&self) -> Contract {
        match self {
            Stage::IndicatorDiscovery => Contract::Indicators,
            Stage::ObjectiveGeneration => Contract::Objectives,
            Stage::AlertGeneration => Contract::Alerts,
            Stage::AnalysisAndRecommendation => Contract::Analysis,
            Stage::ValidationAndIntegration => Contract::Integrated,
        }
    }

    /// Fields whose earlier value this stage owns in the final merge.
    pub fn owned_fields(&self) -> &'static [DocumentField] {
        match self {
            Stage::IndicatorDiscovery => &[DocumentField::Indicators],
            Stage::ObjectiveGeneration => &[DocumentField::Objectives],
            Stage::AlertGeneration => &[DocumentField::Alerts],
            Stage::AnalysisAndRecommendation => {
                &[DocumentField::Suggestions, DocumentField::Explanation]
            }
            Stage::ValidationAndIntegration => &[],
        }
    }

    /// Accepts stage names, `stepN` and bare step numbers.
    pub fn from_name(name: &str) -> Result<Self> {
        let needle = name.trim().to_ascii_lowercase();
        let by_number = needle
            .strip_prefix("step")
            .unwrap_or(&needle)
            .trim_start_matches(['_', '-', ' '])
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| Self::ALL.get(i).copied());
        by_number
            .or_else(|| Self::ALL.into_iter().find(|s| s.name() == needle))
            .ok_or_else(|| SrexError::UnsupportedStage(name.to_string()))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_and_done() {
        let mut stage = Some(Stage::first());
        let mut seen = Vec::new();
        while let Some(s) = stage {
            seen.push(s);
            stage = s.next();
        }
        assert_eq!(seen, Stage::ALL);
        assert_eq!(Stage::ValidationAndIntegration.number(), 5);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Stage::from_name("step3").unwrap(), Stage::AlertGeneration);
        assert_eq!(Stage::from_name("2").unwrap(), Stage::ObjectiveGeneration);
        assert_eq!(
            Stage::from_name("analysis_and_recommendation").unwrap(),
            Stage::AnalysisAndRecommendation
        );
        assert!(Stage::from_name("step6").unwrap_err().is_configuration());
        assert!(Stage::from_name("step0").is_err());
    }

    #[test]
    fn test_contracts() {
        assert_eq!(Stage::IndicatorDiscovery.contract(), Contract::Indicators);
        assert_eq!(Stage::ValidationAndIntegration.contract(), Contract::Integrated);
        assert!(Stage::ValidationAndIntegration.owned_fields().is_empty());
    }
}
