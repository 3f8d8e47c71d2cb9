//! The strictly-typed output document and its item types.
//!
//! Wire shape (stable):
//!
//! ```text
//! indicators:  [{name, description, type, unit, source, metric, value?}]
//! objectives:  [{name, description, indicator, target, window}]
//! alerts:      [{name, description, severity, expression?, for?}]
//! suggestions: [{metric, recommendation}]
//! explanation: string
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Recommendation text substituted when no suggestion carries a numeric claim.
pub const PLACEHOLDER_RECOMMENDATION: &str = "No specific numeric recommendation was generated.";

/// Metric label of the placeholder suggestion.
pub const PLACEHOLDER_METRIC: &str = "unknown";

/// Kind of measurable signal an indicator tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Availability,
    Latency,
    Error,
    Throughput,
    Queue,
    Saturation,
    Utilization,
    Custom,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 8] = [
        IndicatorKind::Availability,
        IndicatorKind::Latency,
        IndicatorKind::Error,
        IndicatorKind::Throughput,
        IndicatorKind::Queue,
        IndicatorKind::Saturation,
        IndicatorKind::Utilization,
        IndicatorKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Availability => "availability",
            IndicatorKind::Latency => "latency",
            IndicatorKind::Error => "error",
            IndicatorKind::Throughput => "throughput",
            IndicatorKind::Queue => "queue",
            IndicatorKind::Saturation => "saturation",
            IndicatorKind::Utilization => "utilization",
            IndicatorKind::Custom => "custom",
        }
    }

    /// Exact (case-insensitive) match against the allowed set.
    pub fn parse(text: &str) -> Option<Self> {
        let needle = text.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.as_str() == needle)
    }

    /// Best-effort inference from free text such as a name or metric.
    ///
    /// `custom` is never inferred; callers fall back to it explicitly.
    pub fn infer(text: &str) -> Option<Self> {
        let lower = text.to_ascii_lowercase();
        if lower.contains("latency") || lower.contains("duration") || lower.contains("response_time") {
            Some(IndicatorKind::Latency)
        } else if lower.contains("error") || lower.contains("fail") {
            Some(IndicatorKind::Error)
        } else if lower.contains("avail") || lower.contains("uptime") {
            Some(IndicatorKind::Availability)
        } else if lower.contains("throughput") || lower.contains("rps") || lower.contains("requests_per") {
            Some(IndicatorKind::Throughput)
        } else if lower.contains("queue") {
            Some(IndicatorKind::Queue)
        } else if lower.contains("saturation") {
            Some(IndicatorKind::Saturation)
        } else if lower.contains("utilization") || lower.contains("usage") {
            Some(IndicatorKind::Utilization)
        } else {
            None
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Info, Severity::Warning, Severity::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let needle = text.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|s| s.as_str() == needle)
    }

    /// Maps vendor vocabulary (P1, sev1, page, high, low...) onto the allowed set.
    pub fn infer(text: &str) -> Option<Self> {
        let lower = text.to_ascii_lowercase();
        if lower.contains("crit") || lower.contains("page") || lower.contains("sev1") || lower.contains("high") || lower.contains("p1") {
            Some(Severity::Critical)
        } else if lower.contains("warn") || lower.contains("medium") || lower.contains("p2") {
            Some(Severity::Warning)
        } else if lower.contains("info") || lower.contains("low") || lower.contains("notice") {
            Some(Severity::Info)
        } else {
            None
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Objective evaluation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "90d")]
    NinetyDays,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [
        TimeWindow::SevenDays,
        TimeWindow::ThirtyDays,
        TimeWindow::NinetyDays,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::SevenDays => "7d",
            TimeWindow::ThirtyDays => "30d",
            TimeWindow::NinetyDays => "90d",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let needle = text.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|w| w.as_str() == needle)
    }

    /// Reads the leading day count out of text like `"30 days"` or `"7day"`.
    pub fn infer(text: &str) -> Option<Self> {
        let lower = text.trim().to_ascii_lowercase();
        let digits: String = lower.chars().take_while(|c| c.is_ascii_digit()).collect();
        let rest = lower[digits.len()..].trim_start();
        if !(rest.is_empty() || rest.starts_with('d')) {
            return None;
        }
        match digits.as_str() {
            "7" => Some(TimeWindow::SevenDays),
            "30" => Some(TimeWindow::ThirtyDays),
            "90" => Some(TimeWindow::NinetyDays),
            _ => None,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A measurable signal about a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// A target and window applied to an indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub indicator: String,
    pub target: f64,
    pub window: TimeWindow,
}

/// A rule that fires when an indicator breaches its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub for_duration: Option<String>,
}

/// A remediation suggestion tied to a metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub metric: String,
    pub recommendation: String,
}

impl Suggestion {
    pub fn placeholder() -> Self {
        Self {
            metric: PLACEHOLDER_METRIC.to_string(),
            recommendation: PLACEHOLDER_RECOMMENDATION.to_string(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.metric == PLACEHOLDER_METRIC && self.recommendation == PLACEHOLDER_RECOMMENDATION
    }

    /// A suggestion is machine-checkable when its recommendation names a number.
    pub fn has_numeric_claim(&self) -> bool {
        self.recommendation.chars().any(|c| c.is_ascii_digit())
    }
}

/// The five top-level fields of the output contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentField {
    Indicators,
    Objectives,
    Alerts,
    Suggestions,
    Explanation,
}

impl DocumentField {
    pub const ALL: [DocumentField; 5] = [
        DocumentField::Indicators,
        DocumentField::Objectives,
        DocumentField::Alerts,
        DocumentField::Suggestions,
        DocumentField::Explanation,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DocumentField::Indicators => "indicators",
            DocumentField::Objectives => "objectives",
            DocumentField::Alerts => "alerts",
            DocumentField::Suggestions => "suggestions",
            DocumentField::Explanation => "explanation",
        }
    }
}

/// Schema-conformant document produced by the normalizer.
///
/// # Invariants
///
/// Every list is present and is a sequence. Indicator, objective and alert
/// names are non-empty, and every enumerated field holds a member of its
/// allowed set (enforced by the types above).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedDocument {
    pub indicators: Vec<Indicator>,
    pub objectives: Vec<Objective>,
    pub alerts: Vec<Alert>,
    pub suggestions: Vec<Suggestion>,
    pub explanation: String,
}

impl NormalizedDocument {
    /// Suggestions other than the substituted placeholder.
    pub fn has_substantive_suggestions(&self) -> bool {
        self.suggestions.iter().any(|s| !s.is_placeholder())
    }

    /// Whether `field` carries no usable content.
    ///
    /// A suggestions list holding only the placeholder counts as empty.
    pub fn is_field_empty(&self, field: DocumentField) -> bool {
        match field {
            DocumentField::Indicators => self.indicators.is_empty(),
            DocumentField::Objectives => self.objectives.is_empty(),
            DocumentField::Alerts => self.alerts.is_empty(),
            DocumentField::Suggestions => !self.has_substantive_suggestions(),
            DocumentField::Explanation => self.explanation.trim().is_empty(),
        }
    }

    /// Copy `field` from `other` into `self`.
    pub fn take_field_from(&mut self, other: &NormalizedDocument, field: DocumentField) {
        match field {
            DocumentField::Indicators => self.indicators = other.indicators.clone(),
            DocumentField::Objectives => self.objectives = other.objectives.clone(),
            DocumentField::Alerts => self.alerts = other.alerts.clone(),
            DocumentField::Suggestions => self.suggestions = other.suggestions.clone(),
            DocumentField::Explanation => self.explanation = other.explanation.clone(),
        }
    }

    pub fn indicator_names(&self) -> impl Iterator<Item = &str> {
        self.indicators.iter().map(|i| i.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_kind_parse_and_infer() {
        assert_eq!(IndicatorKind::parse(" Latency "), Some(IndicatorKind::Latency));
        assert_eq!(IndicatorKind::parse("error_rate"), None);
        assert_eq!(IndicatorKind::infer("error_rate"), Some(IndicatorKind::Error));
        assert_eq!(IndicatorKind::infer("api_latency_p99"), Some(IndicatorKind::Latency));
        assert_eq!(IndicatorKind::infer("checkout_availability"), Some(IndicatorKind::Availability));
        assert_eq!(IndicatorKind::infer("widgets"), None);
    }

    #[test]
    fn test_severity_infer() {
        assert_eq!(Severity::infer("P1 page"), Some(Severity::Critical));
        assert_eq!(Severity::infer("Medium"), Some(Severity::Warning));
        assert_eq!(Severity::infer("low"), Some(Severity::Info));
        assert_eq!(Severity::infer("whatever"), None);
    }

    #[test]
    fn test_time_window_infer() {
        assert_eq!(TimeWindow::infer("30 days"), Some(TimeWindow::ThirtyDays));
        assert_eq!(TimeWindow::infer("7day"), Some(TimeWindow::SevenDays));
        assert_eq!(TimeWindow::infer("90"), Some(TimeWindow::NinetyDays));
        assert_eq!(TimeWindow::infer("14d"), None);
        assert_eq!(TimeWindow::infer("30 minutes"), None);
    }

    #[test]
    fn test_wire_shape() {
        let doc = NormalizedDocument {
            alerts: vec![Alert {
                name: "HighLatency".to_string(),
                description: String::new(),
                severity: Severity::Critical,
                expression: None,
                for_duration: Some("5m".to_string()),
            }],
            objectives: vec![Objective {
                name: "api latency".to_string(),
                description: String::new(),
                indicator: "latency_api".to_string(),
                target: 95.0,
                window: TimeWindow::SevenDays,
            }],
            ..Default::default()
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["alerts"][0]["for"], "5m");
        assert!(value["alerts"][0].get("expression").is_none());
        assert_eq!(value["alerts"][0]["severity"], "critical");
        assert_eq!(value["objectives"][0]["window"], "7d");
        assert!(value["indicators"].is_array());
    }

    #[test]
    fn test_placeholder_suggestion_counts_as_empty() {
        let mut doc = NormalizedDocument::default();
        assert!(doc.is_field_empty(DocumentField::Suggestions));
        doc.suggestions.push(Suggestion::placeholder());
        assert!(doc.is_field_empty(DocumentField::Suggestions));
        doc.suggestions.push(Suggestion {
            metric: "latency".to_string(),
            recommendation: "Lower the p99 budget to 250ms".to_string(),
        });
        assert!(!doc.is_field_empty(DocumentField::Suggestions));
    }
}
