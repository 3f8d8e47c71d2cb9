//! Terminal recovery state: a deterministic placeholder document.

use serde_json::{json, Value};

use crate::contract::Contract;
use crate::domain::{DocumentField, GenerationContext, NormalizedDocument, Suggestion};

/// Prefix carried by every synthesized item name.
pub const PLACEHOLDER_PREFIX: &str = "placeholder_";

const FALLBACK_EXPLANATION_PREFIX: &str = "Unable to parse model output for stage ";

/// Explanation attached to a synthesized document.
pub fn fallback_explanation(label: &str) -> String {
    format!("{FALLBACK_EXPLANATION_PREFIX}{label}; placeholder content was synthesized.")
}

/// Whether `field` is non-empty and holds nothing but synthesized placeholders.
pub fn is_synthesized(doc: &NormalizedDocument, field: DocumentField) -> bool {
    fn all_placeholders<'a>(mut names: impl ExactSizeIterator<Item = &'a str>) -> bool {
        names.len() > 0 && names.all(|name| name.starts_with(PLACEHOLDER_PREFIX))
    }
    match field {
        DocumentField::Indicators => all_placeholders(doc.indicators.iter().map(|i| i.name.as_str())),
        DocumentField::Objectives => all_placeholders(doc.objectives.iter().map(|o| o.name.as_str())),
        DocumentField::Alerts => all_placeholders(doc.alerts.iter().map(|a| a.name.as_str())),
        DocumentField::Suggestions => {
            !doc.suggestions.is_empty() && doc.suggestions.iter().all(Suggestion::is_placeholder)
        }
        DocumentField::Explanation => doc.explanation.starts_with(FALLBACK_EXPLANATION_PREFIX),
    }
}

/// Build the placeholder tree for `contract`.
///
/// List sizes follow the context's quantities, clamped to `max_items`.
/// Objectives reference the parent's indicators when there are any.
pub fn synthesize_default(
    contract: Contract,
    ctx: &GenerationContext,
    label: &str,
    max_items: u32,
) -> Value {
    let clamp = |n: u32| n.min(max_items) as usize;
    let q = &ctx.quantities;
    let focus = contract.focus();
    let wants = |field: DocumentField| focus.contains(&field);

    let indicators: Vec<Value> = if wants(DocumentField::Indicators) {
        (1..=clamp(q.indicators))
            .map(|i| {
                json!({
                    "name": format!("{PLACEHOLDER_PREFIX}indicator_{i}"),
                    "description": "Placeholder indicator; the model reply could not be parsed.",
                    "type": "custom",
                    "unit": "",
                    "source": "prometheus",
                    "metric": "",
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut references: Vec<String> = indicators
        .iter()
        .filter_map(|i| i["name"].as_str().map(str::to_string))
        .collect();
    if references.is_empty() {
        if let Some(parent) = ctx.parent() {
            references = parent.indicator_names().map(str::to_string).collect();
        }
    }

    let objectives: Vec<Value> = if wants(DocumentField::Objectives) {
        (1..=clamp(q.objectives))
            .map(|i| {
                let indicator = if references.is_empty() {
                    format!("{PLACEHOLDER_PREFIX}indicator_{i}")
                } else {
                    references[(i - 1) % references.len()].clone()
                };
                json!({
                    "name": format!("{PLACEHOLDER_PREFIX}objective_{i}"),
                    "description": "Placeholder objective; the model reply could not be parsed.",
                    "indicator": indicator,
                    "target": 99.0,
                    "window": "30d",
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    let alerts: Vec<Value> = if wants(DocumentField::Alerts) {
        (1..=clamp(q.alerts))
            .map(|i| {
                json!({
                    "name": format!("{PLACEHOLDER_PREFIX}alert_{i}"),
                    "description": "Placeholder alert; the model reply could not be parsed.",
                    "severity": "warning",
                })
            })
            .collect()
    } else {
        Vec::new()
    };

    let suggestions: Vec<Value> = if wants(DocumentField::Suggestions) && q.suggestions > 0 {
        let placeholder = Suggestion::placeholder();
        vec![json!({
            "metric": placeholder.metric,
            "recommendation": placeholder.recommendation,
        })]
    } else {
        Vec::new()
    };

    json!({
        "indicators": indicators,
        "objectives": objectives,
        "alerts": alerts,
        "suggestions": suggestions,
        "explanation": fallback_explanation(label),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Indicator, IndicatorKind, NormalizedDocument, Quantities};

    #[test]
    fn test_sizes_are_clamped() {
        let ctx = GenerationContext::new("api", "").with_quantities(Quantities {
            indicators: 10,
            objectives: 2,
            alerts: 0,
            suggestions: 5,
        });
        let value = synthesize_default(Contract::Integrated, &ctx, "integrated", 3);
        assert_eq!(value["indicators"].as_array().unwrap().len(), 3);
        assert_eq!(value["objectives"].as_array().unwrap().len(), 2);
        assert!(value["alerts"].as_array().unwrap().is_empty());
        assert_eq!(value["suggestions"].as_array().unwrap().len(), 1);
        assert_eq!(value["objectives"][1]["indicator"], "placeholder_indicator_2");
    }

    #[test]
    fn test_focus_limits_lists() {
        let ctx = GenerationContext::new("api", "");
        let value = synthesize_default(Contract::Alerts, &ctx, "alert_generation", 3);
        assert!(value["indicators"].as_array().unwrap().is_empty());
        assert_eq!(value["alerts"].as_array().unwrap().len(), 3);
        assert!(value["explanation"]
            .as_str()
            .unwrap()
            .contains("alert_generation"));
    }

    #[test]
    fn test_is_synthesized_after_normalization() {
        let ctx = GenerationContext::new("api", "");
        let value = synthesize_default(Contract::Integrated, &ctx, "integrated", 3);
        let doc = crate::normalize::normalize(&value, &ctx);
        for field in DocumentField::ALL {
            assert!(is_synthesized(&doc, field), "{field:?}");
        }
        assert!(!is_synthesized(&NormalizedDocument::default(), DocumentField::Indicators));

        let mut mixed = doc.clone();
        mixed.alerts[0].name = "ApiDown".to_string();
        assert!(!is_synthesized(&mixed, DocumentField::Alerts));
    }

    #[test]
    fn test_is_deterministic() {
        let ctx = GenerationContext::new("api", "");
        assert_eq!(
            synthesize_default(Contract::Integrated, &ctx, "x", 3),
            synthesize_default(Contract::Integrated, &ctx, "x", 3)
        );
    }

    #[test]
    fn test_objectives_reference_parent_indicators() {
        let parent = NormalizedDocument {
            indicators: vec![Indicator {
                name: "latency_api".to_string(),
                description: String::new(),
                kind: IndicatorKind::Latency,
                unit: "ms".to_string(),
                source: "prometheus".to_string(),
                metric: String::new(),
                value: None,
            }],
            ..Default::default()
        };
        let ctx = GenerationContext::new("api", "").with_parent(parent);
        let value = synthesize_default(Contract::Objectives, &ctx, "objective_generation", 3);
        for objective in value["objectives"].as_array().unwrap() {
            assert_eq!(objective["indicator"], "latency_api");
        }
    }
}
