//! ShapeNormalizer: untyped recovered tree -> [`NormalizedDocument`].
//!
//! Every rule is a pure function of the tree and the [`GenerationContext`].
//! Normalizing a normalized document (serialized back to a tree) yields
//! the same document.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::{
    Alert, GenerationContext, Indicator, IndicatorKind, NormalizedDocument, Objective, Severity,
    Suggestion, TimeWindow,
};

static TEMPLATE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[^{}]*\}\}").expect("template placeholder pattern is valid"));

const DEFAULT_SOURCE: &str = "prometheus";
const DEFAULT_TARGET: f64 = 99.0;
const DEFAULT_ALERT_NAME: &str = "unnamed-alert";
const DEFAULT_ALERT_FOR: &str = "5m";
const GENERAL_METRIC: &str = "general";
const UNKNOWN_INDICATOR: &str = "unknown";

// Top-level keys, canonical first.
const INDICATOR_KEYS: &[&str] = &["indicators", "sli", "slis"];
const OBJECTIVE_KEYS: &[&str] = &["objectives", "slo", "slos"];
const ALERT_KEYS: &[&str] = &["alerts"];
const SUGGESTION_KEYS: &[&str] = &["suggestions", "llm_suggestions", "recommendations"];

/// Normalize a recovered tree into the strict document.
pub fn normalize(recovered: &Value, ctx: &GenerationContext) -> NormalizedDocument {
    let tree = unfold_numeric_maps(recovered.clone());
    let empty = Map::new();
    let root = tree.as_object().unwrap_or(&empty);

    let mut indicators: Vec<Indicator> = items(first_present(root, INDICATOR_KEYS), false)
        .into_iter()
        .filter_map(|item| indicator(&item, ctx))
        .collect();
    for ind in &mut indicators {
        if let Some(live) = ctx.live_value(&ind.name) {
            ind.value = Some(live.value);
        }
    }

    let mut objectives: Vec<Objective> = items(first_present(root, OBJECTIVE_KEYS), false)
        .into_iter()
        .filter_map(|item| objective(&item, &indicators, ctx))
        .collect();
    if objectives.is_empty() {
        objectives = indicators.iter().map(default_objective).collect();
    }

    let mut alerts: Vec<Alert> = items(first_present(root, ALERT_KEYS), false)
        .into_iter()
        .filter_map(|item| alert(&item))
        .collect();
    if alerts.is_empty() {
        alerts = indicators.iter().map(default_alert).collect();
    }

    let raw_suggestions = items(first_present(root, SUGGESTION_KEYS), true);
    let offered = raw_suggestions.len();
    let mut suggestions: Vec<Suggestion> = raw_suggestions
        .into_iter()
        .filter_map(|item| suggestion(&item))
        .filter(Suggestion::has_numeric_claim)
        .collect();
    if suggestions.is_empty() && offered > 0 {
        suggestions.push(Suggestion::placeholder());
    }

    NormalizedDocument {
        indicators,
        objectives,
        alerts,
        suggestions,
        explanation: explanation(root.get("explanation")),
    }
}

/// Convert every object whose keys are all decimal digits into a list,
/// ordered by numeric key.
pub fn unfold_numeric_maps(value: Value) -> Value {
    match value {
        Value::Object(map) if is_numeric_map(&map) => {
            let mut entries: Vec<(u64, Value)> = map
                .into_iter()
                .map(|(k, v)| (k.parse().unwrap_or(u64::MAX), unfold_numeric_maps(v)))
                .collect();
            entries.sort_by_key(|(index, _)| *index);
            Value::Array(entries.into_iter().map(|(_, v)| v).collect())
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, unfold_numeric_maps(v)))
                .collect(),
        ),
        Value::Array(list) => Value::Array(list.into_iter().map(unfold_numeric_maps).collect()),
        other => other,
    }
}

fn is_numeric_map(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && map
            .keys()
            .all(|k| !k.is_empty() && k.bytes().all(|b| b.is_ascii_digit()))
}

fn first_present<'a>(root: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| root.get(*k))
        .find(|v| !v.is_null())
}

/// Strip unrendered `{{ placeholders }}` and surrounding whitespace.
///
/// Nested placeholders unwrap one level per pass, so passes repeat until
/// nothing matches.
pub fn clean_text(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = TEMPLATE_PLACEHOLDER.replace_all(&current, "");
        if next == current {
            break;
        }
        current = next.into_owned();
    }
    current.trim().to_string()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => clean_text(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One list element, seen through field aliases.
struct Item<'a> {
    fields: Option<&'a Map<String, Value>>,
    /// A bare string element.
    bare: Option<String>,
    /// Map key when the list arrived as a keyed map.
    key: Option<&'a str>,
}

impl<'a> Item<'a> {
    fn get(&self, names: &[&str]) -> Option<&'a Value> {
        let fields = self.fields?;
        names
            .iter()
            .filter_map(|n| fields.get(*n))
            .find(|v| !v.is_null())
    }

    fn text(&self, names: &[&str]) -> String {
        names
            .iter()
            .filter_map(|n| self.get(&[*n]))
            .map(value_text)
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }

    fn number(&self, names: &[&str]) -> Option<f64> {
        self.get(names).and_then(value_number)
    }

    fn fallback_name(&self) -> Option<String> {
        self.bare
            .clone()
            .or_else(|| self.key.map(clean_text))
            .filter(|s| !s.is_empty())
    }
}

/// Explode a list-ish value into items.
///
/// Objects holding only objects are keyed maps (`{"latency": {...}}`); with
/// `string_maps`, objects holding only strings are too. Any other object is
/// a single item.
fn items(value: Option<&Value>, string_maps: bool) -> Vec<Item<'_>> {
    match value {
        Some(Value::Array(list)) => list.iter().filter_map(single_item).collect(),
        Some(Value::Object(map)) if is_keyed_map(map, string_maps) => map
            .iter()
            .filter_map(|(k, v)| {
                single_item(v).map(|mut item| {
                    item.key = Some(k.as_str());
                    item
                })
            })
            .collect(),
        Some(other) => single_item(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn single_item(value: &Value) -> Option<Item<'_>> {
    match value {
        Value::Object(map) => Some(Item {
            fields: Some(map),
            bare: None,
            key: None,
        }),
        Value::String(s) => Some(Item {
            fields: None,
            bare: Some(clean_text(s)).filter(|s| !s.is_empty()),
            key: None,
        }),
        _ => None,
    }
}

fn is_keyed_map(map: &Map<String, Value>, string_maps: bool) -> bool {
    !map.is_empty()
        && (map.values().all(Value::is_object)
            || (string_maps
                && map.values().all(Value::is_string)
                && !map.contains_key("recommendation")
                && !map.contains_key("metric")))
}

fn indicator(item: &Item<'_>, ctx: &GenerationContext) -> Option<Indicator> {
    if item.fields.is_none() && item.bare.is_none() {
        return None;
    }
    let raw_name = item.text(&["name", "id"]);
    let metric = item.text(&["metric", "query"]);
    let type_text = item.text(&["type", "kind"]);

    let kind = IndicatorKind::parse(&type_text)
        .or_else(|| IndicatorKind::infer(&type_text))
        .or_else(|| IndicatorKind::infer(&raw_name))
        .or_else(|| item.fallback_name().as_deref().and_then(IndicatorKind::infer))
        .or_else(|| IndicatorKind::infer(&metric))
        .unwrap_or(IndicatorKind::Custom);

    let name = Some(raw_name)
        .filter(|s| !s.is_empty())
        .or_else(|| item.fallback_name())
        .or_else(|| Some(metric.clone()).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| format!("{}_{}", kind, ctx.component));

    let source = item.text(&["source", "datasource"]);
    Some(Indicator {
        name,
        description: item.text(&["description", "desc"]),
        kind,
        unit: item.text(&["unit", "units"]),
        source: if source.is_empty() {
            DEFAULT_SOURCE.to_string()
        } else {
            source
        },
        metric,
        value: item.number(&["value", "current_value", "current"]),
    })
}

fn objective(
    item: &Item<'_>,
    indicators: &[Indicator],
    ctx: &GenerationContext,
) -> Option<Objective> {
    item.fields?;
    let reference = match item.get(&["indicator", "sli", "indicator_name"]) {
        Some(Value::Array(list)) => list.first().map(value_text).unwrap_or_default(),
        Some(v) => value_text(v),
        None => String::new(),
    };
    let indicator = if reference.is_empty() {
        indicators
            .first()
            .map(|i| i.name.clone())
            .or_else(|| ctx.parent().and_then(|p| p.indicators.first()).map(|i| i.name.clone()))
            .unwrap_or_else(|| UNKNOWN_INDICATOR.to_string())
    } else {
        reference
    };

    let referenced = indicators.iter().find(|i| i.name == indicator);
    let target = item.number(&["target", "objective", "goal"]).unwrap_or_else(|| {
        referenced
            .map(|i| default_target(i.kind, i.value).0)
            .unwrap_or(DEFAULT_TARGET)
    });

    let window_text = item.text(&["window", "time_window", "period"]);
    let window = TimeWindow::parse(&window_text)
        .or_else(|| TimeWindow::infer(&window_text))
        .unwrap_or(TimeWindow::ThirtyDays);

    let name = Some(item.text(&["name"]))
        .filter(|s| !s.is_empty())
        .or_else(|| item.fallback_name())
        .unwrap_or_else(|| format!("{indicator}_objective"));

    Some(Objective {
        name,
        description: item.text(&["description", "desc"]),
        indicator,
        target,
        window,
    })
}

fn alert(item: &Item<'_>) -> Option<Alert> {
    if item.fields.is_none() && item.bare.is_none() {
        return None;
    }
    let severity_text = item.text(&["severity", "level", "priority"]);
    let severity = Severity::parse(&severity_text)
        .or_else(|| Severity::infer(&severity_text))
        .unwrap_or(Severity::Warning);

    let name = Some(item.text(&["name", "alert", "alertname"]))
        .filter(|s| !s.is_empty())
        .or_else(|| item.fallback_name())
        .unwrap_or_else(|| DEFAULT_ALERT_NAME.to_string());

    let optional = |names: &[&str]| Some(item.text(names)).filter(|s| !s.is_empty());
    Some(Alert {
        name,
        description: item.text(&["description", "summary"]),
        severity,
        expression: optional(&["expression", "expr"]),
        for_duration: optional(&["for", "duration"]),
    })
}

fn suggestion(item: &Item<'_>) -> Option<Suggestion> {
    let recommendation = match &item.bare {
        Some(text) => text.clone(),
        None => item.text(&["recommendation", "suggestion", "text", "description"]),
    };
    if recommendation.is_empty() {
        return None;
    }
    let metric = Some(item.text(&["metric", "indicator"]))
        .filter(|s| !s.is_empty())
        .or_else(|| item.key.map(clean_text).filter(|s| !s.is_empty()))
        .unwrap_or_else(|| GENERAL_METRIC.to_string());
    Some(Suggestion {
        metric,
        recommendation,
    })
}

fn explanation(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => clean_text(s),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(Value::as_str)
            .map(clean_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Synthesized defaults
// ---------------------------------------------------------------------------

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Default percentage target and window for an indicator kind.
pub fn default_target(kind: IndicatorKind, value: Option<f64>) -> (f64, TimeWindow) {
    match kind {
        IndicatorKind::Availability => (99.9, TimeWindow::ThirtyDays),
        IndicatorKind::Latency => (95.0, TimeWindow::SevenDays),
        IndicatorKind::Error => (99.0, TimeWindow::ThirtyDays),
        IndicatorKind::Queue => (90.0, TimeWindow::SevenDays),
        IndicatorKind::Saturation => (85.0, TimeWindow::SevenDays),
        IndicatorKind::Utilization => (80.0, TimeWindow::SevenDays),
        IndicatorKind::Throughput | IndicatorKind::Custom => {
            (round2(value.unwrap_or(100.0) * 0.8), TimeWindow::SevenDays)
        }
    }
}

fn default_objective(ind: &Indicator) -> Objective {
    let (target, window) = default_target(ind.kind, ind.value);
    Objective {
        name: format!("{}_objective", ind.name),
        description: format!("Default {} objective for {}", ind.kind, ind.name),
        indicator: ind.name.clone(),
        target,
        window,
    }
}

/// Comparator and threshold a default alert fires on.
fn alert_threshold(kind: IndicatorKind, value: Option<f64>) -> (&'static str, f64) {
    match kind {
        IndicatorKind::Availability => ("<", 99.9),
        IndicatorKind::Latency => (">", value.map(|v| round2(v * 1.5)).unwrap_or(500.0)),
        IndicatorKind::Error => (">", 1.0),
        IndicatorKind::Throughput => ("<", round2(value.unwrap_or(100.0) * 0.8)),
        IndicatorKind::Queue => (">", value.map(|v| round2(v * 2.0)).unwrap_or(1000.0)),
        IndicatorKind::Saturation => (">", 85.0),
        IndicatorKind::Utilization => (">", 80.0),
        IndicatorKind::Custom => (">", value.map(|v| round2(v * 1.2)).unwrap_or(100.0)),
    }
}

fn default_alert(ind: &Indicator) -> Alert {
    let (op, threshold) = alert_threshold(ind.kind, ind.value);
    Alert {
        name: format!("{}_breach", ind.name),
        description: format!(
            "{} {op} {threshold} for {DEFAULT_ALERT_FOR}",
            ind.name
        ),
        severity: Severity::Warning,
        expression: (!ind.metric.is_empty()).then(|| format!("{} {op} {threshold}", ind.metric)),
        for_duration: Some(DEFAULT_ALERT_FOR.to_string()),
    }
}
