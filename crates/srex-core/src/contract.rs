//! Named output contracts and the schema validator.
//!
//! Validation is diagnostic: it returns field-path/error pairs in a
//! [`ValidationResult`] and never mutates or rejects the document.
//! Checks run against the JSON value so documents that did not come out
//! of the normalizer (e.g. files handed to `srex validate`) can be checked
//! too.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{
    DocumentField, IndicatorKind, NormalizedDocument, Result, Severity, SrexError, TimeWindow,
};

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// An output contract, selected by stage or task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contract {
    Indicators,
    Objectives,
    Alerts,
    Analysis,
    Integrated,
}

impl Contract {
    pub const ALL: [Contract; 5] = [
        Contract::Indicators,
        Contract::Objectives,
        Contract::Alerts,
        Contract::Analysis,
        Contract::Integrated,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Contract::Indicators => "indicators",
            Contract::Objectives => "objectives",
            Contract::Alerts => "alerts",
            Contract::Analysis => "analysis",
            Contract::Integrated => "integrated",
        }
    }

    /// Look up a contract by name. `full` is accepted for `integrated`.
    pub fn by_name(name: &str) -> Result<Self> {
        let needle = name.trim().to_ascii_lowercase();
        if needle == "full" {
            return Ok(Contract::Integrated);
        }
        Self::ALL
            .into_iter()
            .find(|c| c.name() == needle)
            .ok_or_else(|| SrexError::UnknownContract(name.to_string()))
    }

    /// Fields a reply under this contract is expected to fill.
    pub fn focus(&self) -> &'static [DocumentField] {
        match self {
            Contract::Indicators => &[DocumentField::Indicators],
            Contract::Objectives => &[DocumentField::Objectives],
            Contract::Alerts => &[DocumentField::Alerts],
            Contract::Analysis => &[DocumentField::Suggestions, DocumentField::Explanation],
            Contract::Integrated => &DocumentField::ALL,
        }
    }

    /// Fields that must be non-empty for the document to pass.
    pub fn required_non_empty(&self) -> &'static [DocumentField] {
        match self {
            Contract::Indicators => &[DocumentField::Indicators],
            Contract::Objectives => &[DocumentField::Objectives],
            Contract::Alerts => &[DocumentField::Alerts],
            Contract::Analysis => &[DocumentField::Suggestions, DocumentField::Explanation],
            Contract::Integrated => &[
                DocumentField::Indicators,
                DocumentField::Objectives,
                DocumentField::Alerts,
                DocumentField::Explanation,
            ],
        }
    }

    pub fn validate(&self, doc: &NormalizedDocument) -> ValidationResult {
        match serde_json::to_value(doc) {
            Ok(value) => self.validate_value(&value),
            Err(e) => ValidationResult::from_errors(
                *self,
                BTreeMap::from([("$".to_string(), format!("not serializable: {e}"))]),
            ),
        }
    }

    pub fn validate_value(&self, value: &Value) -> ValidationResult {
        let mut errors = Errors::default();
        match value.as_object() {
            Some(root) => self.check_root(root, &mut errors),
            None => errors.add("$", "document must be an object"),
        }
        ValidationResult::from_errors(*self, errors.0)
    }

    fn check_root(&self, root: &Map<String, Value>, errors: &mut Errors) {
        for field in DocumentField::ALL {
            let key = field.key();
            let Some(value) = root.get(key) else {
                errors.add(key, "missing required field");
                continue;
            };
            if field == DocumentField::Explanation {
                if !value.is_string() {
                    errors.add(key, "must be a string");
                }
                continue;
            }
            let Some(items) = value.as_array() else {
                errors.add(key, "must be a list");
                continue;
            };
            for (i, item) in items.iter().enumerate() {
                let path = format!("{key}[{i}]");
                match item.as_object() {
                    Some(obj) => check_item(field, obj, &path, errors),
                    None => errors.add(&path, "must be an object"),
                }
            }
        }

        for field in self.required_non_empty() {
            let key = field.key();
            let empty = match root.get(key) {
                Some(Value::Array(items)) => items.is_empty(),
                Some(Value::String(text)) => text.trim().is_empty(),
                _ => continue,
            };
            if empty {
                errors.add(key, format!("must not be empty for contract {}", self.name()));
            }
        }

        if *self == Contract::Integrated {
            check_references(root, errors);
        }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Element checks
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Errors(BTreeMap<String, String>);

impl Errors {
    fn add(&mut self, path: &str, message: impl Into<String>) {
        self.0.entry(path.to_string()).or_insert_with(|| message.into());
    }
}

fn check_item(field: DocumentField, obj: &Map<String, Value>, path: &str, errors: &mut Errors) {
    match field {
        DocumentField::Indicators => {
            require_name(obj, "name", path, errors);
            require_string(obj, "description", path, errors);
            require_string(obj, "unit", path, errors);
            require_string(obj, "source", path, errors);
            require_string(obj, "metric", path, errors);
            require_enum(obj, "type", path, errors, |s| IndicatorKind::parse(s).is_some());
            if let Some(v) = obj.get("value") {
                if !v.is_number() && !v.is_null() {
                    errors.add(&format!("{path}.value"), "must be a number");
                }
            }
        }
        DocumentField::Objectives => {
            require_name(obj, "name", path, errors);
            require_string(obj, "description", path, errors);
            require_name(obj, "indicator", path, errors);
            match obj.get("target") {
                Some(v) if v.as_f64().is_some_and(f64::is_finite) => {}
                Some(_) => errors.add(&format!("{path}.target"), "must be a number"),
                None => errors.add(&format!("{path}.target"), "missing required field"),
            }
            require_enum(obj, "window", path, errors, |s| TimeWindow::parse(s).is_some());
        }
        DocumentField::Alerts => {
            require_name(obj, "name", path, errors);
            require_string(obj, "description", path, errors);
            require_enum(obj, "severity", path, errors, |s| Severity::parse(s).is_some());
            for key in ["expression", "for"] {
                if let Some(v) = obj.get(key) {
                    if !v.is_string() && !v.is_null() {
                        errors.add(&format!("{path}.{key}"), "must be a string");
                    }
                }
            }
        }
        DocumentField::Suggestions => {
            require_string(obj, "metric", path, errors);
            require_name(obj, "recommendation", path, errors);
        }
        DocumentField::Explanation => {}
    }
}

fn require_string(obj: &Map<String, Value>, key: &str, path: &str, errors: &mut Errors) {
    match obj.get(key) {
        Some(Value::String(_)) => {}
        Some(_) => errors.add(&format!("{path}.{key}"), "must be a string"),
        None => errors.add(&format!("{path}.{key}"), "missing required field"),
    }
}

fn require_name(obj: &Map<String, Value>, key: &str, path: &str, errors: &mut Errors) {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        Some(Value::String(_)) => errors.add(&format!("{path}.{key}"), "must not be empty"),
        Some(_) => errors.add(&format!("{path}.{key}"), "must be a string"),
        None => errors.add(&format!("{path}.{key}"), "missing required field"),
    }
}

fn require_enum(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    errors: &mut Errors,
    allowed: impl Fn(&str) -> bool,
) {
    match obj.get(key) {
        Some(Value::String(s)) if allowed(s) && s == s.trim() && s == &s.to_ascii_lowercase() => {}
        Some(other) => errors.add(
            &format!("{path}.{key}"),
            format!("{other} is not an allowed value"),
        ),
        None => errors.add(&format!("{path}.{key}"), "missing required field"),
    }
}

/// Every objective must reference an indicator present in the document.
fn check_references(root: &Map<String, Value>, errors: &mut Errors) {
    let names: BTreeSet<&str> = root
        .get("indicators")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|i| i.get("name").and_then(Value::as_str))
        .collect();
    let Some(objectives) = root.get("objectives").and_then(Value::as_array) else {
        return;
    };
    for (i, objective) in objectives.iter().enumerate() {
        if let Some(reference) = objective.get("indicator").and_then(Value::as_str) {
            if !reference.trim().is_empty() && !names.contains(reference) {
                errors.add(
                    &format!("objectives[{i}].indicator"),
                    format!("references unknown indicator {reference:?}"),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Pass/fail plus a field path -> error description map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub contract: Contract,
    pub valid: bool,
    pub errors: BTreeMap<String, String>,
}

impl ValidationResult {
    fn from_errors(contract: Contract, errors: BTreeMap<String, String>) -> Self {
        Self {
            contract,
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn passed(&self) -> bool {
        self.valid
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_document() -> Value {
        json!({
            "indicators": [{
                "name": "latency_api", "description": "p99", "type": "latency",
                "unit": "ms", "source": "prometheus", "metric": "http_request_duration_seconds"
            }],
            "objectives": [{
                "name": "latency", "description": "", "indicator": "latency_api",
                "target": 95.0, "window": "7d"
            }],
            "alerts": [{"name": "HighLatency", "description": "", "severity": "critical"}],
            "suggestions": [],
            "explanation": "Latency dominates user experience."
        })
    }

    #[test]
    fn test_by_name() {
        assert_eq!(Contract::by_name("Alerts").unwrap(), Contract::Alerts);
        assert_eq!(Contract::by_name("full").unwrap(), Contract::Integrated);
        let err = Contract::by_name("dashboards").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_full_document_passes_integrated() {
        let result = Contract::Integrated.validate_value(&full_document());
        assert!(result.passed(), "{:?}", result.errors);
    }

    #[test]
    fn test_enum_and_shape_errors_have_paths() {
        let mut doc = full_document();
        doc["indicators"][0]["type"] = json!("histogram");
        doc["alerts"] = json!({"0": {}});
        doc["objectives"][0]["target"] = json!("high");
        let result = Contract::Integrated.validate_value(&doc);
        assert!(!result.passed());
        assert!(result.errors.contains_key("indicators[0].type"));
        assert!(result.errors.contains_key("objectives[0].target"));
        assert_eq!(result.errors["alerts"], "must be a list");
    }

    #[test]
    fn test_unknown_indicator_reference() {
        let mut doc = full_document();
        doc["objectives"][0]["indicator"] = json!("throughput_api");
        let result = Contract::Integrated.validate_value(&doc);
        assert!(result.errors["objectives[0].indicator"].contains("throughput_api"));
        // Only the integrated contract cross-checks references.
        assert!(Contract::Objectives.validate_value(&doc).passed());
    }

    #[test]
    fn test_required_non_empty_per_contract() {
        let doc = NormalizedDocument::default();
        let result = Contract::Analysis.validate(&doc);
        assert!(result.errors.contains_key("suggestions"));
        assert!(result.errors.contains_key("explanation"));
        assert!(!Contract::Alerts.validate(&doc).errors.contains_key("suggestions"));
    }

    #[test]
    fn test_non_object_document() {
        let result = Contract::Alerts.validate_value(&json!([1, 2]));
        assert_eq!(result.errors["$"], "document must be an object");
    }
}
