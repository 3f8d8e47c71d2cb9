//! Live indicator readings merged into the context before stage 1.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{GenerationContext, IndicatorKind, LiveIndicator, Result, SrexError};

/// Kinds queried before the first stage.
pub const QUERIED_KINDS: [IndicatorKind; 3] = [
    IndicatorKind::Availability,
    IndicatorKind::Latency,
    IndicatorKind::Error,
];

#[async_trait]
pub trait IndicatorSource: Send + Sync {
    /// Current value of `kind` for `component`, if known.
    async fn query_indicator(
        &self,
        component: &str,
        kind: IndicatorKind,
        timeframe: &str,
    ) -> Result<Option<LiveIndicator>>;
}

/// Canonical lookup key, `<kind>_<component>`.
pub fn indicator_key(kind: IndicatorKind, component: &str) -> String {
    format!("{}_{}", kind, component)
}

#[derive(Debug, Deserialize)]
struct Reading {
    #[serde(default)]
    name: Option<String>,
    value: f64,
    #[serde(default)]
    unit: String,
}

/// Readings loaded once from a JSON file.
///
/// Accepts either a list of `{name, value, unit}` or a map of name to
/// `{value, unit}` / bare number.
#[derive(Debug, Clone, Default)]
pub struct StaticIndicatorSource {
    readings: BTreeMap<String, (f64, String)>,
}

impl StaticIndicatorSource {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let mut readings = BTreeMap::new();
        match value {
            Value::Array(list) => {
                for item in list {
                    let reading: Reading = serde_json::from_value(item)?;
                    let name = reading.name.ok_or_else(|| {
                        SrexError::Config("indicator reading without a name".to_string())
                    })?;
                    readings.insert(name, (reading.value, reading.unit));
                }
            }
            Value::Object(map) => {
                for (name, item) in map {
                    let reading = match item {
                        Value::Number(n) => (n.as_f64().unwrap_or_default(), String::new()),
                        other => {
                            let r: Reading = serde_json::from_value(other)?;
                            (r.value, r.unit)
                        }
                    };
                    readings.insert(name, reading);
                }
            }
            _ => {
                return Err(SrexError::Config(
                    "indicator file must hold a list or an object".to_string(),
                ))
            }
        }
        Ok(Self { readings })
    }

    pub fn with_reading(mut self, name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        self.readings.insert(name.into(), (value, unit.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[async_trait]
impl IndicatorSource for StaticIndicatorSource {
    async fn query_indicator(
        &self,
        component: &str,
        kind: IndicatorKind,
        _timeframe: &str,
    ) -> Result<Option<LiveIndicator>> {
        let key = indicator_key(kind, component);
        Ok(self.readings.get(&key).map(|(value, unit)| LiveIndicator {
            name: key.clone(),
            kind,
            value: *value,
            unit: unit.clone(),
            source: "static".to_string(),
        }))
    }
}

/// Query [`QUERIED_KINDS`] and attach whatever answers to the context.
///
/// A context that already carries readings is returned unchanged. Source
/// failures are logged and skipped.
pub async fn enrich_context(
    source: &dyn IndicatorSource,
    ctx: GenerationContext,
) -> GenerationContext {
    if !ctx.live_indicators.is_empty() {
        return ctx;
    }
    let mut live = Vec::new();
    for kind in QUERIED_KINDS {
        match source
            .query_indicator(&ctx.component, kind, &ctx.timeframe)
            .await
        {
            Ok(Some(reading)) => live.push(reading),
            Ok(None) => debug!(component = %ctx.component, %kind, "no live reading"),
            Err(e) => warn!(component = %ctx.component, %kind, error = %e, "indicator source failed"),
        }
    }
    ctx.with_live_indicators(live)
}
