//! Inputs controlling one generation stage.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::document::{IndicatorKind, NormalizedDocument};
use crate::domain::error::{Result, SrexError};

/// Upper bound on any requested quantity.
pub const MAX_QUANTITY: u32 = 50;

/// Requested item counts per artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quantities {
    pub indicators: u32,
    pub objectives: u32,
    pub alerts: u32,
    pub suggestions: u32,
}

impl Default for Quantities {
    fn default() -> Self {
        Self {
            indicators: 5,
            objectives: 3,
            alerts: 3,
            suggestions: 5,
        }
    }
}

/// A live reading supplied by an [`IndicatorSource`](crate::indicators::IndicatorSource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveIndicator {
    pub name: String,
    pub kind: IndicatorKind,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub source: String,
}

/// Inputs for a single stage.
///
/// Immutable once handed to a stage: the `with_*` methods return a new
/// context and the parent document is shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    pub component: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantities: Quantities,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default)]
    pub live_indicators: Vec<LiveIndicator>,
    #[serde(skip)]
    parent: Option<Arc<NormalizedDocument>>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeframe() -> String {
    "3m".to_string()
}

impl GenerationContext {
    pub fn new(component: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            description: description.into(),
            quantities: Quantities::default(),
            temperature: default_temperature(),
            timeframe: default_timeframe(),
            live_indicators: Vec::new(),
            parent: None,
        }
    }

    pub fn with_quantities(mut self, quantities: Quantities) -> Self {
        self.quantities = quantities;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_live_indicators(mut self, live: Vec<LiveIndicator>) -> Self {
        self.live_indicators = live;
        self
    }

    /// Attach the result set of the preceding stage.
    pub fn with_parent(mut self, parent: NormalizedDocument) -> Self {
        self.parent = Some(Arc::new(parent));
        self
    }

    pub fn parent(&self) -> Option<&NormalizedDocument> {
        self.parent.as_deref()
    }

    /// Reject contexts that cannot produce a meaningful request.
    pub fn validate(&self) -> Result<()> {
        if self.component.trim().is_empty() {
            return Err(SrexError::InvalidContext(
                "component name must not be empty".to_string(),
            ));
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(SrexError::InvalidContext(format!(
                "temperature {} outside 0.0..=2.0",
                self.temperature
            )));
        }
        let q = &self.quantities;
        for (label, n) in [
            ("indicators", q.indicators),
            ("objectives", q.objectives),
            ("alerts", q.alerts),
            ("suggestions", q.suggestions),
        ] {
            if n > MAX_QUANTITY {
                return Err(SrexError::InvalidContext(format!(
                    "{label} quantity {n} exceeds {MAX_QUANTITY}"
                )));
            }
        }
        Ok(())
    }

    pub fn live_value(&self, indicator_name: &str) -> Option<&LiveIndicator> {
        self.live_indicators
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(indicator_name))
    }
}
