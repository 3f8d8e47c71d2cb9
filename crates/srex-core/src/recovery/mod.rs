//! RecoveryParser: turns arbitrary model text into a loosely-typed tree.
//!
//! States, each a fallback from the previous one on parse failure:
//!
//! ```text
//! DirectParse -> ExtractThenParse -> RepairThenParse -> FragmentRebuild -> DefaultSynthesis
//! ```
//!
//! `DefaultSynthesis` is terminal and never fails, so [`RecoveryParser::recover`]
//! always returns a document. Schema problems are left to the normalizer
//! and the validator.

pub mod extract;
pub mod fallback;
pub mod fragment;
pub mod repair;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::contract::Contract;
use crate::domain::GenerationContext;

pub use extract::{extract_object, Extraction, Span, SpanMethod};
pub use fallback::synthesize_default;
pub use fragment::rebuild_fragments;
pub use repair::{RepairOutcome, RepairStep, StructuralRepairer};

/// Which state produced a [`RecoveredDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryStrategy {
    Direct,
    BraceBalanced,
    Sanitized,
    FragmentRebuilt,
    DefaultSynthesized,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::Direct => "direct",
            RecoveryStrategy::BraceBalanced => "brace-balanced",
            RecoveryStrategy::Sanitized => "sanitized",
            RecoveryStrategy::FragmentRebuilt => "fragment-rebuilt",
            RecoveryStrategy::DefaultSynthesized => "default-synthesized",
        }
    }

    /// Whether the tree came from the model rather than from placeholders.
    pub fn is_model_content(&self) -> bool {
        !matches!(self, RecoveryStrategy::DefaultSynthesized)
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loosely-typed tree extracted from raw output, tagged with its strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveredDocument {
    pub value: Value,
    pub strategy: RecoveryStrategy,
}

impl RecoveredDocument {
    fn new(value: Value, strategy: RecoveryStrategy) -> Self {
        Self { value, strategy }
    }
}

/// What the placeholder document should look like if everything fails.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryTarget<'a> {
    pub contract: Contract,
    pub ctx: &'a GenerationContext,
    /// Stage name, quoted in the placeholder explanation.
    pub label: &'a str,
}

#[derive(Debug, Clone)]
pub struct RecoveryParser {
    repairer: StructuralRepairer,
    max_placeholder_items: u32,
}

impl Default for RecoveryParser {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RecoveryParser {
    pub fn new(max_placeholder_items: u32) -> Self {
        Self {
            repairer: StructuralRepairer::new(),
            max_placeholder_items,
        }
    }

    /// `DirectParse`: the trimmed text is a JSON object as-is.
    pub fn parse_direct(&self, raw: &str) -> Option<Value> {
        serde_json::from_str::<Value>(raw.trim())
            .ok()
            .filter(Value::is_object)
    }

    /// Run every state in order; exactly one state's output is returned.
    pub fn recover(&self, raw: &str, target: RecoveryTarget<'_>) -> RecoveredDocument {
        if let Some(value) = self.parse_direct(raw) {
            return RecoveredDocument::new(value, RecoveryStrategy::Direct);
        }

        let span = match extract_object(raw) {
            Extraction::Found(span) => Some(span),
            Extraction::Conversational => {
                warn!(stage = target.label, "conversational reply, synthesizing defaults");
                return self.synthesize(target);
            }
            Extraction::NoObject => None,
        };

        if let Some(span) = span {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&span.text) {
                debug!(stage = target.label, method = ?span.method, "extracted object parsed");
                return RecoveredDocument::new(value, RecoveryStrategy::BraceBalanced);
            }

            let outcome = self.repairer.repair(&span.text);
            if let Some(value @ Value::Object(_)) = outcome.value {
                debug!(
                    stage = target.label,
                    steps = ?outcome.applied,
                    "repaired span parsed"
                );
                return RecoveredDocument::new(value, RecoveryStrategy::Sanitized);
            }
        }

        if let Some(value) = rebuild_fragments(raw) {
            warn!(stage = target.label, "rebuilt document from fragments");
            return RecoveredDocument::new(value, RecoveryStrategy::FragmentRebuilt);
        }

        warn!(stage = target.label, "no recoverable content, synthesizing defaults");
        self.synthesize(target)
    }

    fn synthesize(&self, target: RecoveryTarget<'_>) -> RecoveredDocument {
        RecoveredDocument::new(
            synthesize_default(
                target.contract,
                target.ctx,
                target.label,
                self.max_placeholder_items,
            ),
            RecoveryStrategy::DefaultSynthesized,
        )
    }
}
