//! Prompt rendering.
//!
//! The core only needs a prompt string per stage. [`InstructionRenderer`]
//! builds a terse JSON-only instruction; [`TemplateRenderer`] fills a
//! user-supplied template with the same pieces.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::contract::Contract;
use crate::domain::{
    DocumentField, GenerationContext, IndicatorKind, Result, Severity, SrexError, TimeWindow,
};

/// Appended to the prompt for the single retry after an unparseable reply.
pub const RETRY_INSTRUCTION: &str = "Return ONLY a valid JSON object with no explanation.";

static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}").expect("template variable pattern is valid"));

pub trait PromptRenderer: Send + Sync {
    fn render(&self, contract: Contract, ctx: &GenerationContext) -> Result<String>;
}

/// The prompt with the retry amendment appended.
pub fn with_retry_instruction(prompt: &str) -> String {
    format!("{}\n\n{RETRY_INSTRUCTION}", prompt.trim_end())
}

// ---------------------------------------------------------------------------
// Prompt pieces
// ---------------------------------------------------------------------------

fn task(contract: Contract, ctx: &GenerationContext) -> String {
    let q = &ctx.quantities;
    match contract {
        Contract::Indicators => format!(
            "Identify {} service level indicators for the component.",
            q.indicators
        ),
        Contract::Objectives => format!(
            "Define {} service level objectives for the indicators in the previous result.",
            q.objectives
        ),
        Contract::Alerts => format!(
            "Define {} alert rules that fire when the indicators breach their objectives.",
            q.alerts
        ),
        Contract::Analysis => format!(
            "Explain the main reliability risks and give {} remediation suggestions, each with a specific number.",
            q.suggestions
        ),
        Contract::Integrated => format!(
            "Produce {} indicators, {} objectives, {} alerts and {} suggestions (each with a specific number), plus an explanation.",
            q.indicators, q.objectives, q.alerts, q.suggestions
        ),
    }
}

fn field_shape(field: DocumentField) -> &'static str {
    match field {
        DocumentField::Indicators => {
            r#""indicators": [{"name": "", "description": "", "type": "", "unit": "", "source": "", "metric": "", "value": 0}]"#
        }
        DocumentField::Objectives => {
            r#""objectives": [{"name": "", "description": "", "indicator": "", "target": 99.9, "window": "30d"}]"#
        }
        DocumentField::Alerts => {
            r#""alerts": [{"name": "", "description": "", "severity": "warning", "expression": "", "for": "5m"}]"#
        }
        DocumentField::Suggestions => r#""suggestions": [{"metric": "", "recommendation": ""}]"#,
        DocumentField::Explanation => r#""explanation": """#,
    }
}

/// JSON skeleton of the fields a contract expects.
pub fn output_shape(contract: Contract) -> String {
    let mut fields: Vec<DocumentField> = contract.focus().to_vec();
    if !fields.contains(&DocumentField::Explanation) {
        fields.push(DocumentField::Explanation);
    }
    let body: Vec<&str> = fields.into_iter().map(field_shape).collect();
    format!("{{{}}}", body.join(", "))
}

fn allowed_values() -> String {
    let join = |items: Vec<&str>| items.join(", ");
    format!(
        "type: {}; severity: {}; window: {}",
        join(IndicatorKind::ALL.iter().map(|k| k.as_str()).collect()),
        join(Severity::ALL.iter().map(|s| s.as_str()).collect()),
        join(TimeWindow::ALL.iter().map(|w| w.as_str()).collect()),
    )
}

fn context_block(ctx: &GenerationContext) -> Result<String> {
    let mut out = String::new();
    if !ctx.live_indicators.is_empty() {
        out.push_str("Current readings:\n");
        for live in &ctx.live_indicators {
            let _ = writeln!(
                out,
                "- {} ({}): {} {}",
                live.name, live.kind, live.value, live.unit
            );
        }
    }
    if let Some(parent) = ctx.parent() {
        let _ = writeln!(
            out,
            "Previous result:\n{}",
            serde_json::to_string(parent)?
        );
    }
    Ok(out)
}

fn variables(contract: Contract, ctx: &GenerationContext) -> Result<BTreeMap<&'static str, String>> {
    Ok(BTreeMap::from([
        ("component", ctx.component.clone()),
        ("description", ctx.description.clone()),
        ("timeframe", ctx.timeframe.clone()),
        ("task", task(contract, ctx)),
        ("shape", output_shape(contract)),
        ("allowed", allowed_values()),
        ("context", context_block(ctx)?),
    ]))
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

/// Built-in JSON-only instruction.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstructionRenderer;

impl PromptRenderer for InstructionRenderer {
    fn render(&self, contract: Contract, ctx: &GenerationContext) -> Result<String> {
        let vars = variables(contract, ctx)?;
        let mut prompt = format!(
            "You are a site reliability engineer.\nComponent: {}\n",
            vars["component"]
        );
        if !ctx.description.trim().is_empty() {
            let _ = writeln!(prompt, "Description: {}", vars["description"]);
        }
        let _ = writeln!(prompt, "Timeframe: {}", vars["timeframe"]);
        let _ = writeln!(prompt, "Task: {}", vars["task"]);
        prompt.push_str(&vars["context"]);
        let _ = writeln!(prompt, "Allowed values: {}", vars["allowed"]);
        let _ = write!(
            prompt,
            "Respond with a single JSON object of this shape and nothing else:\n{}",
            vars["shape"]
        );
        Ok(prompt)
    }
}

/// Fills `{{ variable }}` slots in a user template.
///
/// Variables: `component`, `description`, `timeframe`, `task`, `shape`,
/// `allowed`, `context`. An unknown variable is a render error.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template: String,
}

impl TemplateRenderer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(std::fs::read_to_string(path)?))
    }
}

impl PromptRenderer for TemplateRenderer {
    fn render(&self, contract: Contract, ctx: &GenerationContext) -> Result<String> {
        let vars = variables(contract, ctx)?;
        if let Some(unknown) = VARIABLE
            .captures_iter(&self.template)
            .map(|c| c[1].to_string())
            .find(|name| !vars.contains_key(name.as_str()))
        {
            return Err(SrexError::Render(format!("unknown template variable {unknown:?}")));
        }
        Ok(VARIABLE
            .replace_all(&self.template, |c: &Captures<'_>| vars[&c[1]].clone())
            .into_owned())
    }
}
