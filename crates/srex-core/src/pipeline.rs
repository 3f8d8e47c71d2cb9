//! PipelineOrchestrator: five stages in strict order, results threaded
//! forward, then merged into one integrated document.
//!
//! ```text
//! IndicatorDiscovery -> ObjectiveGeneration -> AlertGeneration
//!     -> AnalysisAndRecommendation -> ValidationAndIntegration -> Done
//! ```
//!
//! A transport/timeout failure in any stage aborts the run. Every other
//! problem is absorbed by recovery and reported through confidence and
//! validation.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::SrexConfig;
use crate::confidence::ConfidenceScore;
use crate::contract::{Contract, ValidationResult};
use crate::domain::{DocumentField, GenerationContext, NormalizedDocument, Result};
use crate::generator::TextGenerator;
use crate::indicators::{enrich_context, IndicatorSource};
use crate::metrics::METRICS;
use crate::obs;
use crate::observer::{NoopObserver, StageObserver};
use crate::prompt::{InstructionRenderer, PromptRenderer};
use crate::recovery::fallback::is_synthesized;
use crate::runner::{elapsed_ms, GenerationOutcome, StageRunner};
use crate::stage::Stage;

/// One completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStepResult {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: GenerationOutcome,
}

impl PipelineStepResult {
    pub fn document(&self) -> &NormalizedDocument {
        &self.outcome.document
    }
}

/// A complete five-stage run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub component: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<PipelineStepResult>,
    pub final_document: NormalizedDocument,
    pub confidence: ConfidenceScore,
    pub validation: ValidationResult,
}

impl PipelineRun {
    pub fn step(&self, stage: Stage) -> Option<&PipelineStepResult> {
        self.steps.iter().find(|s| s.stage == stage)
    }
}

/// A one-stage run under a single contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleRun {
    pub run_id: Uuid,
    pub component: String,
    pub contract: Contract,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: GenerationOutcome,
}

pub struct PipelineOrchestrator {
    runner: StageRunner,
    observer: Arc<dyn StageObserver>,
    indicators: Option<Arc<dyn IndicatorSource>>,
}

impl PipelineOrchestrator {
    /// Orchestrator with the built-in renderer and no observer.
    pub fn new(generator: Arc<dyn TextGenerator>, config: &SrexConfig) -> Self {
        Self {
            runner: StageRunner::new(generator, Arc::new(InstructionRenderer), config),
            observer: Arc::new(NoopObserver),
            indicators: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.runner = self.runner.with_renderer(renderer);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_indicator_source(mut self, source: Arc<dyn IndicatorSource>) -> Self {
        self.indicators = Some(source);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.runner = self.runner.with_model(model);
        self
    }

    pub fn runner(&self) -> &StageRunner {
        &self.runner
    }

    /// Run all five stages.
    pub async fn run(&self, ctx: GenerationContext) -> Result<PipelineRun> {
        ctx.validate()?;
        let run_id = Uuid::new_v4();
        let span = obs::run_span(&run_id.to_string());
        self.run_stages(run_id, ctx).instrument(span).await
    }

    async fn run_stages(&self, run_id: Uuid, ctx: GenerationContext) -> Result<PipelineRun> {
        let id = run_id.to_string();
        let started_at = Utc::now();
        let start = Instant::now();
        obs::emit_run_started(&id, &ctx.component, "pipeline");

        let ctx = self.enrich(ctx).await;
        let mut steps: Vec<PipelineStepResult> = Vec::with_capacity(Stage::ALL.len());
        // Latest document with empty fields back-filled from earlier stages.
        let mut carried: Option<NormalizedDocument> = None;
        let mut stage = Some(Stage::first());

        while let Some(current) = stage {
            self.observer.on_stage_started(&run_id, current);
            obs::emit_stage_started(&id, current.name(), current.number());

            let stage_ctx = match &carried {
                Some(parent) => ctx.clone().with_parent(parent.clone()),
                None => ctx.clone(),
            };
            let outcome = match self
                .runner
                .run(&id, current.name(), current.contract(), &stage_ctx)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    obs::emit_run_failed(&id, current.name(), &e);
                    return Err(e);
                }
            };

            carried = Some(match carried {
                Some(previous) => back_fill(&outcome.document, &previous),
                None => outcome.document.clone(),
            });
            let step = PipelineStepResult {
                stage: current,
                outcome,
            };
            self.observer.on_stage_completed(&run_id, &step);
            steps.push(step);
            stage = current.next();
        }

        let final_document = integrate(&steps);
        let confidence = self.runner.scorer().score(&final_document, &ctx);
        let validation = Contract::Integrated.validate(&final_document);
        self.report_final(&id, confidence, &validation);

        let run = PipelineRun {
            run_id,
            component: ctx.component.clone(),
            started_at,
            finished_at: Utc::now(),
            steps,
            final_document,
            confidence,
            validation,
        };
        obs::emit_run_finished(
            &id,
            elapsed_ms(start),
            run.steps.len(),
            confidence.value(),
            run.validation.passed(),
        );
        self.observer.on_run_completed(&run);
        METRICS.flush();
        Ok(run)
    }

    /// Run one stage under `contract` without threading.
    pub async fn run_single(&self, ctx: GenerationContext, contract: Contract) -> Result<SingleRun> {
        ctx.validate()?;
        let run_id = Uuid::new_v4();
        let id = run_id.to_string();
        let span = obs::run_span(&id);
        async move {
            let started_at = Utc::now();
            obs::emit_run_started(&id, &ctx.component, "single");
            let ctx = self.enrich(ctx).await;
            let outcome = match self.runner.run(&id, contract.name(), contract, &ctx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    obs::emit_run_failed(&id, contract.name(), &e);
                    return Err(e);
                }
            };
            obs::emit_run_finished(
                &id,
                outcome.duration_ms,
                1,
                outcome.confidence.value(),
                outcome.validation.passed(),
            );
            let run = SingleRun {
                run_id,
                component: ctx.component.clone(),
                contract,
                started_at,
                finished_at: Utc::now(),
                outcome,
            };
            self.observer.on_single_completed(&run);
            METRICS.flush();
            Ok(run)
        }
        .instrument(span)
        .await
    }

    async fn enrich(&self, ctx: GenerationContext) -> GenerationContext {
        match &self.indicators {
            Some(source) => enrich_context(source.as_ref(), ctx).await,
            None => ctx,
        }
    }

    fn report_final(&self, run_id: &str, confidence: ConfidenceScore, validation: &ValidationResult) {
        let label = "final";
        if !validation.passed() {
            METRICS.inc_validation_failures();
            obs::emit_stage_validation_failed(
                run_id,
                label,
                validation.contract.name(),
                validation.error_count(),
            );
        }
        let threshold = self.runner.low_confidence_threshold();
        if confidence.value() < threshold {
            obs::emit_confidence_low(run_id, label, confidence.value(), threshold);
        }
    }
}

/// `doc` with each empty field taken from `earlier`.
pub fn back_fill(doc: &NormalizedDocument, earlier: &NormalizedDocument) -> NormalizedDocument {
    let mut merged = doc.clone();
    for field in DocumentField::ALL {
        if merged.is_field_empty(field) && !earlier.is_field_empty(field) {
            merged.take_field_from(earlier, field);
        }
    }
    merged
}

/// Merge the terminal stage's document with earlier results.
///
/// Per field: the owning stage's value when non-empty, else the terminal
/// stage's value when non-empty, else the first non-empty earlier value.
/// Placeholder-only values are passed over while any stage holds model
/// content for the field.
pub fn integrate(steps: &[PipelineStepResult]) -> NormalizedDocument {
    let Some(last) = steps.last() else {
        return NormalizedDocument::default();
    };
    let mut merged = last.document().clone();

    for field in DocumentField::ALL {
        let source = pick_source(steps, field, |d| {
            !d.is_field_empty(field) && !is_synthesized(d, field)
        })
        .or_else(|| pick_source(steps, field, |d| !d.is_field_empty(field)));
        if let Some(source) = source {
            merged.take_field_from(source, field);
        }
    }
    merged
}

fn pick_source<'a>(
    steps: &'a [PipelineStepResult],
    field: DocumentField,
    usable: impl Fn(&NormalizedDocument) -> bool,
) -> Option<&'a NormalizedDocument> {
    let documents = || steps.iter().map(PipelineStepResult::document);
    let owner = steps
        .iter()
        .find(|s| s.stage.owned_fields().contains(&field))
        .map(PipelineStepResult::document);
    owner
        .filter(|d| usable(d))
        .or_else(|| documents().last().filter(|d| usable(d)))
        .or_else(|| documents().find(|d| usable(d)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Alert, Severity, Suggestion};
    use crate::recovery::RecoveryStrategy;

    fn step(stage: Stage, document: NormalizedDocument) -> PipelineStepResult {
        PipelineStepResult {
            stage,
            outcome: GenerationOutcome {
                validation: stage.contract().validate(&document),
                document,
                raw_output: String::new(),
                raw_digest: String::new(),
                strategy: RecoveryStrategy::Direct,
                retried: false,
                confidence: ConfidenceScore::new(100),
                duration_ms: 0,
            },
        }
    }

    fn alert(name: &str) -> Alert {
        Alert {
            name: name.to_string(),
            description: String::new(),
            severity: Severity::Critical,
            expression: None,
            for_duration: None,
        }
    }

    #[test]
    fn test_back_fill() {
        let earlier = NormalizedDocument {
            alerts: vec![alert("a")],
            explanation: "earlier".to_string(),
            ..Default::default()
        };
        let doc = NormalizedDocument {
            explanation: "now".to_string(),
            ..Default::default()
        };
        let merged = back_fill(&doc, &earlier);
        assert_eq!(merged.alerts, earlier.alerts);
        assert_eq!(merged.explanation, "now");
    }

    #[test]
    fn test_owner_stage_wins_over_terminal_stage() {
        let steps = vec![
            step(Stage::IndicatorDiscovery, NormalizedDocument::default()),
            step(Stage::ObjectiveGeneration, NormalizedDocument::default()),
            step(
                Stage::AlertGeneration,
                NormalizedDocument {
                    alerts: vec![alert("from-stage-3")],
                    ..Default::default()
                },
            ),
            step(
                Stage::AnalysisAndRecommendation,
                NormalizedDocument {
                    suggestions: vec![Suggestion::placeholder()],
                    ..Default::default()
                },
            ),
            step(
                Stage::ValidationAndIntegration,
                NormalizedDocument {
                    alerts: vec![alert("from-stage-5")],
                    suggestions: vec![Suggestion {
                        metric: "latency".to_string(),
                        recommendation: "p99 under 300ms".to_string(),
                    }],
                    explanation: "final".to_string(),
                    ..Default::default()
                },
            ),
        ];
        let merged = integrate(&steps);
        assert_eq!(merged.alerts[0].name, "from-stage-3");
        // Placeholder-only suggestions from stage 4 count as empty.
        assert_eq!(merged.suggestions[0].metric, "latency");
        assert_eq!(merged.explanation, "final");
    }

    #[test]
    fn test_placeholder_owner_yields_to_model_content() {
        let placeholder = NormalizedDocument {
            alerts: vec![alert("placeholder_alert_1"), alert("placeholder_alert_2")],
            explanation: crate::recovery::fallback::fallback_explanation("alert_generation"),
            ..Default::default()
        };
        let steps = vec![
            step(Stage::IndicatorDiscovery, NormalizedDocument::default()),
            step(Stage::ObjectiveGeneration, NormalizedDocument::default()),
            step(Stage::AlertGeneration, placeholder.clone()),
            step(Stage::AnalysisAndRecommendation, placeholder),
            step(
                Stage::ValidationAndIntegration,
                NormalizedDocument {
                    alerts: vec![alert("ApiDown")],
                    explanation: "final".to_string(),
                    ..Default::default()
                },
            ),
        ];
        let merged = integrate(&steps);
        assert_eq!(merged.alerts, vec![alert("ApiDown")]);
        assert_eq!(merged.explanation, "final");
    }

    #[test]
    fn test_placeholders_kept_when_nothing_else_exists() {
        let placeholder = NormalizedDocument {
            alerts: vec![alert("placeholder_alert_1")],
            ..Default::default()
        };
        let steps = vec![
            step(Stage::AlertGeneration, placeholder.clone()),
            step(Stage::ValidationAndIntegration, NormalizedDocument::default()),
        ];
        assert_eq!(integrate(&steps).alerts, placeholder.alerts);
    }

    #[test]
    fn test_integrate_empty() {
        assert_eq!(integrate(&[]), NormalizedDocument::default());
    }
}
