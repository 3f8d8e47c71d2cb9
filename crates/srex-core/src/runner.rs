//! Single-stage pipeline: render, generate, recover, normalize, score, validate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, SrexConfig};
use crate::confidence::{ConfidenceScore, ConfidenceScorer};
use crate::contract::{Contract, ValidationResult};
use crate::domain::digest::{raw_output_digest, short_digest};
use crate::domain::{GenerationContext, GeneratorError, NormalizedDocument, Result};
use crate::generator::{GenerationRequest, TextGenerator};
use crate::metrics::METRICS;
use crate::normalize::normalize;
use crate::obs;
use crate::prompt::{with_retry_instruction, PromptRenderer};
use crate::recovery::{RecoveryParser, RecoveryStrategy, RecoveryTarget};

/// Everything one stage produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub document: NormalizedDocument,
    /// Verbatim reply the document was recovered from (the retry's reply
    /// when a retry happened).
    pub raw_output: String,
    pub raw_digest: String,
    pub strategy: RecoveryStrategy,
    pub retried: bool,
    pub confidence: ConfidenceScore,
    pub validation: ValidationResult,
    pub duration_ms: u64,
}

pub struct StageRunner {
    generator: Arc<dyn TextGenerator>,
    renderer: Arc<dyn PromptRenderer>,
    parser: RecoveryParser,
    scorer: ConfidenceScorer,
    settings: PipelineConfig,
    model: Option<String>,
    timeout: Duration,
}

impl StageRunner {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        renderer: Arc<dyn PromptRenderer>,
        config: &SrexConfig,
    ) -> Self {
        Self {
            generator,
            renderer,
            parser: RecoveryParser::new(config.pipeline.max_placeholder_items),
            scorer: ConfidenceScorer::new(config.pipeline.high_temperature_threshold),
            settings: config.pipeline.clone(),
            model: None,
            timeout: config.generator.timeout(),
        }
    }

    /// Override the generator's default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    pub fn low_confidence_threshold(&self) -> u8 {
        self.settings.low_confidence_threshold
    }

    fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.generator.default_model())
    }

    /// Run one stage against the generation service.
    ///
    /// Fails only on transport/timeout errors or a bad context; anything
    /// the service returns yields an outcome.
    pub async fn run(
        &self,
        run_id: &str,
        label: &str,
        contract: Contract,
        ctx: &GenerationContext,
    ) -> Result<GenerationOutcome> {
        ctx.validate()?;
        let start = Instant::now();
        let prompt = self.renderer.render(contract, ctx)?;

        let mut raw = self.call(&prompt, ctx).await?;
        let mut retried = false;
        if self.settings.retry_on_parse_failure && self.parser.parse_direct(&raw).is_none() {
            obs::emit_stage_retry(run_id, label);
            METRICS.inc_retries();
            raw = self.call(&with_retry_instruction(&prompt), ctx).await?;
            retried = true;
        }

        let mut outcome = self.recover_output(run_id, label, contract, ctx, raw, retried);
        outcome.duration_ms = elapsed_ms(start);
        Ok(outcome)
    }

    /// Recover, normalize, score and validate a reply that is already in hand.
    pub fn recover_output(
        &self,
        run_id: &str,
        label: &str,
        contract: Contract,
        ctx: &GenerationContext,
        raw: String,
        retried: bool,
    ) -> GenerationOutcome {
        let start = Instant::now();
        let recovered = self
            .parser
            .recover(&raw, RecoveryTarget { contract, ctx, label });
        let document = normalize(&recovered.value, ctx);
        let confidence = self.scorer.score(&document, ctx);
        let validation = contract.validate(&document);
        let raw_digest = raw_output_digest(&raw);
        let duration_ms = elapsed_ms(start);

        METRICS.inc_stages();
        METRICS.inc_recovery(recovered.strategy);
        obs::emit_stage_recovered(
            run_id,
            label,
            recovered.strategy.as_str(),
            short_digest(&raw_digest),
            retried,
            duration_ms,
        );
        if !validation.passed() {
            METRICS.inc_validation_failures();
            obs::emit_stage_validation_failed(run_id, label, contract.name(), validation.error_count());
        }
        if confidence.value() < self.settings.low_confidence_threshold {
            obs::emit_confidence_low(
                run_id,
                label,
                confidence.value(),
                self.settings.low_confidence_threshold,
            );
        }

        GenerationOutcome {
            document,
            raw_output: raw,
            raw_digest,
            strategy: recovered.strategy,
            retried,
            confidence,
            validation,
            duration_ms,
        }
    }

    async fn call(&self, prompt: &str, ctx: &GenerationContext) -> Result<String> {
        let request = GenerationRequest {
            prompt,
            temperature: ctx.temperature,
            model: self.model(),
        };
        match tokio::time::timeout(self.timeout, self.generator.generate(request)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                METRICS.inc_transport_failures();
                Err(e.into())
            }
            Err(_) => {
                METRICS.inc_transport_failures();
                Err(GeneratorError::Timeout(self.timeout).into())
            }
        }
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
