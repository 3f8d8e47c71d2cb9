//! Structured lifecycle events for SREX runs.
//!
//! - Run-scoped tracing spans via the `RunSpan` RAII guard
//! - One emitter per lifecycle event, each tagged with `event = "<name>"`
//!
//! Events are emitted at `info!` (failures and low confidence at `warn!`).
//! Filter with `SREX_LOG`.

use tracing::{info, warn};

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
///
/// ```ignore
/// let _span = RunSpan::enter("3f1c...");
/// // every event below carries run_id = "3f1c..."
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        Self {
            _span: run_span(run_id).entered(),
        }
    }
}

/// The `srex.run` span, for attaching to futures with
/// [`tracing::Instrument`] where an entered guard cannot be held.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("srex.run", run_id = %run_id)
}

/// Emit event: run started for a component (`mode` is `pipeline` or `single`).
pub fn emit_run_started(run_id: &str, component: &str, mode: &str) {
    info!(event = "run.started", run_id = %run_id, component = %component, mode = %mode);
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, stages: usize, confidence: u8, valid: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        stages = stages,
        confidence = confidence,
        valid = valid,
    );
}

/// Emit event: run aborted by a fatal error.
pub fn emit_run_failed(run_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.failed", run_id = %run_id, stage = %stage, error = %error);
}

pub fn emit_stage_started(run_id: &str, stage: &str, number: usize) {
    info!(event = "stage.started", run_id = %run_id, stage = %stage, number = number);
}

/// Emit event: raw output recovered. Logs the digest, never the text.
pub fn emit_stage_recovered(
    run_id: &str,
    stage: &str,
    strategy: &str,
    raw_digest: &str,
    retried: bool,
    duration_ms: u64,
) {
    info!(
        event = "stage.recovered",
        run_id = %run_id,
        stage = %stage,
        strategy = %strategy,
        raw_digest = %raw_digest,
        retried = retried,
        duration_ms = duration_ms,
    );
}

pub fn emit_stage_retry(run_id: &str, stage: &str) {
    info!(event = "stage.retry", run_id = %run_id, stage = %stage);
}

pub fn emit_stage_validation_failed(run_id: &str, stage: &str, contract: &str, errors: usize) {
    warn!(
        event = "stage.validation_failed",
        run_id = %run_id,
        stage = %stage,
        contract = %contract,
        errors = errors,
    );
}

pub fn emit_confidence_low(run_id: &str, stage: &str, score: u8, threshold: u8) {
    warn!(
        event = "confidence.low",
        run_id = %run_id,
        stage = %stage,
        score = score,
        threshold = threshold,
    );
}
