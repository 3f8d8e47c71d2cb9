//! Hooks for watching a run as it progresses.
//!
//! Observers are best-effort sinks: they never fail a run. The
//! [`ArtifactDirObserver`] persists every raw reply next to the recovered
//! document so a run can be audited or replayed offline.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::pipeline::{PipelineRun, PipelineStepResult, SingleRun};
use crate::stage::Stage;

pub trait StageObserver: Send + Sync {
    fn on_stage_started(&self, _run_id: &Uuid, _stage: Stage) {}

    fn on_stage_completed(&self, _run_id: &Uuid, _step: &PipelineStepResult) {}

    fn on_run_completed(&self, _run: &PipelineRun) {}

    fn on_single_completed(&self, _run: &SingleRun) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

// ---------------------------------------------------------------------------
// In-memory recording
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    StageStarted(Stage),
    StageCompleted(Stage),
    RunCompleted { steps: usize },
    SingleCompleted,
}

/// Records the event sequence, for tests.
#[derive(Debug, Default)]
pub struct MemoryObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.lock().clone()
    }

    fn push(&self, event: ObservedEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ObservedEvent>> {
        self.events.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl StageObserver for MemoryObserver {
    fn on_stage_started(&self, _run_id: &Uuid, stage: Stage) {
        self.push(ObservedEvent::StageStarted(stage));
    }

    fn on_stage_completed(&self, _run_id: &Uuid, step: &PipelineStepResult) {
        self.push(ObservedEvent::StageCompleted(step.stage));
    }

    fn on_run_completed(&self, run: &PipelineRun) {
        self.push(ObservedEvent::RunCompleted {
            steps: run.steps.len(),
        });
    }

    fn on_single_completed(&self, _run: &SingleRun) {
        self.push(ObservedEvent::SingleCompleted);
    }
}

// ---------------------------------------------------------------------------
// Artifact directory
// ---------------------------------------------------------------------------

/// Writes run artifacts under `<root>/<run_id>/`.
///
/// ```text
/// 01_indicator_discovery.raw.txt
/// 01_indicator_discovery.json
/// ...
/// final.json
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactDirObserver {
    root: PathBuf,
}

impl ArtifactDirObserver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn run_dir(&self, run_id: &Uuid) -> PathBuf {
        self.root.join(run_id.to_string())
    }

    /// Stem shared by a stage's raw and JSON artifacts.
    pub fn stage_stem(stage: Stage) -> String {
        format!("{:02}_{}", stage.number(), stage.name())
    }

    fn write_step(&self, run_id: &Uuid, step: &PipelineStepResult) -> Result<()> {
        let dir = self.run_dir(run_id);
        let stem = Self::stage_stem(step.stage);
        write_text(&dir.join(format!("{stem}.raw.txt")), &step.outcome.raw_output)?;
        write_json(&dir.join(format!("{stem}.json")), step)
    }

    fn write_run(&self, run: &PipelineRun) -> Result<()> {
        write_json(&self.run_dir(&run.run_id).join("final.json"), run)
    }

    fn write_single(&self, run: &SingleRun) -> Result<()> {
        let dir = self.run_dir(&run.run_id);
        write_text(&dir.join("single.raw.txt"), &run.outcome.raw_output)?;
        write_json(&dir.join("final.json"), run)
    }
}

impl StageObserver for ArtifactDirObserver {
    fn on_stage_completed(&self, run_id: &Uuid, step: &PipelineStepResult) {
        if let Err(e) = self.write_step(run_id, step) {
            warn!(%run_id, stage = step.stage.name(), error = %e, "failed to write stage artifact");
        }
    }

    fn on_run_completed(&self, run: &PipelineRun) {
        match self.write_run(run) {
            Ok(()) => debug!(run_id = %run.run_id, dir = ?self.run_dir(&run.run_id), "artifacts written"),
            Err(e) => warn!(run_id = %run.run_id, error = %e, "failed to write run artifact"),
        }
    }

    fn on_single_completed(&self, run: &SingleRun) {
        if let Err(e) = self.write_single(run) {
            warn!(run_id = %run.run_id, error = %e, "failed to write run artifact");
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    Ok(())
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, text).with_context(|| format!("write {:?}", path))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("serialize artifact")?;
    write_text(path, &content)
}
