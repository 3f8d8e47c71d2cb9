//! SREX Core Library
//!
//! Turns free-form generation output into schema-conformant SLI/SLO/alert
//! documents: recovery, normalization, confidence scoring, contract
//! validation and five-stage orchestration.

pub mod confidence;
pub mod config;
pub mod contract;
pub mod domain;
pub mod generator;
pub mod indicators;
pub mod metrics;
pub mod normalize;
pub mod obs;
pub mod observer;
pub mod pipeline;
pub mod prompt;
pub mod recovery;
pub mod runner;
pub mod stage;
pub mod telemetry;

pub use confidence::{ConfidenceScore, ConfidenceScorer};
pub use config::{GeneratorConfig, PipelineConfig, SrexConfig};
pub use contract::{Contract, ValidationResult};

pub use domain::{
    Alert, DocumentField, GenerationContext, GeneratorError, Indicator, IndicatorKind,
    LiveIndicator, NormalizedDocument, Objective, Quantities, Result, Severity, SrexError,
    Suggestion, TimeWindow,
};

pub use generator::{GenerationRequest, OllamaGenerator, ScriptedGenerator, TextGenerator};
pub use indicators::{enrich_context, IndicatorSource, StaticIndicatorSource};
pub use normalize::{normalize, unfold_numeric_maps};
pub use observer::{ArtifactDirObserver, MemoryObserver, NoopObserver, StageObserver};
pub use pipeline::{PipelineOrchestrator, PipelineRun, PipelineStepResult, SingleRun};
pub use prompt::{InstructionRenderer, PromptRenderer, TemplateRenderer};
pub use recovery::{RecoveredDocument, RecoveryParser, RecoveryStrategy, RecoveryTarget};
pub use runner::{GenerationOutcome, StageRunner};
pub use stage::Stage;

pub use metrics::METRICS;
pub use obs::RunSpan;
pub use telemetry::init_tracing;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
