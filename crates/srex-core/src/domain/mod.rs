//! Domain models for SREX.
//!
//! - `GenerationContext`: inputs for one stage
//! - `NormalizedDocument`: the schema-conformant output
//! - `SrexError`: fatal error taxonomy

pub mod context;
pub mod digest;
pub mod document;
pub mod error;

pub use context::{GenerationContext, LiveIndicator, Quantities};
pub use document::{
    Alert, DocumentField, Indicator, IndicatorKind, NormalizedDocument, Objective, Severity,
    Suggestion, TimeWindow,
};
pub use error::{GeneratorError, Result, SrexError};
