//! Error taxonomy for SREX.
//!
//! Only transport failures and configuration mistakes travel through
//! `Result`. Malformed model output is absorbed by the recovery parser and
//! contract violations are reported through `ValidationResult`.

use std::time::Duration;

/// Failures raised by a [`TextGenerator`](crate::generator::TextGenerator).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeneratorError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable response envelope: {0}")]
    InvalidEnvelope(String),
}

/// SREX domain errors.
#[derive(Debug, thiserror::Error)]
pub enum SrexError {
    #[error("transport error: {0}")]
    Transport(#[from] GeneratorError),

    #[error("unknown contract: {0}")]
    UnknownContract(String),

    #[error("unsupported stage: {0}")]
    UnsupportedStage(String),

    #[error("invalid generation context: {0}")]
    InvalidContext(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("prompt rendering failed: {0}")]
    Render(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SrexError {
    /// Programming or setup mistakes that no retry can fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SrexError::UnknownContract(_)
                | SrexError::UnsupportedStage(_)
                | SrexError::InvalidContext(_)
                | SrexError::Config(_)
        )
    }

    /// Whether the generation service call itself failed.
    pub fn is_transport(&self) -> bool {
        matches!(self, SrexError::Transport(_))
    }
}

/// Result type for SREX operations.
pub type Result<T> = std::result::Result<T, SrexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_wraps_generator_error() {
        let err: SrexError = GeneratorError::Timeout(Duration::from_secs(600)).into();
        assert!(err.is_transport());
        assert!(!err.is_configuration());
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_configuration_classification() {
        assert!(SrexError::UnknownContract("bogus".to_string()).is_configuration());
        assert!(SrexError::UnsupportedStage("step9".to_string()).is_configuration());
        assert!(!SrexError::Render("template".to_string()).is_configuration());
    }

    #[test]
    fn test_status_error_display() {
        let err = GeneratorError::Status {
            status: 503,
            body: "model loading".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("model loading"));
    }
}
