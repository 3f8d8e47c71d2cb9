//! The generative text service, seen as an opaque function.
//!
//! A generator may fail with a [`GeneratorError`] (transport, timeout,
//! status); malformed content is never an error at this seam.

pub mod ollama;
pub mod scripted;

use async_trait::async_trait;

use crate::domain::GeneratorError;

pub use ollama::OllamaGenerator;
pub use scripted::ScriptedGenerator;

/// One generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub temperature: f32,
    pub model: &'a str,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Prompt text in, raw text out.
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GeneratorError>;

    /// Model used when the caller does not name one.
    fn default_model(&self) -> &str;
}
