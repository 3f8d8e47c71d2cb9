//! Ollama HTTP client (`POST /api/generate`, non-streaming).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{GenerationRequest, TextGenerator};
use crate::config::GeneratorConfig;
use crate::domain::GeneratorError;

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GeneratorError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("srex/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout())
            .build()
            .map_err(|e| GeneratorError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn map_error(&self, err: reqwest::Error) -> GeneratorError {
        if err.is_timeout() {
            GeneratorError::Timeout(self.timeout)
        } else if err.is_decode() {
            GeneratorError::InvalidEnvelope(err.to_string())
        } else {
            GeneratorError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    #[instrument(skip_all, fields(model = %request.model, prompt_len = request.prompt.len()))]
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, GeneratorError> {
        let body = GenerateBody {
            model: request.model,
            prompt: request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: self.max_tokens,
            },
        };

        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GeneratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GenerateResponse = resp.json().await.map_err(|e| self.map_error(e))?;
        debug!(reply_len = envelope.response.len(), "generation complete");
        Ok(envelope.response)
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
