//! A generator that replays queued replies. Used by tests and `--replies`.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{GenerationRequest, TextGenerator};
use crate::domain::{GeneratorError, Result};

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPrompt {
    pub prompt: String,
    pub temperature: f32,
    pub model: String,
}

#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<std::result::Result<String, GeneratorError>>>,
    prompts: Mutex<Vec<RecordedPrompt>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Default::default()
        }
    }

    /// Replies read from every regular file in `dir`, in file-name order.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        let replies = paths
            .iter()
            .map(std::fs::read_to_string)
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self::new(replies))
    }

    /// Queue a failure as the next reply.
    pub fn push_error(self, err: GeneratorError) -> Self {
        lock(&self.replies).push_back(Err(err));
        self
    }

    pub fn push_reply(self, reply: impl Into<String>) -> Self {
        lock(&self.replies).push_back(Ok(reply.into()));
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        lock(&self.prompts).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.replies).len()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> std::result::Result<String, GeneratorError> {
        lock(&self.prompts).push(RecordedPrompt {
            prompt: request.prompt.to_string(),
            temperature: request.temperature,
            model: request.model.to_string(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = lock(&self.replies).pop_front();
        next.unwrap_or_else(|| Err(GeneratorError::Transport("script exhausted".to_string())))
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}
