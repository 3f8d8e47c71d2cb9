//! Runtime configuration: TOML file, then environment overrides.
//!
//! ```toml
//! [generator]
//! base_url = "http://localhost:11434"
//! model = "llama3"
//! timeout_secs = 600
//!
//! [pipeline]
//! retry_on_parse_failure = true
//! max_placeholder_items = 3
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Result, SrexError};

pub const ENV_OLLAMA_URL: &str = "SREX_OLLAMA_URL";
pub const ENV_MODEL: &str = "SREX_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "SREX_TIMEOUT_SECS";

/// Generation service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    /// Upper bound on one generation call. Generation is slow; keep this in minutes.
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_secs: 600,
            max_tokens: 2048,
        }
    }
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Recovery and scoring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Re-ask once, demanding JSON only, when the first reply does not parse.
    pub retry_on_parse_failure: bool,
    /// Cap on list sizes of synthesized placeholder documents.
    pub max_placeholder_items: u32,
    pub high_temperature_threshold: f32,
    /// Scores below this emit a `confidence.low` event.
    pub low_confidence_threshold: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry_on_parse_failure: true,
            max_placeholder_items: 3,
            high_temperature_threshold: 0.8,
            low_confidence_threshold: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrexConfig {
    pub generator: GeneratorConfig,
    pub pipeline: PipelineConfig,
}

impl SrexConfig {
    /// Read a TOML file, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&text)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SrexError::Config(e.to_string()))
    }

    /// Apply `SREX_*` overrides read through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(url) = lookup(ENV_OLLAMA_URL).filter(|v| !v.trim().is_empty()) {
            self.generator.base_url = url.trim().to_string();
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            self.generator.model = model.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.generator.timeout_secs = raw.trim().parse().map_err(|_| {
                SrexError::Config(format!("{ENV_TIMEOUT_SECS} must be a whole number, got {raw:?}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.generator.base_url.trim().is_empty() {
            return Err(SrexError::Config("generator.base_url is empty".to_string()));
        }
        if self.generator.model.trim().is_empty() {
            return Err(SrexError::Config("generator.model is empty".to_string()));
        }
        if self.generator.timeout_secs == 0 {
            return Err(SrexError::Config(
                "generator.timeout_secs must be positive".to_string(),
            ));
        }
        if self.pipeline.max_placeholder_items == 0 {
            return Err(SrexError::Config(
                "pipeline.max_placeholder_items must be positive".to_string(),
            ));
        }
        let t = self.pipeline.high_temperature_threshold;
        if !t.is_finite() || t <= 0.0 {
            return Err(SrexError::Config(format!(
                "pipeline.high_temperature_threshold must be positive, got {t}"
            )));
        }
        if self.pipeline.low_confidence_threshold > 100 {
            return Err(SrexError::Config(
                "pipeline.low_confidence_threshold must be within 0..=100".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SrexConfig::from_toml("[generator]\nmodel = \"mistral\"\n").unwrap();
        assert_eq!(config.generator.model, "mistral");
        assert_eq!(config.generator.base_url, "http://localhost:11434");
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_OLLAMA_URL, "http://gpu-box:11434"),
            (ENV_TIMEOUT_SECS, "120"),
        ]);
        let mut config = SrexConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.generator.base_url, "http://gpu-box:11434");
        assert_eq!(config.generator.timeout(), Duration::from_secs(120));
        assert_eq!(config.generator.model, "llama3");
    }

    #[test]
    fn test_bad_timeout_is_config_error() {
        let mut config = SrexConfig::default();
        let err = config
            .apply_env_overrides(|k| (k == ENV_TIMEOUT_SECS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.is_configuration());

        config.generator.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("srex.toml");
        std::fs::write(&path, "[pipeline]\nmax_placeholder_items = 5\n").unwrap();
        let config = SrexConfig::load(&path).unwrap();
        assert_eq!(config.pipeline.max_placeholder_items, 5);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(SrexConfig::from_toml("generator = 3").unwrap_err().is_configuration());
    }
}
