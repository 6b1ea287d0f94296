pub mod openai;
pub mod traits;

use std::sync::Arc;

use async_trait::async_trait;

pub use openai::ChatCompletionsClient;
pub use traits::{GeneratorError, NarrativeGenerator, NarrativePrompt};

use crate::config::GeneratorConfig;

/// Stand-in used when no API key is configured. Every call fails immediately,
/// so every strategy comes from the templates.
#[derive(Debug, Clone)]
pub struct DisabledGenerator {
    reason: String,
}

impl DisabledGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl NarrativeGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &NarrativePrompt) -> Result<String, GeneratorError> {
        Err(GeneratorError::Disabled(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Pick the generator for this configuration.
pub fn generator_from_config(cfg: &GeneratorConfig) -> Arc<dyn NarrativeGenerator> {
    if !cfg.enabled {
        tracing::info!("Narrative generator disabled by configuration; using templates only");
        return Arc::new(DisabledGenerator::new("disabled by configuration"));
    }
    match cfg.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => match ChatCompletionsClient::new(cfg, key) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::error!("{}; strategies will use template fallback", e);
                Arc::new(DisabledGenerator::new(e.to_string()))
            }
        },
        _ => {
            tracing::warn!("OPENAI_API_KEY not set; strategies will use template fallback");
            Arc::new(DisabledGenerator::new("OPENAI_API_KEY not set"))
        }
    }
}
