use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// System and user messages sent to the narrative generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativePrompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("generator returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response shape: {0}")]
    ResponseShape(String),
    #[error("generator returned an empty response")]
    EmptyResponse,
    #[error("narrative generator disabled: {0}")]
    Disabled(String),
}

impl From<reqwest::Error> for GeneratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured value; callers re-wrap when they know it
            GeneratorError::Timeout { timeout_ms: 0 }
        } else {
            GeneratorError::Transport(err.to_string())
        }
    }
}

/// Text generation call that returns structured text, possibly malformed.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, prompt: &NarrativePrompt) -> Result<String, GeneratorError>;

    /// Short label for logs and `/info`.
    fn name(&self) -> &str;
}
