//! Text generation through a hosted inference endpoint.
//!
//! The server depends only on [`InferenceProvider`]; [`huggingface`] holds the
//! production client. Calls are bounded by the client's timeout and every
//! failure is surfaced as an [`InferenceError`].

pub mod huggingface;

use async_trait::async_trait;

use crate::config::InferenceConfig;

/// Sampling parameters sent with one generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f64,
    pub do_sample: bool,
}

impl GenerationParams {
    /// Parameters for assistant chat answers.
    pub fn chat(config: &InferenceConfig) -> Self {
        Self {
            max_new_tokens: config.chat_max_new_tokens,
            temperature: config.temperature,
            do_sample: true,
        }
    }

    /// Parameters for guessing-game answers, which are kept short.
    pub fn game(config: &InferenceConfig) -> Self {
        Self {
            max_new_tokens: config.game_max_new_tokens,
            temperature: config.temperature,
            do_sample: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("inference request timed out after {0}s")]
    Timeout(u64),

    #[error("inference service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected inference response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Generate a continuation of `prompt`. The returned text excludes the prompt.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, InferenceError>;

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}
