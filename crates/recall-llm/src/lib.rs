//! Recall LLM: text generation through external providers.
//!
//! Provider calls are single-shot completions (OpenAI, Anthropic, Groq,
//! Gemini). Prompt builders for flashcard generation and answer grading
//! live in [`prompts`].

pub mod config;
pub mod generator;
pub mod prompts;
pub mod providers;
pub mod types;

pub use config::LLMConfig;
pub use generator::{Generator, ProviderGenerator, ReloadableGenerator, UnconfiguredGenerator};
pub use types::*;

use std::sync::Arc;

/// Build a generator from the resolved provider, or one that always reports
/// `GenerationUnavailable` when no key is configured.
pub fn create_generator(config: &LLMConfig) -> Arc<dyn Generator> {
    match config.resolve_provider() {
        Some((provider, model, api_key)) => {
            tracing::info!("Using {} for generation (model={})", provider, model);
            Arc::new(ProviderGenerator::new(
                provider,
                model,
                api_key,
                GenerationOptions::from(config),
            ))
        }
        None => {
            tracing::warn!("No LLM provider configured. Generation and model grading are unavailable.");
            Arc::new(UnconfiguredGenerator)
        }
    }
}
