//! Generation collaborator trait and its provider-backed implementation.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;

use crate::providers;
use crate::types::{GenerationOptions, LLMProvider};
use recall_core::{Error, Result};

/// Produces text from a prompt.
///
/// Failures surface as `GenerationUnavailable`; implementations never retry.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Short description such as `gemini/gemini-2.5-flash`.
    fn describe(&self) -> String;

    fn is_available(&self) -> bool {
        true
    }
}

/// Generator backed by one external provider.
pub struct ProviderGenerator {
    client: Client,
    provider: LLMProvider,
    model: String,
    api_key: String,
    options: GenerationOptions,
}

impl ProviderGenerator {
    pub fn new(
        provider: LLMProvider,
        model: String,
        api_key: String,
        options: GenerationOptions,
    ) -> Self {
        Self {
            client: Client::new(),
            provider,
            model,
            api_key,
            options,
        }
    }
}

#[async_trait]
impl Generator for ProviderGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        providers::complete(
            &self.client,
            self.provider,
            prompt,
            &self.model,
            &self.api_key,
            self.options,
        )
        .await
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

/// Stand-in used when no provider key is configured.
pub struct UnconfiguredGenerator;

#[async_trait]
impl Generator for UnconfiguredGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::GenerationUnavailable(
            "no LLM provider configured".into(),
        ))
    }

    fn describe(&self) -> String {
        "none".into()
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Generator whose backend can be swapped at runtime, e.g. after the
/// provider configuration changes. Calls in flight keep the backend they
/// started with.
pub struct ReloadableGenerator {
    inner: RwLock<Arc<dyn Generator>>,
}

impl ReloadableGenerator {
    pub fn new(inner: Arc<dyn Generator>) -> Self {
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub fn replace(&self, next: Arc<dyn Generator>) {
        *self.inner.write() = next;
    }

    fn current(&self) -> Arc<dyn Generator> {
        self.inner.read().clone()
    }
}

#[async_trait]
impl Generator for ReloadableGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let current = self.current();
        current.generate(prompt).await
    }

    fn describe(&self) -> String {
        self.current().describe()
    }

    fn is_available(&self) -> bool {
        self.current().is_available()
    }
}
