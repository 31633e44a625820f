//! HTTP embedding backends (OpenAI-compatible and Gemini).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::embedder::Embedder;
use recall_core::{Error, Result};

pub const DEFAULT_GEMINI_EMBED_MODEL: &str = "text-embedding-004";
pub const DEFAULT_OPENAI_EMBED_MODEL: &str = "text-embedding-3-small";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedProvider {
    OpenAI,
    Gemini,
    None,
}

impl std::fmt::Display for EmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbedProvider::OpenAI => write!(f, "openai"),
            EmbedProvider::Gemini => write!(f, "gemini"),
            EmbedProvider::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for EmbedProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "gemini" | "google" => Ok(Self::Gemini),
            "none" | "disabled" | "" => Ok(Self::None),
            other => Err(Error::Config(format!("unknown embedding provider '{other}'"))),
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    pub provider: EmbedProvider,
    pub model: String,
    pub dimension: usize,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl EmbedderConfig {
    /// Read `RECALL_EMBED_PROVIDER`, `RECALL_EMBED_MODEL`, `RECALL_EMBED_BASE_URL`
    /// and the provider's API key from the environment.
    ///
    /// Without an explicit provider, Gemini is chosen when `GEMINI_API_KEY` is
    /// set, then OpenAI when `OPENAI_API_KEY` is set.
    pub fn from_env(dimension: usize) -> Result<Self> {
        let gemini_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok();
        let openai_key = std::env::var("OPENAI_API_KEY").ok();

        let provider = match std::env::var("RECALL_EMBED_PROVIDER") {
            Ok(p) => p.parse()?,
            Err(_) if gemini_key.is_some() => EmbedProvider::Gemini,
            Err(_) if openai_key.is_some() => EmbedProvider::OpenAI,
            Err(_) => EmbedProvider::None,
        };

        let (default_model, default_url, api_key) = match provider {
            EmbedProvider::Gemini => (DEFAULT_GEMINI_EMBED_MODEL, GEMINI_BASE_URL, gemini_key),
            EmbedProvider::OpenAI => (DEFAULT_OPENAI_EMBED_MODEL, OPENAI_BASE_URL, openai_key),
            EmbedProvider::None => ("none", "", None),
        };

        Ok(Self {
            provider,
            model: std::env::var("RECALL_EMBED_MODEL").unwrap_or_else(|_| default_model.into()),
            dimension,
            base_url: std::env::var("RECALL_EMBED_BASE_URL")
                .unwrap_or_else(|_| default_url.into()),
            api_key,
        })
    }
}

/// Embedder backed by a remote HTTP API.
pub struct RemoteEmbedder {
    client: Client,
    config: EmbedderConfig,
    api_key: String,
}

impl RemoteEmbedder {
    /// Fails with `Config` when no provider or API key is configured.
    pub fn new(config: EmbedderConfig) -> Result<Self> {
        if config.provider == EmbedProvider::None {
            return Err(Error::Config("embedding provider disabled".into()));
        }
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{} API key not set", config.provider)))?;
        Ok(Self {
            client: Client::new(),
            config,
            api_key,
        })
    }

    async fn embed_openai(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let body = json!({ "model": self.config.model, "input": text });
        let parsed = self
            .send(
                self.client
                    .post(&url)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&body),
            )
            .await?;
        read_vector(&parsed["data"][0]["embedding"])
    }

    async fn embed_gemini(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/models/{}:embedContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let body = json!({
            "model": format!("models/{}", self.config.model),
            "content": { "parts": [{ "text": text }] },
        });
        let parsed = self
            .send(
                self.client
                    .post(&url)
                    .header("x-goog-api-key", &self.api_key)
                    .json(&body),
            )
            .await?;
        read_vector(&parsed["embedding"]["values"])
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<serde_json::Value> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::EmbeddingUnavailable(format!(
                "API error {}: {}",
                status, body
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("Malformed response: {}", e)))
    }
}

fn read_vector(value: &serde_json::Value) -> Result<Vec<f32>> {
    let values = value
        .as_array()
        .ok_or_else(|| Error::EmbeddingUnavailable("response has no embedding".into()))?;
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| Error::EmbeddingUnavailable("non-numeric embedding value".into()))
        })
        .collect()
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("cannot embed empty text".into()));
        }
        debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            chars = text.len(),
            "embedding text"
        );
        match self.config.provider {
            EmbedProvider::OpenAI => self.embed_openai(text).await,
            EmbedProvider::Gemini => self.embed_gemini(text).await,
            EmbedProvider::None => Err(Error::EmbeddingUnavailable(
                "embedding provider disabled".into(),
            )),
        }
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
