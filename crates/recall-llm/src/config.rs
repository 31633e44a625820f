//! LLM configuration persistence and provider selection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{LLMConfigResponse, LLMConfigUpdate, LLMProvider};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Stored LLM configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.into()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> usize {
    2048
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            gemini_api_key: None,
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
            groq_model: default_groq_model(),
            gemini_model: default_gemini_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            config_path: PathBuf::new(),
        }
    }
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: LLMConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        config.config_path = config_path.to_path_buf();

        // Env vars as fallback for API keys
        fill_from_env(&mut config.openai_api_key, &["OPENAI_API_KEY"]);
        fill_from_env(&mut config.anthropic_api_key, &["ANTHROPIC_API_KEY"]);
        fill_from_env(&mut config.groq_api_key, &["GROQ_API_KEY"]);
        fill_from_env(&mut config.gemini_api_key, &["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
        if let Ok(p) = std::env::var("RECALL_LLM_PROVIDER") {
            config.preferred_provider = p;
        }

        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved LLM config to {}", self.config_path.display());
        Ok(())
    }

    /// Apply a partial update. A blank key clears that provider's key.
    pub fn apply_update(&mut self, update: &LLMConfigUpdate) {
        if let Some(p) = &update.preferred_provider {
            self.preferred_provider = p.trim().to_ascii_lowercase();
        }
        for (slot, value) in [
            (&mut self.openai_api_key, &update.openai_api_key),
            (&mut self.anthropic_api_key, &update.anthropic_api_key),
            (&mut self.groq_api_key, &update.groq_api_key),
            (&mut self.gemini_api_key, &update.gemini_api_key),
        ] {
            if let Some(k) = value {
                *slot = Some(k.trim().to_string()).filter(|k| !k.is_empty());
            }
        }
        for (slot, value) in [
            (&mut self.openai_model, &update.openai_model),
            (&mut self.anthropic_model, &update.anthropic_model),
            (&mut self.groq_model, &update.groq_model),
            (&mut self.gemini_model, &update.gemini_model),
        ] {
            if let Some(m) = value.as_ref().filter(|m| !m.trim().is_empty()) {
                *slot = m.trim().to_string();
            }
        }
    }

    /// Resolve which provider, model and key to use.
    pub fn resolve_provider(&self) -> Option<(LLMProvider, String, String)> {
        let pick = |provider: LLMProvider| -> Option<(LLMProvider, String, String)> {
            let (key, model) = match provider {
                LLMProvider::OpenAI => (&self.openai_api_key, &self.openai_model),
                LLMProvider::Anthropic => (&self.anthropic_api_key, &self.anthropic_model),
                LLMProvider::Groq => (&self.groq_api_key, &self.groq_model),
                LLMProvider::Gemini => (&self.gemini_api_key, &self.gemini_model),
            };
            key.as_ref()
                .filter(|k| !k.trim().is_empty())
                .map(|k| (provider, model.clone(), k.clone()))
        };

        match self.preferred_provider.as_str() {
            "openai" => pick(LLMProvider::OpenAI),
            "anthropic" => pick(LLMProvider::Anthropic),
            "groq" => pick(LLMProvider::Groq),
            "gemini" => pick(LLMProvider::Gemini),
            // Auto mode: Gemini > Anthropic > Groq > OpenAI
            "auto" => pick(LLMProvider::Gemini)
                .or_else(|| pick(LLMProvider::Anthropic))
                .or_else(|| pick(LLMProvider::Groq))
                .or_else(|| pick(LLMProvider::OpenAI)),
            _ => None,
        }
    }

    /// Build the public config response (no API keys exposed).
    pub fn to_response(&self) -> LLMConfigResponse {
        let resolved = self.resolve_provider();
        LLMConfigResponse {
            preferred_provider: self.preferred_provider.clone(),
            openai_configured: self.openai_api_key.is_some(),
            anthropic_configured: self.anthropic_api_key.is_some(),
            groq_configured: self.groq_api_key.is_some(),
            gemini_configured: self.gemini_api_key.is_some(),
            active_provider: resolved.as_ref().map(|(p, _, _)| p.to_string()),
            active_model: resolved.map(|(_, m, _)| m),
        }
    }
}

fn fill_from_env(slot: &mut Option<String>, vars: &[&str]) {
    if slot.is_none() {
        *slot = vars.iter().find_map(|v| std::env::var(v).ok());
    }
}
