//! External LLM provider completions.
//!
//! OpenAI and Groq share the chat-completions format. Anthropic and Gemini
//! each use their own request and response shapes.

use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::types::{GenerationOptions, LLMProvider};
use recall_core::{Error, Result};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Run one completion against the given provider and return the text.
pub async fn complete(
    client: &Client,
    provider: LLMProvider,
    prompt: &str,
    model: &str,
    api_key: &str,
    options: GenerationOptions,
) -> Result<String> {
    debug!("Completing with {} model {}", provider, model);
    let text = match provider {
        LLMProvider::OpenAI => {
            complete_openai_compat(client, OPENAI_URL, prompt, model, api_key, options).await?
        }
        LLMProvider::Groq => {
            complete_openai_compat(client, GROQ_URL, prompt, model, api_key, options).await?
        }
        LLMProvider::Anthropic => complete_anthropic(client, prompt, model, api_key, options).await?,
        LLMProvider::Gemini => complete_gemini(client, prompt, model, api_key, options).await?,
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(Error::GenerationUnavailable(format!(
            "empty response from {}",
            provider
        )));
    }
    Ok(text.to_string())
}

async fn complete_openai_compat(
    client: &Client,
    url: &str,
    prompt: &str,
    model: &str,
    api_key: &str,
    options: GenerationOptions,
) -> Result<String> {
    let body = json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
        "temperature": options.temperature,
        "max_tokens": options.max_tokens,
    });
    let parsed = send(
        client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body),
    )
    .await?;
    Ok(parsed["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string())
}

async fn complete_anthropic(
    client: &Client,
    prompt: &str,
    model: &str,
    api_key: &str,
    options: GenerationOptions,
) -> Result<String> {
    let body = json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
        "temperature": options.temperature,
        "max_tokens": options.max_tokens,
    });
    let parsed = send(
        client
            .post(ANTHROPIC_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body),
    )
    .await?;
    let text = parsed["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    Ok(text)
}

async fn complete_gemini(
    client: &Client,
    prompt: &str,
    model: &str,
    api_key: &str,
    options: GenerationOptions,
) -> Result<String> {
    let url = format!("{}/{}:generateContent", GEMINI_URL, model);
    let body = json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "temperature": options.temperature,
            "topP": 0.8,
            "topK": 40,
            "maxOutputTokens": options.max_tokens,
        },
    });
    let parsed = send(
        client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body),
    )
    .await?;
    let text = parsed["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    Ok(text)
}

async fn send(request: RequestBuilder) -> Result<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::GenerationUnavailable(format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("LLM API error {}: {}", status, body);
        return Err(Error::GenerationUnavailable(format!(
            "API error {}: {}",
            status, body
        )));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| Error::GenerationUnavailable(format!("Malformed response: {}", e)))
}
