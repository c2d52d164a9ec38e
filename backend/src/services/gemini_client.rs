//! Google Gemini REST client.
//!
//! ## API Reference
//!
//! - `POST /v1beta/models/{model}:generateContent`
//! - `POST /v1beta/models/{model}:embedContent`
//!
//! The API key travels in the `x-goog-api-key` header.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::rag_service::{Embedder, LlmClient};

#[derive(Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
}

redacted_debug!(GeminiConfig {
    show base_url,
    redact api_key,
    show model,
    show embedding_model,
    show temperature,
});

impl GeminiConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            embedding_model: config.gemini_embedding_model.clone(),
            temperature: config.llm_temperature,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Embedding,
}

/// Concatenated text of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| AppError::Upstream("Gemini returned no candidates".into()))?;

    Ok(content
        .parts
        .into_iter()
        .map(|p| p.text)
        .collect::<Vec<_>>()
        .join(""))
}

fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            model = %config.model,
            embedding_model = %config.embedding_model,
            "Gemini client initialized"
        );

        Ok(Self { client, config })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        model: &str,
        method: &str,
        body: &B,
    ) -> Result<R> {
        let url = format!(
            "{}/v1beta/{}:{}",
            self.config.base_url,
            model_path(model),
            method
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Gemini {} failed: {} - {}",
                method, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Gemini response: {}", e)))
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        };

        let response: GenerateContentResponse = self
            .post(&self.config.model, "generateContent", &request)
            .await?;
        extract_text(response)
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedContentRequest {
            model: model_path(&self.config.embedding_model),
            content: Content {
                role: None,
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
        };

        let response: EmbedContentResponse = self
            .post(&self.config.embedding_model, "embedContent", &request)
            .await?;
        Ok(response.embedding.values)
    }
}
