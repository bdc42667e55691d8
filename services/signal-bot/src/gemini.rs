//! Gemini Client
//!
//! HTTP client for the Google Generative Language API, used as the
//! reasoning service for both asset selection and signal narratives.

use crate::config::GenerationSettings;
use crate::types::{BotError, ReasoningService, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default timeout for generation requests (long prompts can take a while)
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Gemini generateContent client
pub struct GeminiClient {
    /// API base URL
    base_url: String,
    /// API key sent as `x-goog-api-key`
    api_key: String,
    /// Model identifier, e.g. `gemini-2.5-pro-exp-03-25`
    model: String,
    /// Sampling and safety settings sent with every request
    settings: GenerationSettings,
    /// HTTP client with connection pooling
    http_client: Client,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        settings: GenerationSettings,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| BotError::Oracle(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Gemini client initialized: model={}, timeout={}s",
            model, DEFAULT_TIMEOUT_SECS
        );

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            settings,
            http_client,
        })
    }

    /// Request a completion for a single user prompt
    ///
    /// POST /v1beta/models/{model}:generateContent
    pub async fn generate_content(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let request = GenerateContentRequest::new(prompt, &self.settings);

        debug!(
            "Requesting completion from Gemini: model={}, prompt_chars={}",
            self.model,
            prompt.len()
        );

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BotError::Oracle(format!(
                        "Gemini request timed out after {}s",
                        DEFAULT_TIMEOUT_SECS
                    ))
                } else if e.is_connect() {
                    BotError::Oracle(format!("Failed to connect to Gemini API: {}", e))
                } else {
                    BotError::Oracle(format!("Gemini request failed: {}", e))
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "Gemini returned error: status={}, body={}",
                status, error_text
            );
            let message = serde_json::from_str::<ApiErrorEnvelope>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(BotError::Oracle(format!(
                "Gemini request failed with status {}: {}",
                status, message
            )));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            BotError::Oracle(format!("Failed to parse Gemini response: {}", e))
        })?;

        Ok(body.into_text())
    }
}

#[async_trait::async_trait]
impl ReasoningService for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        GeminiClient::generate_content(self, prompt).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

impl GenerateContentRequest {
    fn new(prompt: &str, settings: &GenerationSettings) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: settings.temperature,
                top_p: settings.top_p,
                top_k: settings.top_k,
                max_output_tokens: settings.max_output_tokens,
            },
            safety_settings: settings
                .blocked_categories
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: settings.block_threshold.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl GenerateContentResponse {
    /// Text of the first candidate; empty when the prompt or reply was blocked
    fn into_text(self) -> String {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            warn!("Gemini blocked the prompt: reason={}", reason);
            return String::new();
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            warn!("Gemini returned no candidates");
            return String::new();
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            warn!(
                "Gemini returned an empty candidate: finish_reason={}",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            );
        }

        text
    }
}
