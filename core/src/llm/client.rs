//! LLM Client implementation
//!
//! Supports multiple LLM providers:
//! - OpenAI-compatible API (OpenAI, Ollama, LM Studio, local models)
//! - Google Generative AI (Gemini)

use super::LlmConfig;
use crate::error::{Result, SellflowError};
use crate::util::{sanitize_base_url, validate_api_key};
use rand::Rng;
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE},
    Client as HttpClient, StatusCode,
};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

/// LLM Provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    /// OpenAI-compatible API (works with OpenAI, Ollama, LM Studio, local models)
    OpenAiCompatible,
    /// Google Generative AI (Gemini)
    GoogleGenerativeAi,
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "ollama" | "lmstudio" | "local" | "openrouter" | "custom" => {
                Ok(LlmProvider::OpenAiCompatible)
            }
            "google" | "gemini" | "google-ai" | "google-generativeai" => {
                Ok(LlmProvider::GoogleGenerativeAi)
            }
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmProvider::OpenAiCompatible => write!(f, "OpenAI Compatible"),
            LlmProvider::GoogleGenerativeAi => write!(f, "Google Generative AI"),
        }
    }
}

const MAX_RETRIES: u32 = 5;

/// Completion client used by the sourcing worker.
pub struct LlmClient {
    config: LlmConfig,
    http_client: HttpClient,
}

impl LlmClient {
    /// Create a new LLM client
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(300))
            .user_agent(concat!("sellflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(LlmClient {
            config,
            http_client,
        })
    }

    /// Send a single prompt and return the completion text.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        match self.config.provider {
            LlmProvider::OpenAiCompatible => self.complete_openai(prompt).await,
            LlmProvider::GoogleGenerativeAi => self.complete_gemini(prompt).await,
        }
    }

    /// Helper with jittered backoff retry, respecting Retry-After headers
    async fn retry_with_backoff<F, Fut>(&self, operation: F) -> Result<reqwest::Response>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 0;
        let mut delay = Duration::from_secs(3);

        loop {
            match operation().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt >= MAX_RETRIES {
                            tracing::error!(
                                "rate limit (429) exceeded max retries ({}), giving up",
                                MAX_RETRIES
                            );
                            return Ok(response);
                        }

                        // Use Retry-After if available, otherwise the backoff delay
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .map(Duration::from_secs);
                        let wait = retry_after.unwrap_or(delay);
                        tracing::warn!(
                            "rate limited (429), waiting {:?} before retry (attempt {}/{})",
                            wait,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        sleep(wait).await;
                        delay *= 2;
                        attempt += 1;
                        continue;
                    }

                    if status.is_server_error() && attempt < MAX_RETRIES {
                        tracing::warn!("provider error {}, retrying in {:?}", status, delay);
                    } else {
                        return Ok(response);
                    }
                }
                Err(e) => {
                    let err: SellflowError = e.into();
                    if attempt >= MAX_RETRIES || !err.is_retryable() {
                        return Err(err);
                    }
                    tracing::warn!("network error ({}), retrying in {:?}", err, delay);
                }
            }

            attempt += 1;
            sleep(delay).await;

            // Jitter: +/- 500ms
            let jitter_ms = rand::thread_rng().gen_range(-500..=500);
            let delay_ms = (delay.as_millis() as i64 * 2 + jitter_ms).max(0) as u64;
            delay = Duration::from_millis(delay_ms);
        }
    }

    /// OpenAI-compatible API completion
    async fn complete_openai(&self, prompt: &str) -> Result<String> {
        let base_url = sanitize_base_url(&self.config.base_url, "Base URL")
            .map_err(|e| SellflowError::InvalidConfig {
                message: e.to_string(),
            })?;
        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        let body = OpenAiRequest {
            model: self.config.model.clone(),
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_completion_tokens: self.config.max_tokens,
            stream: false,
        };

        let headers = self.build_headers()?;
        let response = self
            .retry_with_backoff(|| async {
                self.http_client
                    .post(&url)
                    .headers(headers.clone())
                    .json(&body)
                    .send()
                    .await
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(provider_error(status, response).await);
        }

        let response_body: OpenAiResponse = response.json().await?;
        let content = response_body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(content)
    }

    /// Google Gemini API completion
    async fn complete_gemini(&self, prompt: &str) -> Result<String> {
        let base_url = sanitize_base_url(&self.config.base_url, "Base URL")
            .map_err(|e| SellflowError::InvalidConfig {
                message: e.to_string(),
            })?;
        let api_key = self.config.api_key.as_deref().unwrap_or("");

        // API key travels in the URL for Gemini, not in a header
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            base_url.trim_end_matches('/'),
            self.config.model,
            api_key
        );

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            }),
        };

        let response = self
            .retry_with_backoff(|| async {
                self.http_client
                    .post(&url)
                    .header(CONTENT_TYPE, "application/json")
                    .json(&body)
                    .send()
                    .await
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(provider_error(status, response).await);
        }

        let response_body: GeminiResponse = response.json().await?;
        let content = response_body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();
        Ok(content)
    }

    /// Build headers for API requests
    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            "application/json"
                .parse()
                .map_err(|_| SellflowError::Http("invalid content-type header".to_string()))?,
        );

        if self.config.provider == LlmProvider::OpenAiCompatible {
            if let Some(api_key) = &self.config.api_key {
                let validated = validate_api_key(api_key).map_err(|e| {
                    SellflowError::InvalidConfig {
                        message: e.to_string(),
                    }
                })?;
                let auth_value = format!("Bearer {}", validated);
                headers.insert(
                    "Authorization",
                    auth_value.parse().map_err(|_| {
                        SellflowError::Http("invalid Authorization header".to_string())
                    })?,
                );
            }
        }

        Ok(headers)
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Get the provider type
    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }
}

/// Map a non-success provider response to a typed error, pulling the
/// message out of the body when the provider sends one.
async fn provider_error(status: StatusCode, response: reqwest::Response) -> SellflowError {
    let error_body: Option<serde_json::Value> = response.json().await.ok();
    let message = error_body
        .as_ref()
        .and_then(|v| v.get("error").and_then(|e| e.get("message")))
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown error")
        .to_string();
    SellflowError::ProviderError {
        status: status.as_u16(),
        message,
    }
}

// OpenAI-compatible API types
#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(rename = "max_completion_tokens")]
    max_completion_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// Gemini API types
#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_aliases() {
        assert_eq!(
            "ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAiCompatible
        );
        assert_eq!(
            "gemini".parse::<LlmProvider>().unwrap(),
            LlmProvider::GoogleGenerativeAi
        );
        assert_eq!(
            "Google-AI".parse::<LlmProvider>().unwrap(),
            LlmProvider::GoogleGenerativeAi
        );
        assert!("unknown-provider".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn gemini_request_uses_camel_case_config() {
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: "hi".to_string(),
                }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: Some(256),
                temperature: Some(0.7),
            }),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("generationConfig"));
        assert!(json.contains("maxOutputTokens"));
    }
}
