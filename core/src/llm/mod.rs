//! LLM client module
//!
//! Thin completion client for the sourcing worker. Supports:
//! - OpenAI-compatible API (OpenAI, Ollama, LM Studio, local models)
//! - Google Generative AI (Gemini)

pub mod client;

pub use client::{LlmClient, LlmProvider};

use crate::config::LlmEndpointConfig;
use crate::error::{Result, SellflowError};

/// LLM Configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Provider type
    pub provider: LlmProvider,
    /// API endpoint base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// API key (if required)
    pub api_key: Option<String>,
    /// Maximum tokens in response
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,
}

impl LlmConfig {
    /// Create a new LLM config
    pub fn new(
        provider: LlmProvider,
        base_url: String,
        model: String,
        api_key: Option<String>,
    ) -> Self {
        LlmConfig {
            provider,
            base_url,
            model,
            api_key,
            max_tokens: Some(4096),
            temperature: Some(0.7),
        }
    }

    /// Build from the `[llm]` section of the config file.
    pub fn from_endpoint(endpoint: &LlmEndpointConfig) -> Result<Self> {
        let provider = endpoint
            .provider
            .parse::<LlmProvider>()
            .map_err(|message| SellflowError::InvalidConfig { message })?;
        let api_key = if endpoint.api_key.trim().is_empty() {
            None
        } else {
            Some(endpoint.api_key.clone())
        };
        Ok(LlmConfig::new(
            provider,
            endpoint.base_url.clone(),
            endpoint.model.clone(),
            api_key,
        ))
    }

    /// Set maximum tokens
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp.clamp(0.0, 2.0));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_with_blank_key_maps_to_none() {
        let endpoint = LlmEndpointConfig {
            provider: "gemini".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-pro".to_string(),
            api_key: "  ".to_string(),
        };
        let config = LlmConfig::from_endpoint(&endpoint).unwrap();
        assert_eq!(config.provider, LlmProvider::GoogleGenerativeAi);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let endpoint = LlmEndpointConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        assert!(LlmConfig::from_endpoint(&endpoint).is_err());
    }
}
