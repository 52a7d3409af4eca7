//! Configuration management
//!
//! One TOML file covers both sides: where the service listens and where
//! the worker's LLM endpoint lives. Missing file means defaults, so
//! `serve` and `submit` work out of the box on localhost.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Listen addresses and data location for the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address of the task submission endpoint.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    /// Address of the notification channel listener.
    #[serde(default = "default_notify_addr")]
    pub notify_addr: String,
    /// Override for the completed-results directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            notify_addr: default_notify_addr(),
            data_dir: None,
        }
    }
}

/// LLM endpoint used by the sourcing worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmEndpointConfig {
    /// Provider name, parsed by `LlmProvider::from_str`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Empty key switches the worker to the built-in offline report.
    #[serde(default)]
    pub api_key: String,
}

impl Default for LlmEndpointConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmEndpointConfig,
}

fn default_http_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_notify_addr() -> String {
    "127.0.0.1:8001".to_string()
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-1.5-pro".to_string()
}

impl Config {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist. Environment variables win over the file for
    /// the API key.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Config::default()
        };

        if config.llm.api_key.trim().is_empty() {
            for var in ["SELLFLOW_API_KEY", "GOOGLE_API_KEY"] {
                if let Ok(key) = std::env::var(var) {
                    if !key.trim().is_empty() {
                        config.llm.api_key = key;
                        break;
                    }
                }
            }
        }

        Ok(config)
    }

    pub fn save_to_default_location(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {:?}", parent))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("Could not find config directory")?
            .join("sellflow")
            .join("config.toml"))
    }

    /// Directory for completed-result records.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.server.data_dir {
            return Ok(dir.clone());
        }
        Ok(dirs::data_dir()
            .context("Could not find data directory")?
            .join("sellflow"))
    }

    /// Base URL of the submission endpoint.
    pub fn submit_base_url(&self) -> String {
        format!("http://{}", self.server.http_addr)
    }

    /// URL of the notification channel.
    pub fn notify_url(&self) -> String {
        format!("ws://{}/ws", self.server.notify_addr)
    }
}
