use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

pub const DEFAULT_MODEL: &str = "gemini-pro";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub response_delay_ms: Option<u64>,
    pub reveal_interval_ms: Option<u64>,
    pub copy_feedback_ms: Option<u64>,
    pub log_filter: Option<String>,
}

/// Fixed delays of the chat flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Pause between showing the outgoing message and the loading indicator.
    pub response_delay: Duration,
    /// Time between revealed words.
    pub reveal_interval: Duration,
    /// How long the copy icon shows its confirmation glyph.
    pub copy_feedback: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            response_delay: Duration::from_millis(500),
            reveal_interval: Duration::from_millis(75),
            copy_feedback: Duration::from_millis(1000),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// API key from the environment first, then the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone())
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn timing(&self) -> Timing {
        let defaults = Timing::default();
        Timing {
            response_delay: self
                .response_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.response_delay),
            reveal_interval: self
                .reveal_interval_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.reveal_interval),
            copy_feedback: self
                .copy_feedback_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.copy_feedback),
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("gemini-chat").join("config.json"))
    }
}
