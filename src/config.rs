//! Configuration loading and management for summa-button.
//!
//! Loads settings from `summa-button.toml` with an environment variable override for the API key.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::summary::SummaryOptions;

const CONFIG_FILE: &str = "summa-button.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Chat-completion provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Secret key, overridden by `OPENAI_API_KEY`
    pub api_key: Option<String>,
    /// API root, `/chat/completions` is appended
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Page fetching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// HTML proxy endpoint, the target URL is passed as `?url=`
    pub proxy_url: String,
    pub timeout_secs: u64,
    /// Pages fetched at once; 1 keeps fetching sequential
    pub concurrency: usize,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub summary: SummaryOptions,
    pub extractor: ExtractorConfig,
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("no {} found, using defaults", CONFIG_FILE);
                let mut config = Config::default();
                config.apply_env_key(std::env::var("OPENAI_API_KEY").ok());
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");

        config.apply_env_key(std::env::var("OPENAI_API_KEY").ok());
        Ok(config)
    }

    fn apply_env_key(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.openai.api_key = Some(key);
        }
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        // Check current directory first
        let local_config = PathBuf::from(CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        // Check home directory
        let home_config = dirs::home_dir()?
            .join(".config")
            .join("summa-button")
            .join(CONFIG_FILE);
        home_config.exists().then_some(home_config)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.openai.api_key.as_deref()
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            proxy_url: "https://api.allorigins.win/get".to_string(),
            timeout_secs: 30,
            concurrency: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::{OutputFormat, SummaryLength};
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
        assert_eq!(config.extractor.proxy_url, "https://api.allorigins.win/get");
        assert_eq!(config.extractor.concurrency, 1);
        assert_eq!(config.summary.model, "gpt-3.5-turbo");
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[summary]
model = "gpt-4"
summary_length = "long"
output_format = "numbered"

[extractor]
concurrency = 4
"#
        )
        .unwrap();

        let config: Config = toml::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(config.summary.model, "gpt-4");
        assert_eq!(config.summary.summary_length, SummaryLength::Long);
        assert_eq!(config.summary.output_format, OutputFormat::Numbered);
        assert_eq!(config.summary.max_tokens, 500);
        assert_eq!(config.extractor.concurrency, 4);
        assert_eq!(config.extractor.timeout_secs, 30);
        assert_eq!(config.openai.timeout_secs, 60);
    }

    #[test]
    fn test_bad_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[summary]\nmax_tokens = \"lots\"").unwrap();
        assert!(matches!(
            Config::load_from(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load_from(&dir.path().join("nope.toml")),
            Err(ConfigError::ReadError(_))
        ));
    }

    #[test]
    fn test_env_key_overrides_file() {
        let mut config: Config = toml::from_str("[openai]\napi_key = \"sk-file\"").unwrap();
        config.apply_env_key(Some("sk-env".to_string()));
        assert_eq!(config.api_key(), Some("sk-env"));

        config.apply_env_key(Some("  ".to_string()));
        assert_eq!(config.api_key(), Some("sk-env"));

        config.apply_env_key(None);
        assert_eq!(config.api_key(), Some("sk-env"));
    }
}
