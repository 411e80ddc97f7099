//! narrate configuration management.

use crate::pronounce::PhonemeFormat;
use crate::ssml::chunker::DEFAULT_CHUNK_SIZE;
use crate::tts::google::API_KEY_ENV_VAR;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrateConfig {
    /// Google Cloud TTS API key. When absent, the GOOGLE_TTS_API_KEY
    /// environment variable is consulted instead.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Fallback language code passed with every request
    #[serde(default = "default_language_code")]
    pub language_code: String,

    /// Fallback voice name (optional; SSML voice tags take precedence)
    #[serde(default)]
    pub voice_name: Option<String>,

    /// Maximum characters per synthesis fragment
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Annotation format for pronunciation dictionaries
    #[serde(default)]
    pub format: PhonemeFormat,

    /// Default pronunciation dictionary CSV path
    #[serde(default)]
    pub dictionary: Option<PathBuf>,
}

fn default_language_code() -> String {
    "en-US".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for NarrateConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            language_code: default_language_code(),
            voice_name: None,
            chunk_size: default_chunk_size(),
            format: PhonemeFormat::default(),
            dictionary: None,
        }
    }
}

impl NarrateConfig {
    /// Get the config file path: ~/.config/narrate/narrate.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("narrate")
            .join("narrate.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: NarrateConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Resolve the API key: explicit config value wins over the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NarrateConfig::default();
        assert_eq!(config.language_code, "en-US");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.format, PhonemeFormat::Ipa);
        assert!(config.api_key.is_none());
        assert!(config.voice_name.is_none());
        assert!(config.dictionary.is_none());
    }

    #[test]
    fn test_config_path() {
        let path = NarrateConfig::config_path();
        assert!(path.is_ok());
        let path = path.unwrap();
        assert!(path.ends_with("narrate/narrate.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
api_key = "secret"
language_code = "en-GB"
voice_name = "en-GB-News-G"
chunk_size = 2000
format = "alias"
dictionary = "/path/to/pronunciations.csv"
"#;
        let config: NarrateConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.language_code, "en-GB");
        assert_eq!(config.voice_name.as_deref(), Some("en-GB-News-G"));
        assert_eq!(config.chunk_size, 2000);
        assert_eq!(config.format, PhonemeFormat::Alias);
        assert_eq!(
            config.dictionary,
            Some(PathBuf::from("/path/to/pronunciations.csv"))
        );
    }

    #[test]
    fn test_parse_empty_config() {
        let config: NarrateConfig = toml::from_str("").unwrap();
        assert_eq!(config.language_code, "en-US");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.format, PhonemeFormat::Ipa);
    }

    #[test]
    fn test_explicit_key_beats_environment() {
        let config = NarrateConfig {
            api_key: Some("from-config".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-config"));
    }
}
