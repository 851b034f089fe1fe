//! Configuration types for the avatar speech relay.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MiraConfig {
    /// Chat backend settings.
    pub llm: LlmConfig,
    /// Sentence segmentation thresholds.
    pub segmenter: SegmenterConfig,
    /// Avatar engine behaviour settings.
    pub avatar: AvatarConfig,
}

/// Chat backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the streaming chat backend.
    pub base_url: String,
    /// Language code sent with each message and used as the SSML
    /// `xml:lang` attribute (e.g. "en", "zh", "ja").
    pub language: String,
    /// Timeout in seconds for establishing the backend connection.
    pub connect_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_owned(),
            language: "en".to_owned(),
            connect_timeout_secs: 10,
        }
    }
}

/// Sentence segmentation thresholds, counted in logical units.
///
/// One unit is a CJK ideograph, an ASCII digit, or a contiguous run of
/// ASCII letters. Punctuation and whitespace count as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Minimum units accumulated before a punctuation cut is allowed.
    pub min_split_units: usize,
    /// Maximum units accumulated before a cut is forced.
    pub max_split_units: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_split_units: 2,
            max_split_units: 20,
        }
    }
}

/// Avatar engine behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Delay in ms after requesting an interrupt, giving the engine
    /// time to settle before new speech is dispatched. The engine
    /// provides no acknowledgement, so this is a timing heuristic.
    pub interrupt_settle_ms: u64,
    /// Voice name placed in the SSML markup. Empty = engine default.
    pub voice: String,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            interrupt_settle_ms: 2000,
            voice: String::new(),
        }
    }
}

impl MiraConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::RelayError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/mira/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("mira").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("mira")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/mira-config/config.toml")
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MiraConfig::default();
        assert!(!config.llm.base_url.is_empty());
        assert!(!config.llm.language.is_empty());
        assert!(config.segmenter.min_split_units > 0);
        assert!(config.segmenter.max_split_units > config.segmenter.min_split_units);
        assert!(config.avatar.interrupt_settle_ms > 0);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = MiraConfig::default();
        config.llm.language = "zh".to_owned();
        config.segmenter.max_split_units = 30;
        config.avatar.interrupt_settle_ms = 500;

        config.save_to_file(&path).unwrap();
        assert!(path.exists());

        let loaded = MiraConfig::from_file(&path).unwrap();
        assert_eq!(loaded.llm.language, "zh");
        assert_eq!(loaded.segmenter.max_split_units, 30);
        assert_eq!(loaded.avatar.interrupt_settle_ms, 500);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = MiraConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();

        let result = MiraConfig::from_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[llm]\nlanguage = \"ja\"\n").unwrap();

        let loaded = MiraConfig::from_file(&path).unwrap();
        assert_eq!(loaded.llm.language, "ja");
        assert_eq!(loaded.segmenter.max_split_units, 20);
        assert_eq!(loaded.avatar.interrupt_settle_ms, 2000);
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = MiraConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("mira"));
    }
}
