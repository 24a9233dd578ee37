use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{NamerError, Result};

pub const DEFAULT_LOCAL_MODEL: &str = "llava-phi3";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_CHARS: usize = 64;

/// Smallest stem budget that still fits a date prefix, the placeholder name
/// and a collision suffix.
pub const MIN_MAX_CHARS: usize = 24;

/// Optional on-disk settings, overridden field by field by the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub model: Option<String>,
    pub ollama_host: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_chars: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub local_model: String,
    pub ollama_host: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    /// Only set when the user configured one; its presence implies hosted mode.
    pub openai_model: Option<String>,
    pub timeout: Duration,
    pub max_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_model: DEFAULT_LOCAL_MODEL.to_string(),
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

impl Config {
    fn get_config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().ok_or_else(|| {
            NamerError::Configuration("Could not determine home directory".to_string())
        })?;
        Ok(home_dir.join(".aisn").join("config.json"))
    }

    pub fn get_config_file_path() -> Result<PathBuf> {
        Self::get_config_path()
    }

    /// Load the config file (if any) and apply the process environment on top.
    pub fn load() -> Result<Config> {
        let file = match Self::get_config_path() {
            Ok(path) if path.exists() => Self::read_file(&path)?,
            _ => FileConfig::default(),
        };
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    pub fn read_file(path: &std::path::Path) -> Result<FileConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            NamerError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            NamerError::Configuration(format!("malformed {}: {}", path.display(), e))
        })
    }

    /// Build a config from file settings plus a variable lookup.
    ///
    /// Empty variables count as unset.
    pub fn from_sources<F>(file: FileConfig, lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs = match var("AISN_TIMEOUT_SECS") {
            Some(raw) => parse_number::<u64>("AISN_TIMEOUT_SECS", &raw)?,
            None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(NamerError::Configuration(
                "timeout must be at least one second".to_string(),
            ));
        }

        let max_chars = match var("AISN_MAX_CHARS") {
            Some(raw) => parse_number::<usize>("AISN_MAX_CHARS", &raw)?,
            None => file.max_chars.unwrap_or(DEFAULT_MAX_CHARS),
        };
        if max_chars < MIN_MAX_CHARS {
            return Err(NamerError::Configuration(format!(
                "maximum filename length must be at least {} characters, got {}",
                MIN_MAX_CHARS, max_chars
            )));
        }

        Ok(Config {
            local_model: var("AISN_MODEL")
                .or(file.model)
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
            ollama_host: var("AISN_OLLAMA_HOST")
                .or_else(|| var("OLLAMA_HOST"))
                .or(file.ollama_host)
                .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
            openai_api_key: var("AISN_OPENAI_API_KEY")
                .or_else(|| var("OPENAI_API_KEY"))
                .or(file.openai_api_key),
            openai_base_url: var("AISN_OPENAI_BASE_URL")
                .or(file.openai_base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_model: var("AISN_OPENAI_MODEL").or(file.openai_model),
            timeout: Duration::from_secs(timeout_secs),
            max_chars,
        })
    }

    pub fn hosted_model(&self) -> &str {
        self.openai_model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| NamerError::Configuration(format!("{} is not a valid number: {:?}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::from_sources(FileConfig::default(), lookup(&[])).unwrap();
        assert_eq!(config.local_model, "llava-phi3");
        assert_eq!(config.ollama_host, "http://localhost:11434");
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert!(config.openai_api_key.is_none());
        assert!(config.openai_model.is_none());
        assert_eq!(config.hosted_model(), "gpt-4o-mini");
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.max_chars, 64);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = FileConfig {
            model: Some("llava".to_string()),
            openai_model: Some("from-file".to_string()),
            timeout_secs: Some(30),
            ..Default::default()
        };
        let config = Config::from_sources(
            file,
            lookup(&[
                ("AISN_MODEL", "llama3.2-vision"),
                ("AISN_OPENAI_MODEL", "gpt-4o"),
                ("AISN_OPENAI_BASE_URL", "https://openrouter.ai/api/v1"),
            ]),
        )
        .unwrap();
        assert_eq!(config.local_model, "llama3.2-vision");
        assert_eq!(config.openai_model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.openai_base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_namespaced_key_wins_over_generic_key() {
        let config = Config::from_sources(
            FileConfig::default(),
            lookup(&[("OPENAI_API_KEY", "generic"), ("AISN_OPENAI_API_KEY", "namespaced")]),
        )
        .unwrap();
        assert_eq!(config.openai_api_key.as_deref(), Some("namespaced"));

        let config =
            Config::from_sources(FileConfig::default(), lookup(&[("OPENAI_API_KEY", "generic")]))
                .unwrap();
        assert_eq!(config.openai_api_key.as_deref(), Some("generic"));
    }

    #[test]
    fn test_empty_variables_are_ignored() {
        let config = Config::from_sources(
            FileConfig::default(),
            lookup(&[("AISN_MODEL", ""), ("AISN_OPENAI_MODEL", "  ")]),
        )
        .unwrap();
        assert_eq!(config.local_model, DEFAULT_LOCAL_MODEL);
        assert!(config.openai_model.is_none());
    }

    #[test]
    fn test_invalid_numbers_are_configuration_errors() {
        let err = Config::from_sources(FileConfig::default(), lookup(&[("AISN_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.is_fatal());

        let err = Config::from_sources(FileConfig::default(), lookup(&[("AISN_MAX_CHARS", "8")]))
            .unwrap_err();
        assert!(matches!(err, NamerError::Configuration(_)));
    }

    #[test]
    fn test_read_file_rejects_malformed_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::read_file(&path),
            Err(NamerError::Configuration(_))
        ));

        fs::write(&path, r#"{"model": "bakllava", "max_chars": 40}"#).unwrap();
        let file = Config::read_file(&path).unwrap();
        assert_eq!(file.model.as_deref(), Some("bakllava"));
        assert_eq!(file.max_chars, Some(40));
    }
}
