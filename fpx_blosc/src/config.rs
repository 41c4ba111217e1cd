use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    CONFIG_COMPRESSOR, CONFIG_LEVEL, CONFIG_SHUFFLE, CONFIG_THREADS, DEFAULT_STAGE_NAME,
    DEFAULT_TYPE_SIZE,
};

/// Stage configuration read at construction.
///
/// ```toml
/// name = "blosc"
/// default_type_size = 2
///
/// [compression]
/// compressor = 5
/// level = 4
/// shuffle = 1
/// threads = 2
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Element size used when a frame arrives without a data type.
    #[serde(default = "default_type_size")]
    pub default_type_size: usize,
    #[serde(default)]
    pub compression: InitialSettings,
}

/// Initial commanded settings. Values go through the same validation as a
/// runtime update, so out-of-range entries are clamped rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitialSettings {
    pub compressor: Option<Value>,
    pub level: Option<Value>,
    pub shuffle: Option<Value>,
    pub threads: Option<Value>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            default_type_size: default_type_size(),
            compression: InitialSettings::default(),
        }
    }
}

impl StageConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: StageConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".into()));
        }
        if self.default_type_size == 0 {
            return Err(ConfigError::Invalid("default_type_size must be at least 1".into()));
        }
        Ok(())
    }

    /// The `[compression]` table as a control-channel update.
    pub fn initial_update(&self) -> Map<String, Value> {
        let c = &self.compression;
        [
            (CONFIG_COMPRESSOR, &c.compressor),
            (CONFIG_LEVEL, &c.level),
            (CONFIG_SHUFFLE, &c.shuffle),
            (CONFIG_THREADS, &c.threads),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key.to_string(), v)))
        .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn default_name() -> String {
    DEFAULT_STAGE_NAME.into()
}
fn default_type_size() -> usize {
    DEFAULT_TYPE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config = StageConfig::from_toml_str("").unwrap();
        assert_eq!(config.name, "blosc");
        assert_eq!(config.default_type_size, 2);
        assert!(config.initial_update().is_empty());
    }

    #[test]
    fn compression_table_becomes_update() {
        let config = StageConfig::from_toml_str(
            r#"
            name = "compress"
            [compression]
            compressor = 4
            level = 12
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "compress");
        let update = config.initial_update();
        assert_eq!(update.len(), 2);
        assert_eq!(update["compressor"], json!(4));
        assert_eq!(update["level"], json!(12));
    }

    #[test]
    fn zero_default_type_size_is_rejected() {
        let err = StageConfig::from_toml_str("default_type_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = StageConfig::from_toml_str("name = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_type_size = 4\n[compression]\nthreads = 2").unwrap();
        let config = StageConfig::load(file.path()).unwrap();
        assert_eq!(config.default_type_size, 4);
        assert_eq!(config.initial_update()["threads"], json!(2));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StageConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(..)));
    }
}
