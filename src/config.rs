use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};
use thiserror::Error;

use crate::InternalResult;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Nested `onSuccess`/`onError`/`onTick` dispatch deeper than this fails.
    #[serde(default = "default_max_action_depth")]
    pub max_action_depth: usize,

    #[serde(default = "default_expression_cache_capacity")]
    pub expression_cache_capacity: usize,

    #[serde(default)]
    pub pipes: PipeConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub file_picker: FilePickerConfig,

    #[serde(default)]
    pub interval: IntervalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeConfig {
    #[serde(default = "default_currency")]
    pub default_currency: String,

    #[serde(default = "default_truncate_length")]
    pub truncate_length: usize,

    #[serde(default = "default_join_separator")]
    pub join_separator: String,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            truncate_length: default_truncate_length(),
            join_separator: default_join_separator(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Relative request URLs are joined onto this.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_fetch_timeout", with = "duration_ms")]
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: default_fetch_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePickerConfig {
    /// Bytes.
    #[serde(default = "default_max_file_size")]
    pub max_size: u64,
}

impl Default for FilePickerConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalConfig {
    #[serde(default = "default_minimum_period", with = "duration_ms")]
    pub minimum_period: Duration,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            minimum_period: default_minimum_period(),
        }
    }
}

fn default_max_action_depth() -> usize {
    10
}

fn default_expression_cache_capacity() -> usize {
    512
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_truncate_length() -> usize {
    50
}

fn default_join_separator() -> String {
    ", ".to_string()
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_minimum_period() -> Duration {
    Duration::from_millis(1)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_action_depth: default_max_action_depth(),
            expression_cache_capacity: default_expression_cache_capacity(),
            pipes: PipeConfig::default(),
            fetch: FetchConfig::default(),
            file_picker: FilePickerConfig::default(),
            interval: IntervalConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> InternalResult<Self> {
        let file = File::open(path).map_err(ConfigError::from)?;
        let config = serde_json::from_reader(BufReader::new(file)).map_err(ConfigError::from)?;
        Ok(config)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> InternalResult<Self> {
        let config = serde_json::from_str(s).map_err(ConfigError::from)?;
        Ok(config)
    }
}
