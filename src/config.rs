use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration with retrieval, cache and loop budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            cache: CacheConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of merged results to return
    pub max_results: usize,

    /// Per-source retrieval timeout in milliseconds
    pub source_timeout_ms: u64,

    /// Outbound web-search timeout in milliseconds
    pub web_search_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            source_timeout_ms: 5_000,
            web_search_timeout_ms: 10_000,
        }
    }
}

impl RetrievalConfig {
    /// Per-source retrieval timeout as a Duration
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    /// Outbound web-search timeout as a Duration
    pub fn web_search_timeout(&self) -> Duration {
        Duration::from_millis(self.web_search_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Web-search cache entry lifetime in seconds (15 minutes)
    pub ttl_secs: u64,

    /// Bounded query-history length per conversation
    pub query_history_max: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 900,
            query_history_max: 10,
        }
    }
}

impl CacheConfig {
    /// Web-search cache entry lifetime as a Duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Step budget for the default mode
    pub max_steps: usize,

    /// Step budget for deep mode
    pub max_steps_deep: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            max_steps_deep: 12,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = EngineConfig::default();
            config.save()?;
            return Ok(config);
        }

        let contents =
            fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: EngineConfig =
            toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".persona-engine").join("config.toml"))
    }

    /// Step budget for the requested mode
    pub fn step_budget(&self, deep_mode: bool) -> usize {
        if deep_mode {
            self.generation.max_steps_deep
        } else {
            self.generation.max_steps
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.ttl_secs, 900);
        assert_eq!(config.cache.query_history_max, 10);
        assert_eq!(config.retrieval.max_results, 10);
    }

    #[test]
    fn test_step_budget_modes() {
        let config = EngineConfig::default();
        assert_eq!(config.step_budget(false), 5);
        assert_eq!(config.step_budget(true), 12);
        assert!(config.step_budget(true) > config.step_budget(false));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = EngineConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_string).unwrap();
        assert_eq!(parsed.cache.ttl_secs, config.cache.ttl_secs);
        assert_eq!(parsed.generation.max_steps_deep, config.generation.max_steps_deep);
    }

    #[test]
    fn test_duration_accessors() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.ttl(), Duration::from_secs(900));
        assert_eq!(config.retrieval.source_timeout(), Duration::from_millis(5_000));
        assert_eq!(
            config.retrieval.web_search_timeout(),
            Duration::from_millis(10_000)
        );
    }
}
