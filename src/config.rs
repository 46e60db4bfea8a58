use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::MemoryError;
use crate::memory::types::Importance;

/// Upper bound for `retention.prune_after_days` (about a century).
pub const MAX_PRUNE_AFTER_DAYS: i64 = 36_500;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MnemoConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub max_backups: usize,
    pub autosave: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub api_base: String,
    pub api_key_env: String,
    /// Output dimension of the `hashed` provider. Remote providers report their own.
    pub dimensions: usize,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_k: usize,
    pub dedup_threshold: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    pub capacity: usize,
    pub weight_low: f64,
    pub weight_normal: f64,
    pub weight_high: f64,
    pub half_life_hours: f64,
    pub recency_scale: f64,
    pub frequency_scale: f64,
    pub prune_after_days: i64,
    pub prune_min_accesses: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = default_mnemo_dir()
            .join("store")
            .to_string_lossy()
            .into_owned();
        Self {
            data_dir,
            max_backups: 5,
            autosave: true,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "text-embedding-3-small".into(),
            api_base: "https://api.openai.com/v1".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            dimensions: 256,
            timeout_ms: 15_000,
            max_retries: 2,
            retry_backoff_ms: 250,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            dedup_threshold: 0.9,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            weight_low: 0.0,
            weight_normal: 0.5,
            weight_high: 1.0,
            half_life_hours: 168.0,
            recency_scale: 1.0,
            frequency_scale: 0.25,
            prune_after_days: 60,
            prune_min_accesses: 3,
        }
    }
}

impl RetentionConfig {
    pub fn importance_weight(&self, importance: Importance) -> f64 {
        match importance {
            Importance::Low => self.weight_low,
            Importance::Normal => self.weight_normal,
            Importance::High => self.weight_high,
        }
    }
}

/// Returns `~/.mnemo/`
pub fn default_mnemo_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".mnemo")
}

/// Returns the default config file path: `~/.mnemo/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mnemo_dir().join("config.toml")
}

impl MnemoConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides and validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemoConfig::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides (MNEMO_DATA_DIR, MNEMO_CAPACITY,
    /// MNEMO_LOG_LEVEL, MNEMO_EMBEDDING_PROVIDER).
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("MNEMO_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("MNEMO_CAPACITY") {
            self.retention.capacity = val
                .parse()
                .with_context(|| format!("MNEMO_CAPACITY is not a number: {val}"))?;
        }
        if let Ok(val) = std::env::var("MNEMO_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("MNEMO_EMBEDDING_PROVIDER") {
            self.embedding.provider = val;
        }
        Ok(())
    }

    /// Reject settings the store cannot honour.
    pub fn validate(&self) -> Result<(), MemoryError> {
        let r = &self.retention;
        if r.capacity == 0 {
            return Err(MemoryError::Config("retention.capacity must be at least 1".into()));
        }
        if !(r.weight_low <= r.weight_normal && r.weight_normal <= r.weight_high) {
            return Err(MemoryError::Config(
                "importance weights must satisfy low <= normal <= high".into(),
            ));
        }
        if !(r.half_life_hours > 0.0) {
            return Err(MemoryError::Config("retention.half_life_hours must be positive".into()));
        }
        if r.recency_scale < 0.0 || r.frequency_scale < 0.0 {
            return Err(MemoryError::Config("retention scales must not be negative".into()));
        }
        if !(1..=MAX_PRUNE_AFTER_DAYS).contains(&r.prune_after_days) {
            return Err(MemoryError::Config(format!(
                "retention.prune_after_days must be within [1, {MAX_PRUNE_AFTER_DAYS}], got {}",
                r.prune_after_days
            )));
        }
        let t = self.retrieval.dedup_threshold;
        if !(-1.0..=1.0).contains(&t) {
            return Err(MemoryError::Config(format!(
                "retrieval.dedup_threshold must be within [-1, 1], got {t}"
            )));
        }
        if self.embedding.dimensions == 0 {
            return Err(MemoryError::Config("embedding.dimensions must be at least 1".into()));
        }
        Ok(())
    }

    /// Resolve the data directory, expanding `~` if needed.
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
