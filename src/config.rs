//! YAML/JSON configuration file support for dupehound.
//!
//! This module loads every stage's configuration (store, upstream client,
//! sync engine, dedup analysis) from a single document so a deployment
//! carries one config file instead of one per crate.
//!
//! ## Example YAML configuration
//!
//! ```yaml
//! version: "1.0"
//!
//! store:
//!   path: "dupehound.db"
//!
//! upstream:
//!   base_url: "https://paperless.example.com/api"
//!   auth_token: "..."
//!   timeout_secs: 30
//!
//! sync:
//!   page_size: 50
//!   max_ocr_length: 50000
//!   metadata_concurrency: 10
//!
//! dedup:
//!   num_permutations: 128
//!   num_bands: 16
//!   similarity_threshold: 0.72
//!   weights:
//!     jaccard: 90
//!     fuzzy: 10
//!     metadata: 0
//!     filename: 0
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use analysis::DedupConfig;
use scoring::ScoreWeights;
use sync::SyncConfig;
use upstream_client::{AuthMode, UpstreamClientConfig};

/// Errors that can occur while loading a dupehound configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration document for a dupehound deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DupehoundConfig {
    /// Configuration format version.
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub store: StoreYamlConfig,

    pub upstream: UpstreamYamlConfig,

    #[serde(default)]
    pub sync: SyncYamlConfig,

    #[serde(default)]
    pub dedup: DedupYamlConfig,
}

impl DupehoundConfig {
    /// Load a YAML or JSON configuration file, dispatching on extension
    /// (`.json` parses as JSON, anything else as YAML).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: DupehoundConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigLoadError> {
        let config: DupehoundConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;
        self.upstream.validate()?;
        self.sync.validate()?;
        self.dedup.validate()?;
        Ok(())
    }

    /// Materialise the typed [`UpstreamClientConfig`] this document describes.
    pub fn upstream_client_config(&self) -> UpstreamClientConfig {
        let auth = match &self.upstream.auth_token {
            Some(token) => AuthMode::Bearer(token.clone()),
            None => AuthMode::Basic {
                username: self.upstream.username.clone().unwrap_or_default(),
                password: self.upstream.password.clone().unwrap_or_default(),
            },
        };
        UpstreamClientConfig {
            base_url: self.upstream.base_url.clone(),
            auth,
            timeout: Duration::from_secs(self.upstream.timeout_secs),
            max_elapsed: Duration::from_secs(self.upstream.max_elapsed_secs),
            max_retry_after: Duration::from_secs(self.upstream.max_retry_after_secs),
        }
    }

    /// Materialise the typed [`SyncConfig`] this document describes.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            force_full_sync: self.sync.force_full_sync,
            page_size: self.sync.page_size,
            max_ocr_length: self.sync.max_ocr_length,
            metadata_concurrency: self.sync.metadata_concurrency,
            purge_before_sync: self.sync.purge_before_sync,
        }
    }

    /// Materialise the typed [`DedupConfig`] this document describes.
    pub fn dedup_config(&self) -> DedupConfig {
        DedupConfig {
            num_permutations: self.dedup.num_permutations,
            num_bands: self.dedup.num_bands,
            ngram_size: self.dedup.ngram_size,
            min_words: self.dedup.min_words,
            similarity_threshold: self.dedup.similarity_threshold,
            weights: ScoreWeights {
                jaccard: self.dedup.weights.jaccard,
                fuzzy: self.dedup.weights.fuzzy,
                metadata: self.dedup.weights.metadata,
                filename: self.dedup.weights.filename,
            },
            fuzzy_sample_size: self.dedup.fuzzy_sample_size,
            auto_analyze: self.dedup.auto_analyze,
            algorithm_version: self.dedup.algorithm_version.clone(),
        }
    }
}

/// Persistence backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreYamlConfig {
    /// Path to the SQLite database file; `:memory:` opens an ephemeral
    /// in-memory database instead of `InMemoryStore` (exercises the real
    /// schema without touching disk).
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreYamlConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "dupehound.db".to_string()
}

/// Upstream HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamYamlConfig {
    pub base_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub max_elapsed_secs: u64,
    #[serde(default = "default_max_retry_after_secs")]
    pub max_retry_after_secs: u64,
}

impl UpstreamYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.base_url.is_empty() {
            return Err(ConfigLoadError::Validation(
                "upstream.base_url must not be empty".to_string(),
            ));
        }
        if self.auth_token.is_none() && self.username.is_none() {
            return Err(ConfigLoadError::Validation(
                "upstream must set either auth_token or username/password".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retry_after_secs() -> u64 {
    60
}

/// Sync engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncYamlConfig {
    #[serde(default)]
    pub force_full_sync: bool,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_ocr_length")]
    pub max_ocr_length: usize,
    #[serde(default = "default_metadata_concurrency")]
    pub metadata_concurrency: usize,
    #[serde(default)]
    pub purge_before_sync: bool,
}

impl SyncYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.page_size == 0 {
            return Err(ConfigLoadError::Validation(
                "sync.page_size must be >= 1".to_string(),
            ));
        }
        if self.metadata_concurrency == 0 {
            return Err(ConfigLoadError::Validation(
                "sync.metadata_concurrency must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SyncYamlConfig {
    fn default() -> Self {
        Self {
            force_full_sync: false,
            page_size: default_page_size(),
            max_ocr_length: default_max_ocr_length(),
            metadata_concurrency: default_metadata_concurrency(),
            purge_before_sync: false,
        }
    }
}

fn default_page_size() -> u32 {
    50
}
fn default_max_ocr_length() -> usize {
    50_000
}
fn default_metadata_concurrency() -> usize {
    10
}

/// Deduplication analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupYamlConfig {
    #[serde(default = "default_num_permutations")]
    pub num_permutations: usize,
    #[serde(default = "default_num_bands")]
    pub num_bands: usize,
    #[serde(default = "default_ngram_size")]
    pub ngram_size: usize,
    #[serde(default = "default_min_words")]
    pub min_words: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub weights: ScoreWeightsYamlConfig,
    #[serde(default = "default_fuzzy_sample_size")]
    pub fuzzy_sample_size: usize,
    #[serde(default)]
    pub auto_analyze: bool,
    #[serde(default = "default_algorithm_version")]
    pub algorithm_version: String,
}

impl DedupYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.num_permutations == 0 {
            return Err(ConfigLoadError::Validation(
                "dedup.num_permutations must be >= 1".to_string(),
            ));
        }
        if self.num_bands == 0 || self.num_permutations % self.num_bands != 0 {
            return Err(ConfigLoadError::Validation(format!(
                "dedup.num_bands ({}) must evenly divide num_permutations ({})",
                self.num_bands, self.num_permutations
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigLoadError::Validation(
                "dedup.similarity_threshold must be in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DedupYamlConfig {
    fn default() -> Self {
        let defaults = DedupConfig::default();
        Self {
            num_permutations: defaults.num_permutations,
            num_bands: defaults.num_bands,
            ngram_size: defaults.ngram_size,
            min_words: defaults.min_words,
            similarity_threshold: defaults.similarity_threshold,
            weights: ScoreWeightsYamlConfig::default(),
            fuzzy_sample_size: defaults.fuzzy_sample_size,
            auto_analyze: defaults.auto_analyze,
            algorithm_version: defaults.algorithm_version,
        }
    }
}

fn default_num_permutations() -> usize {
    128
}
fn default_num_bands() -> usize {
    16
}
fn default_ngram_size() -> usize {
    textnorm::DEFAULT_NGRAM_SIZE
}
fn default_min_words() -> usize {
    20
}
fn default_similarity_threshold() -> f64 {
    0.72
}
fn default_fuzzy_sample_size() -> usize {
    4000
}
fn default_algorithm_version() -> String {
    "dupehound-v1".to_string()
}

/// Scoring weight configuration (see [`scoring::ScoreWeights`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeightsYamlConfig {
    #[serde(default = "default_weight_jaccard")]
    pub jaccard: u32,
    #[serde(default = "default_weight_fuzzy")]
    pub fuzzy: u32,
    #[serde(default)]
    pub metadata: u32,
    #[serde(default)]
    pub filename: u32,
}

impl Default for ScoreWeightsYamlConfig {
    fn default() -> Self {
        Self {
            jaccard: default_weight_jaccard(),
            fuzzy: default_weight_fuzzy(),
            metadata: 0,
            filename: 0,
        }
    }
}

fn default_weight_jaccard() -> u32 {
    90
}
fn default_weight_fuzzy() -> u32 {
    10
}
