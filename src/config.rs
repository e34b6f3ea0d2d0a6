/// Configuration module for ragdex.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::indexer::chunker::{Chunker, DEFAULT_OVERLAP, DEFAULT_WINDOW};
use crate::store::StorePaths;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

// ── Default value functions ──────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./ragdex-data")
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

fn default_search_top_k() -> usize {
    5
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_generation_model() -> String {
    "llama3.2".to_string()
}

fn default_generation_timeout() -> u64 {
    120
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Directory holding `vectors.idx` and `metadata.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Window and overlap, in characters.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window")]
    pub window: usize,

    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// `ollama` or `mock`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Answer generation. The model id is fixed here, never discovered per request.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            chunking: ChunkingConfig::default(),
            search_top_k: default_search_top_k(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            overlap: default_overlap(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            base_url: default_ollama_url(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            base_url: default_ollama_url(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template next to it. Invalid JSON falls
    /// back to defaults with a warning.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("{} not found, using defaults", config_path.display());
            let cfg = Self::default();

            if config_path == Path::new(DEFAULT_CONFIG_PATH) {
                match cfg.save(config_path) {
                    Ok(()) => info!("Generated config template: {}", config_path.display()),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config: {}", config_path.display()))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {}: {e}", config_path.display());
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {}", config_path.display());
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        self.chunker().context("invalid chunking settings")?;
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(
            self.embedding.dimensions > 0,
            "embedding.dimensions must be positive"
        );
        anyhow::ensure!(
            matches!(self.embedding.provider.as_str(), "ollama" | "mock"),
            "embedding.provider must be 'ollama' or 'mock', got '{}'",
            self.embedding.provider
        );
        anyhow::ensure!(
            !self.generation.model.trim().is_empty(),
            "generation.model must be set"
        );
        Ok(())
    }

    /// The chunker described by `chunking`.
    pub fn chunker(&self) -> crate::error::Result<Chunker> {
        Chunker::new(self.chunking.window, self.chunking.overlap)
    }

    #[must_use]
    pub fn store_paths(&self) -> StorePaths {
        StorePaths::in_dir(&self.data_dir)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
