//! TOML configuration parsing and validation.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub resource_dirs: Vec<PathBuf>,
    #[serde(default = "default_text_column")]
    pub text_column: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub remove_hashtag: bool,
    #[serde(default = "default_true")]
    pub remove_mention: bool,
    #[serde(default = "default_true")]
    pub remove_emoji: bool,
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            file_paths: Vec::new(),
            resource_dirs: Vec::new(),
            text_column: default_text_column(),
            batch_size: default_batch_size(),
            remove_hashtag: true,
            remove_mention: true,
            remove_emoji: true,
            fail_fast: false,
        }
    }
}

fn default_text_column() -> String {
    "Tweet Text".to_string()
}
fn default_batch_size() -> usize {
    1000
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    #[serde(default)]
    pub end_page: Option<u32>,
    #[serde(default = "default_large_file_threshold")]
    pub large_file_threshold_bytes: u64,
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
    #[serde(default)]
    pub blob_dir: Option<PathBuf>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            start_page: default_start_page(),
            end_page: None,
            large_file_threshold_bytes: default_large_file_threshold(),
            max_chunk_size: default_max_chunk_size(),
            blob_dir: None,
        }
    }
}

fn default_start_page() -> u32 {
    1
}
fn default_large_file_threshold() -> u64 {
    50 * 1024 * 1024
}
fn default_max_chunk_size() -> usize {
    crate::chunk::DEFAULT_MAX_CHUNK_SIZE
}

impl Config {
    /// Where segmented-mode full text is archived. Defaults to `blobs/`
    /// next to the database file.
    pub fn blob_dir(&self) -> PathBuf {
        match &self.extract.blob_dir {
            Some(dir) => dir.clone(),
            None => self
                .db
                .path
                .parent()
                .map(|p| p.join("blobs"))
                .unwrap_or_else(|| PathBuf::from("blobs")),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.import.batch_size == 0 {
        anyhow::bail!("import.batch_size must be > 0");
    }

    if config.import.text_column.trim().is_empty() {
        anyhow::bail!("import.text_column must not be empty");
    }

    if config.extract.start_page == 0 {
        anyhow::bail!("extract.start_page must be >= 1");
    }

    if let Some(end) = config.extract.end_page {
        if end < config.extract.start_page {
            anyhow::bail!(
                "extract.end_page ({}) must be >= start_page ({})",
                end,
                config.extract.start_page
            );
        }
    }

    if config.extract.max_chunk_size == 0 {
        anyhow::bail!("extract.max_chunk_size must be > 0");
    }

    Ok(())
}
