use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub rewrite: RewriteConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Directory searched for key files when the corresponding environment
    /// variables are unset.
    #[serde(default = "default_secrets_dir")]
    pub secrets_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            synthesis: SynthesisConfig::default(),
            rewrite: RewriteConfig::default(),
            storage: StorageConfig::default(),
            ledger: LedgerConfig::default(),
            secrets_dir: default_secrets_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Per-request deadline for mailbox API calls.
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
    /// Default search query used when resolving the latest message.
    #[serde(default)]
    pub query: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_source_timeout_secs(),
            query: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SynthesisConfig {
    #[serde(default = "default_tts_model")]
    pub model: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_format")]
    pub format: String,
    /// Per-synthesis-call character bound. The provider caps input at 4096
    /// characters; the default leaves headroom.
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    /// Per-chunk synthesis deadline.
    #[serde(default = "default_synthesis_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            model: default_tts_model(),
            voice: default_voice(),
            format: default_format(),
            chunk_chars: default_chunk_chars(),
            timeout_secs: default_synthesis_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RewriteConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Instruction file prepended to every rewrite call.
    #[serde(default = "default_prompt_path")]
    pub prompt_path: PathBuf,
    /// Byte bound per rewrite call; cuts land on sentence boundaries.
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,
    #[serde(default = "default_rewrite_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            prompt_path: default_prompt_path(),
            chunk_bytes: default_chunk_bytes(),
            timeout_secs: default_rewrite_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root for `parts/{id}/...` and `merged/{id}/...` audio artifacts.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
    /// Root for rewritten `{id}/{base}_part{N}.txt` text artifacts.
    #[serde(default = "default_text_dir")]
    pub text_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
            text_dir: default_text_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

fn default_secrets_dir() -> PathBuf {
    PathBuf::from("secrets")
}
fn default_source_timeout_secs() -> u64 {
    30
}
fn default_tts_model() -> String {
    "tts-1".to_string()
}
fn default_voice() -> String {
    "alloy".to_string()
}
fn default_format() -> String {
    "mp3".to_string()
}
fn default_chunk_chars() -> usize {
    3000
}
fn default_synthesis_timeout_secs() -> u64 {
    300
}
fn default_chat_model() -> String {
    "gpt-4o".to_string()
}
fn default_prompt_path() -> PathBuf {
    PathBuf::from("prompt/podcast.txt")
}
fn default_chunk_bytes() -> usize {
    8 * 1024
}
fn default_rewrite_timeout_secs() -> u64 {
    180
}
fn default_audio_dir() -> PathBuf {
    PathBuf::from("audio")
}
fn default_text_dir() -> PathBuf {
    PathBuf::from("text")
}
fn default_ledger_path() -> PathBuf {
    PathBuf::from("log/processed_ids.txt")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.synthesis.chunk_chars == 0 {
        anyhow::bail!("synthesis.chunk_chars must be > 0");
    }
    if config.synthesis.timeout_secs == 0 {
        anyhow::bail!("synthesis.timeout_secs must be > 0");
    }
    if config.synthesis.format.is_empty() {
        anyhow::bail!("synthesis.format must not be empty");
    }
    if config.rewrite.chunk_bytes == 0 {
        anyhow::bail!("rewrite.chunk_bytes must be > 0");
    }
    if config.rewrite.timeout_secs == 0 {
        anyhow::bail!("rewrite.timeout_secs must be > 0");
    }
    if config.source.timeout_secs == 0 {
        anyhow::bail!("source.timeout_secs must be > 0");
    }

    Ok(config)
}
