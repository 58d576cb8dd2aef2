//! Speech synthesis adapter.
//!
//! [`Synthesizer`] is the capability the pipeline calls once per text
//! segment; the remote provider is treated as an opaque fallible function
//! from text to audio bytes. Each call carries its own deadline because
//! different entry points tolerate different latencies.
//!
//! [`OpenAiSynthesizer`] targets `POST /v1/audio/speech`. A non-2xx reply
//! surfaces the provider's own message, 429 separately so callers can tell
//! rate limiting from a broken request.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::SynthesisConfig;
use crate::error::{Error, Result};
use crate::models::Audio;

const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Convert one text segment into audio bytes, bounded by `timeout`.
    async fn synthesize(&self, text: &str, timeout: Duration) -> Result<Audio>;
}

pub struct OpenAiSynthesizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
    format: String,
}

impl OpenAiSynthesizer {
    /// Build a synthesizer from config. The API key is resolved from
    /// `OPENAI_API_KEY`, falling back to `{secrets_dir}/openai_api_key.txt`.
    pub fn new(config: &SynthesisConfig, secrets_dir: &Path) -> Result<Self> {
        let api_key = resolve_api_key("OPENAI_API_KEY", &secrets_dir.join("openai_api_key.txt"))
            .ok_or_else(|| {
                Error::Validation(
                    "OpenAI API key missing: set OPENAI_API_KEY or provide openai_api_key.txt"
                        .into(),
                )
            })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            voice: config.voice.clone(),
            format: config.format.clone(),
        })
    }
}

#[async_trait]
impl Synthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str, timeout: Duration) -> Result<Audio> {
        let payload = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "format": self.format,
        });

        let response = self
            .client
            .post(SPEECH_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::from_http(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = message.trim().to_string();
            if status.as_u16() == 429 {
                return Err(Error::RateLimited(message));
            }
            return Err(Error::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::from_http(e, timeout))?
            .to_vec();
        debug!(bytes = data.len(), "synthesized segment");
        Ok(Audio {
            data,
            format: self.format.clone(),
        })
    }
}

/// Resolve an API credential: environment variable first, then a trimmed
/// key file. Returns `None` when neither is present.
pub(crate) fn resolve_api_key(env_var: &str, key_file: &Path) -> Option<String> {
    if let Ok(key) = std::env::var(env_var) {
        if !key.is_empty() {
            return Some(key);
        }
    }
    std::fs::read_to_string(key_file)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
