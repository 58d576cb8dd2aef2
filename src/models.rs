//! Core data models used throughout mailcast.
//!
//! These types represent the message, text segments, and audio that flow
//! through the fetch → split → synthesize → persist pipeline.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

/// A message fetched from the mailbox source.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub id: String,
    pub subject: String,
    pub body: String,
}

/// One bounded slice of the source text, destined for a single synthesis
/// call. Indices are 1-based and contiguous; concatenating segment texts in
/// index order reproduces the split input exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub text: String,
}

impl Segment {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Raw synthesized audio for one segment (or the merged whole).
#[derive(Debug, Clone)]
pub struct Audio {
    pub data: Vec<u8>,
    /// Container format name as reported to the provider (e.g. `"mp3"`).
    pub format: String,
}

/// Result of one completed message run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub message_id: String,
    pub merged_path: PathBuf,
    pub chunk_count: usize,
    #[serde(skip)]
    pub audio: Audio,
}

impl RunOutput {
    /// The merged audio as standard base64, for callers that ship it over
    /// JSON instead of reading the file back.
    pub fn audio_base64(&self) -> String {
        STANDARD.encode(&self.audio.data)
    }
}

/// Outcome of a ledger-gated run.
#[derive(Debug)]
pub enum RunStatus {
    /// The message was already in the ledger; no work was performed.
    Skipped,
    Completed(RunOutput),
}

impl RunStatus {
    pub fn is_skipped(&self) -> bool {
        matches!(self, RunStatus::Skipped)
    }
}
