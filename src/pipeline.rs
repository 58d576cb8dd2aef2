//! Sequential synthesis orchestration.
//!
//! Coordinates the full run: fetch → text extraction → split → per-chunk
//! synthesis → per-chunk persistence → merged artifact → ledger append.
//! Chunks are processed strictly in index order and the merged output is
//! the raw byte concatenation of the chunk outputs, so call order is the
//! ordering guarantee. Any chunk failure aborts the whole run: no merged
//! artifact is written and the ledger is left untouched. Chunk artifacts
//! already persisted by a failed attempt stay on disk.
//!
//! The pipeline is an immutable bundle of collaborators shared through
//! `Arc`. Rebinding a collaborator (e.g. after re-authorization) means
//! building a new pipeline and swapping the shared handle, never mutating
//! a live one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::Config;
use crate::error::{Error, Result, Stage};
use crate::ledger::Ledger;
use crate::models::{Audio, RunOutput, RunStatus, Segment};
use crate::name::artifact_base_name;
use crate::parts::ordered_part_files;
use crate::rewrite::Rewriter;
use crate::source::MessageSource;
use crate::split::{split_text, truncate_chars, SplitLimit, SENTENCE_ENDINGS};
use crate::store::AudioStore;
use crate::synth::Synthesizer;

/// Per-run knobs for the synthesis path.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Cap on source text length in code points; `None` reads everything.
    pub char_limit: Option<usize>,
    /// Maximum characters per synthesis call.
    pub chunk_chars: usize,
    /// Deadline for each synthesis call.
    pub chunk_timeout: Duration,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            char_limit: None,
            chunk_chars: config.synthesis.chunk_chars,
            chunk_timeout: Duration::from_secs(config.synthesis.timeout_secs),
        }
    }

    pub fn with_char_limit(mut self, limit: Option<usize>) -> Self {
        self.char_limit = limit;
        self
    }
}

/// Knobs for the rewrite stage.
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Byte bound per rewrite call.
    pub chunk_bytes: usize,
    /// Deadline for each rewrite call.
    pub timeout: Duration,
    /// Root directory for the rewritten part files.
    pub text_dir: PathBuf,
}

impl PrepareOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_bytes: config.rewrite.chunk_bytes,
            timeout: Duration::from_secs(config.rewrite.timeout_secs),
            text_dir: config.storage.text_dir.clone(),
        }
    }
}

/// The message → audio pipeline with its collaborators bound.
pub struct SpeechPipeline {
    source: Arc<dyn MessageSource>,
    synth: Arc<dyn Synthesizer>,
    store: Arc<dyn AudioStore>,
    ledger: Arc<Ledger>,
}

impl SpeechPipeline {
    pub fn new(
        source: Arc<dyn MessageSource>,
        synth: Arc<dyn Synthesizer>,
        store: Arc<dyn AudioStore>,
        ledger: Arc<Ledger>,
    ) -> Self {
        Self {
            source,
            synth,
            store,
            ledger,
        }
    }

    /// Run one message unconditionally: fetch, split, synthesize every
    /// chunk in order, persist chunk and merged artifacts.
    ///
    /// Artifacts are namespaced under the message id: chunk audio at
    /// `parts/{id}/{base}_part{N}` and the merged stream at
    /// `merged/{id}/{base}`, where `base` is the sanitized subject
    /// (message id when the subject sanitizes to nothing).
    pub async fn run_message(&self, id: &str, opts: &RunOptions) -> Result<RunOutput> {
        if id.trim().is_empty() {
            return Err(Error::Validation("message id required".into()));
        }

        let message = self
            .source
            .get_by_id(id)
            .await
            .map_err(|e| Error::at_stage(Stage::Fetch, e))?;

        let mut text = message.body.as_str();
        if let Some(limit) = opts.char_limit.filter(|l| *l > 0) {
            text = truncate_chars(text, limit);
        }
        if text.is_empty() {
            return Err(Error::Validation(format!(
                "message {id} has no text content"
            )));
        }

        let base = artifact_base_name(&message.subject, &message.id);
        let segments = split_text(text, SplitLimit::Chars(opts.chunk_chars), SENTENCE_ENDINGS);
        info!(
            id,
            subject = %message.subject,
            chunks = segments.len(),
            "starting synthesis"
        );

        self.synthesize_ordered(&message.id, &base, segments, opts.chunk_timeout)
            .await
    }

    /// Ledger-gated wrapper around [`run_message`](Self::run_message):
    /// skips messages already recorded and records an id only after its
    /// run fully succeeded.
    pub async fn run_if_new(&self, id: &str, opts: &RunOptions) -> Result<RunStatus> {
        if self.ledger.contains(id)? {
            info!(id, "already processed, skipping");
            return Ok(RunStatus::Skipped);
        }
        let output = self.run_message(id, opts).await?;
        self.ledger.record(id)?;
        Ok(RunStatus::Completed(output))
    }

    /// Resolve the newest inbox message (optionally filtered by `query`)
    /// and process it if it is new.
    pub async fn run_latest(&self, query: Option<&str>, opts: &RunOptions) -> Result<RunStatus> {
        let id = self
            .source
            .latest_id(query)
            .await
            .map_err(|e| Error::at_stage(Stage::Fetch, e))?;
        info!(id = %id, "resolved latest message");
        self.run_if_new(&id, opts).await
    }

    /// Rewrite stage: byte-split `text`, push each chunk through the
    /// rewriter, and save the results as `{base}_part{N}.txt` under
    /// `{text_dir}/{message_id}/`. Returns the written paths in order.
    pub async fn prepare_parts(
        &self,
        rewriter: &dyn Rewriter,
        message_id: &str,
        base: &str,
        text: &str,
        opts: &PrepareOptions,
    ) -> Result<Vec<PathBuf>> {
        let chunks = split_text(text, SplitLimit::Bytes(opts.chunk_bytes), SENTENCE_ENDINGS);
        let total = chunks.len();
        let out_dir = opts.text_dir.join(message_id);
        std::fs::create_dir_all(&out_dir)?;

        let mut written = Vec::with_capacity(total);
        for chunk in &chunks {
            info!(
                chunk = chunk.index,
                total,
                bytes = chunk.text.len(),
                "rewriting chunk"
            );
            let rewritten = rewriter
                .rewrite(&chunk.text, opts.timeout)
                .await
                .map_err(|e| Error::at_stage(Stage::Rewrite(chunk.index), e))?;
            let path = out_dir.join(format!("{base}_part{}.txt", chunk.index));
            std::fs::write(&path, rewritten)
                .map_err(|e| Error::at_stage(Stage::PersistChunk(chunk.index), e.into()))?;
            written.push(path);
        }
        info!(parts = written.len(), dir = %out_dir.display(), "rewrite stage complete");
        Ok(written)
    }

    /// Synthesize pre-chunked part files from `dir` in parsed-index order
    /// (unparsable names last) and merge them into one artifact.
    pub async fn run_from_parts(
        &self,
        dir: &Path,
        message_id: &str,
        opts: &RunOptions,
    ) -> Result<RunOutput> {
        let files = ordered_part_files(dir)?;
        if files.is_empty() {
            return Err(Error::Validation(format!(
                "no part files found in {}",
                dir.display()
            )));
        }

        let mut segments = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            let text = std::fs::read_to_string(file)
                .map_err(|e| Error::at_stage(Stage::LoadPart(i + 1), e.into()))?;
            segments.push(Segment {
                index: i + 1,
                text,
            });
        }
        info!(id = message_id, chunks = segments.len(), "starting synthesis from part files");

        self.synthesize_ordered(message_id, message_id, segments, opts.chunk_timeout)
            .await
    }

    /// Submit a ledger-gated run to the background executor. The handle
    /// can be awaited but the task owns everything it needs, so callers
    /// may drop it (fire-and-forget). Ledger writes stay serialized
    /// against any concurrent foreground run in this process.
    pub fn spawn_run_if_new(
        self: &Arc<Self>,
        id: String,
        opts: RunOptions,
    ) -> tokio::task::JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            match pipeline.run_if_new(&id, &opts).await {
                Ok(RunStatus::Skipped) => info!(id = %id, "background run skipped"),
                Ok(RunStatus::Completed(output)) => {
                    info!(id = %id, path = %output.merged_path.display(), "background run completed");
                }
                Err(e) => error!(id = %id, error = %e, "background run failed"),
            }
        })
    }

    /// The sequential core: one synthesis call per segment, strictly in
    /// index order, each chunk persisted before its bytes join the merged
    /// buffer. The merged artifact is only written after every chunk
    /// succeeded.
    async fn synthesize_ordered(
        &self,
        message_id: &str,
        base: &str,
        segments: Vec<Segment>,
        timeout: Duration,
    ) -> Result<RunOutput> {
        let total = segments.len();
        let mut merged: Vec<u8> = Vec::new();
        let mut format = String::new();

        for segment in &segments {
            info!(
                chunk = segment.index,
                total,
                chars = segment.char_len(),
                "synthesizing chunk"
            );
            let audio = self
                .synth
                .synthesize(&segment.text, timeout)
                .await
                .map_err(|e| Error::at_stage(Stage::Synthesize(segment.index), e))?;

            let chunk_name = format!("parts/{message_id}/{base}_part{}", segment.index);
            self.store
                .save(&audio.data, &chunk_name)
                .map_err(|e| Error::at_stage(Stage::PersistChunk(segment.index), e))?;

            merged.extend_from_slice(&audio.data);
            format = audio.format;
        }

        info!(total_bytes = merged.len(), "all chunks synthesized");
        let merged_path = self
            .store
            .save(&merged, &format!("merged/{message_id}/{base}"))
            .map_err(|e| Error::at_stage(Stage::PersistMerged, e))?;
        info!(path = %merged_path.display(), "saved merged audio");

        Ok(RunOutput {
            message_id: message_id.to_string(),
            merged_path,
            chunk_count: total,
            audio: Audio {
                data: merged,
                format,
            },
        })
    }
}
