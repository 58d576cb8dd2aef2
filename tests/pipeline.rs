//! Integration tests for the synthesis pipeline.
//!
//! These tests drive the real orchestrator, file store, and ledger with
//! stand-in collaborators for the mailbox and the speech provider, and
//! prove the ordering, abort, and idempotency guarantees end-to-end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use mailcast::error::{Error, Result, Stage};
use mailcast::ledger::Ledger;
use mailcast::models::{Audio, EmailMessage, RunStatus};
use mailcast::pipeline::{PrepareOptions, RunOptions, SpeechPipeline};
use mailcast::rewrite::Rewriter;
use mailcast::source::MessageSource;
use mailcast::store::FileStore;
use mailcast::synth::Synthesizer;

// ─── Stand-ins ──────────────────────────────────────────────────────

/// In-memory mailbox with a fixed set of messages.
struct InMemorySource {
    messages: HashMap<String, EmailMessage>,
    latest: Option<String>,
}

impl InMemorySource {
    fn single(id: &str, subject: &str, body: &str) -> Self {
        let mut messages = HashMap::new();
        messages.insert(
            id.to_string(),
            EmailMessage {
                id: id.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            },
        );
        Self {
            messages,
            latest: Some(id.to_string()),
        }
    }
}

#[async_trait]
impl MessageSource for InMemorySource {
    async fn get_by_id(&self, id: &str) -> Result<EmailMessage> {
        self.messages
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn latest_id(&self, _query: Option<&str>) -> Result<String> {
        self.latest
            .clone()
            .ok_or_else(|| Error::NotFound("no messages".into()))
    }
}

/// Synthesizer returning `chunk{N}` bytes for the N-th call, optionally
/// failing on a chosen call.
struct CountingSynth {
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
}

impl CountingSynth {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        }
    }

    fn failing_on(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: Some(call),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Synthesizer for CountingSynth {
    async fn synthesize(&self, _text: &str, _timeout: Duration) -> Result<Audio> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(Error::Provider {
                status: 500,
                message: "synthetic failure".into(),
            });
        }
        Ok(Audio {
            data: format!("chunk{call}").into_bytes(),
            format: "mp3".to_string(),
        })
    }
}

/// Synthesizer echoing the input text back as the audio bytes.
struct EchoSynth;

#[async_trait]
impl Synthesizer for EchoSynth {
    async fn synthesize(&self, text: &str, _timeout: Duration) -> Result<Audio> {
        Ok(Audio {
            data: text.as_bytes().to_vec(),
            format: "mp3".to_string(),
        })
    }
}

/// Rewriter that uppercases its input.
struct UppercaseRewriter;

#[async_trait]
impl Rewriter for UppercaseRewriter {
    async fn rewrite(&self, text: &str, _timeout: Duration) -> Result<String> {
        Ok(text.to_uppercase())
    }
}

// ─── Harness ────────────────────────────────────────────────────────

fn opts(chunk_chars: usize) -> RunOptions {
    RunOptions {
        char_limit: None,
        chunk_chars,
        chunk_timeout: Duration::from_secs(5),
    }
}

fn pipeline_with(
    tmp: &TempDir,
    source: Arc<dyn MessageSource>,
    synth: Arc<dyn Synthesizer>,
) -> SpeechPipeline {
    let store = Arc::new(FileStore::new(tmp.path().join("audio"), "mp3"));
    let ledger = Arc::new(Ledger::new(tmp.path().join("log/processed_ids.txt")));
    SpeechPipeline::new(source, synth, store, ledger)
}

fn audio_path(tmp: &TempDir, rel: &str) -> std::path::PathBuf {
    tmp.path().join("audio").join(rel)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_merged_audio_is_ordered_concatenation() {
    let tmp = TempDir::new().unwrap();
    // chunk_chars = 3 splits this into exactly "A.", " B.", " C."
    let source = Arc::new(InMemorySource::single("m1", "Digest", "A. B. C."));
    let synth = Arc::new(CountingSynth::new());
    let pipeline = pipeline_with(&tmp, source, synth.clone());

    let output = pipeline.run_message("m1", &opts(3)).await.unwrap();

    assert_eq!(output.chunk_count, 3);
    assert_eq!(synth.call_count(), 3);
    assert_eq!(output.audio.data, b"chunk1chunk2chunk3");
    assert_eq!(output.audio_base64(), "Y2h1bmsxY2h1bmsyY2h1bmsz");
    assert_eq!(
        std::fs::read(&output.merged_path).unwrap(),
        b"chunk1chunk2chunk3"
    );
    // Per-chunk artifacts live under the message-scoped parts namespace.
    for (n, expected) in [(1, "chunk1"), (2, "chunk2"), (3, "chunk3")] {
        let path = audio_path(&tmp, &format!("parts/m1/Digest_part{n}.mp3"));
        assert_eq!(std::fs::read(&path).unwrap(), expected.as_bytes());
    }
    assert_eq!(output.merged_path, audio_path(&tmp, "merged/m1/Digest.mp3"));
}

#[tokio::test]
async fn test_failure_aborts_run_and_leaves_ledger_untouched() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(InMemorySource::single("m1", "Digest", "A. B. C."));
    let synth = Arc::new(CountingSynth::failing_on(2));
    let pipeline = pipeline_with(&tmp, source, synth.clone());

    let err = pipeline.run_if_new("m1", &opts(3)).await.unwrap_err();
    assert!(
        matches!(err, Error::Stage { stage: Stage::Synthesize(2), .. }),
        "unexpected error: {err}"
    );

    // Chunk 3 was never attempted.
    assert_eq!(synth.call_count(), 2);
    // Chunk 1's artifact may remain; chunk 3's and the merged file must not exist.
    assert!(audio_path(&tmp, "parts/m1/Digest_part1.mp3").exists());
    assert!(!audio_path(&tmp, "parts/m1/Digest_part3.mp3").exists());
    assert!(!audio_path(&tmp, "merged/m1/Digest.mp3").exists());
    // Failed runs are not recorded, so a later attempt retries.
    let ledger = Ledger::new(tmp.path().join("log/processed_ids.txt"));
    assert!(!ledger.contains("m1").unwrap());
}

#[tokio::test]
async fn test_ledger_gated_run_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(InMemorySource::single("m1", "Digest", "A. B. C."));
    let synth = Arc::new(CountingSynth::new());
    let pipeline = pipeline_with(&tmp, source, synth.clone());

    let first = pipeline.run_if_new("m1", &opts(3)).await.unwrap();
    assert!(matches!(first, RunStatus::Completed(_)));
    let calls_after_first = synth.call_count();

    let second = pipeline.run_if_new("m1", &opts(3)).await.unwrap();
    assert!(second.is_skipped());
    assert_eq!(synth.call_count(), calls_after_first);
}

#[tokio::test]
async fn test_run_latest_resolves_and_processes() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(InMemorySource::single("m9", "News", "Hello there."));
    let synth = Arc::new(CountingSynth::new());
    let pipeline = pipeline_with(&tmp, source, synth);

    let status = pipeline.run_latest(None, &opts(100)).await.unwrap();
    match status {
        RunStatus::Completed(output) => assert_eq!(output.message_id, "m9"),
        RunStatus::Skipped => panic!("first run must not be skipped"),
    }
}

#[tokio::test]
async fn test_missing_message_is_tagged_as_fetch_failure() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(InMemorySource::single("m1", "Digest", "body"));
    let synth = Arc::new(CountingSynth::new());
    let pipeline = pipeline_with(&tmp, source, synth);

    let err = pipeline.run_message("absent", &opts(10)).await.unwrap_err();
    assert!(matches!(err, Error::Stage { stage: Stage::Fetch, .. }));
    assert!(matches!(err.root(), Error::NotFound(_)));
}

#[tokio::test]
async fn test_empty_body_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(InMemorySource::single("m1", "Digest", ""));
    let synth = Arc::new(CountingSynth::new());
    let pipeline = pipeline_with(&tmp, source, synth);

    let err = pipeline.run_message("m1", &opts(10)).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_char_limit_truncates_before_split() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(InMemorySource::single("m1", "Digest", "abcdefghij"));
    let synth = Arc::new(EchoSynth);
    let pipeline = pipeline_with(&tmp, source, synth);

    let options = opts(100).with_char_limit(Some(4));
    let output = pipeline.run_message("m1", &options).await.unwrap();
    assert_eq!(output.audio.data, b"abcd");
}

#[tokio::test]
async fn test_blank_subject_falls_back_to_message_id() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(InMemorySource::single("m7", "///", "Hi."));
    let synth = Arc::new(EchoSynth);
    let pipeline = pipeline_with(&tmp, source, synth);

    let output = pipeline.run_message("m7", &opts(100)).await.unwrap();
    assert_eq!(output.merged_path, audio_path(&tmp, "merged/m7/m7.mp3"));
}

#[tokio::test]
async fn test_from_parts_synthesizes_in_numeric_order() {
    let tmp = TempDir::new().unwrap();
    let parts_dir = tmp.path().join("text/m1");
    std::fs::create_dir_all(&parts_dir).unwrap();
    std::fs::write(parts_dir.join("n_part10.txt"), "ten ").unwrap();
    std::fs::write(parts_dir.join("n_part2.txt"), "two ").unwrap();
    std::fs::write(parts_dir.join("n_part1.txt"), "one ").unwrap();

    let source = Arc::new(InMemorySource::single("m1", "x", "y"));
    let pipeline = pipeline_with(&tmp, source, Arc::new(EchoSynth));

    let output = pipeline
        .run_from_parts(&parts_dir, "m1", &opts(100))
        .await
        .unwrap();
    assert_eq!(output.chunk_count, 3);
    assert_eq!(output.audio.data, b"one two ten ");
}

#[tokio::test]
async fn test_from_parts_empty_dir_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let empty = tmp.path().join("empty");
    std::fs::create_dir_all(&empty).unwrap();

    let source = Arc::new(InMemorySource::single("m1", "x", "y"));
    let pipeline = pipeline_with(&tmp, source, Arc::new(EchoSynth));

    let err = pipeline
        .run_from_parts(&empty, "m1", &opts(100))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_prepare_parts_writes_rewritten_files_in_order() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(InMemorySource::single("m1", "Digest", "unused"));
    let pipeline = pipeline_with(&tmp, source, Arc::new(EchoSynth));

    let options = PrepareOptions {
        chunk_bytes: 6,
        timeout: Duration::from_secs(5),
        text_dir: tmp.path().join("text"),
    };
    let written = pipeline
        .prepare_parts(&UppercaseRewriter, "m1", "Digest", "ab. cd. ef.", &options)
        .await
        .unwrap();

    assert_eq!(written.len(), 3);
    assert_eq!(
        written[0],
        tmp.path().join("text/m1").join("Digest_part1.txt")
    );
    let rebuilt: String = written
        .iter()
        .map(|p| std::fs::read_to_string(p).unwrap())
        .collect();
    assert_eq!(rebuilt, "AB. CD. EF.");
}

#[tokio::test]
async fn test_part_file_write_failure_names_the_chunk() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(InMemorySource::single("m1", "Digest", "unused"));
    let pipeline = pipeline_with(&tmp, source, Arc::new(EchoSynth));

    // A directory squatting on the second part's path makes the write fail.
    std::fs::create_dir_all(tmp.path().join("text/m1/Digest_part2.txt")).unwrap();

    let options = PrepareOptions {
        chunk_bytes: 6,
        timeout: Duration::from_secs(5),
        text_dir: tmp.path().join("text"),
    };
    let err = pipeline
        .prepare_parts(&UppercaseRewriter, "m1", "Digest", "ab. cd. ef.", &options)
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Stage { stage: Stage::PersistChunk(2), .. }),
        "unexpected error: {err}"
    );
    assert!(matches!(err.root(), Error::Io(_)));
}

#[tokio::test]
async fn test_unreadable_part_file_names_the_chunk() {
    let tmp = TempDir::new().unwrap();
    let parts_dir = tmp.path().join("text/m1");
    std::fs::create_dir_all(&parts_dir).unwrap();
    std::fs::write(parts_dir.join("n_part1.txt"), "one").unwrap();
    // Not UTF-8, so reading it back as text fails.
    std::fs::write(parts_dir.join("n_part2.txt"), [0xFF, 0xFE, 0xFD]).unwrap();

    let source = Arc::new(InMemorySource::single("m1", "x", "y"));
    let pipeline = pipeline_with(&tmp, source, Arc::new(EchoSynth));

    let err = pipeline
        .run_from_parts(&parts_dir, "m1", &opts(100))
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Stage { stage: Stage::LoadPart(2), .. }),
        "unexpected error: {err}"
    );
    assert!(matches!(err.root(), Error::Io(_)));
}

#[tokio::test]
async fn test_background_run_records_ledger() {
    let tmp = TempDir::new().unwrap();
    let source = Arc::new(InMemorySource::single("m1", "Digest", "Hello."));
    let synth = Arc::new(CountingSynth::new());
    let pipeline = Arc::new(pipeline_with(&tmp, source, synth));

    let handle = pipeline.spawn_run_if_new("m1".to_string(), opts(100));
    handle.await.unwrap();

    let ledger = Ledger::new(tmp.path().join("log/processed_ids.txt"));
    assert!(ledger.contains("m1").unwrap());
}
