//! # Mailcast CLI
//!
//! The `mailcast` binary drives the email → speech pipeline. All commands
//! accept a `--config` flag pointing to a TOML configuration file; when
//! the file is absent, built-in defaults apply.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mailcast run <id>` | Synthesize one message unconditionally |
//! | `mailcast process <id>` | Synthesize one message unless the ledger already has it |
//! | `mailcast latest` | Resolve the newest inbox message and process it if new |
//! | `mailcast prepare <id>` | Rewrite a message into part text files for later synthesis |
//! | `mailcast from-parts <id> <dir>` | Synthesize pre-chunked part files in index order |
//!
//! ## Examples
//!
//! ```bash
//! # One message, capped at the first 2000 characters
//! mailcast run 19a4bcdb62b16afe --limit 2000
//!
//! # Daily driver: newest matching message, skipped when already done
//! mailcast latest --query 'subject:"Weekly digest"'
//!
//! # Two-stage flow: rewrite first, listen later
//! mailcast prepare 19a4bcdb62b16afe
//! mailcast from-parts 19a4bcdb62b16afe text/19a4bcdb62b16afe
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use mailcast::config::{self, Config};
use mailcast::error::{Error, Stage};
use mailcast::ledger::Ledger;
use mailcast::models::{RunOutput, RunStatus};
use mailcast::name::artifact_base_name;
use mailcast::pipeline::{PrepareOptions, RunOptions, SpeechPipeline};
use mailcast::rewrite::OpenAiRewriter;
use mailcast::source::{GmailSource, MessageSource};
use mailcast::store::FileStore;
use mailcast::synth::OpenAiSynthesizer;

/// Mailcast — turn a mailbox message into a single spoken-audio file.
#[derive(Parser)]
#[command(
    name = "mailcast",
    about = "Turn a mailbox message into a single spoken-audio file",
    version,
    long_about = "Mailcast fetches one email, splits its body into provider-sized segments, \
    synthesizes each segment through a remote text-to-speech API in strict order, and merges \
    the chunk audio byte-for-byte into one file. An append-only ledger keeps already-processed \
    messages from being synthesized twice."
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults apply when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./config/mailcast.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Synthesize one message unconditionally.
    ///
    /// Fetches the message, splits its body, synthesizes every chunk in
    /// order, and writes chunk audio plus the merged artifact. Does not
    /// consult or update the ledger.
    Run {
        /// Mailbox message id.
        message_id: String,

        /// Read at most this many characters of the body.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Synthesize one message unless it was already processed.
    ///
    /// Checks the ledger first and skips recorded ids; on success the id
    /// is appended to the ledger so the next invocation is a no-op.
    Process {
        /// Mailbox message id.
        message_id: String,

        /// Read at most this many characters of the body.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Process the newest inbox message if it is new.
    ///
    /// Resolves the most recent message id (optionally filtered by a
    /// mailbox search query) and behaves like `process` for it.
    Latest {
        /// Mailbox search query (e.g. 'subject:"Weekly digest"').
        /// Falls back to `source.query` from the config file.
        #[arg(long)]
        query: Option<String>,
    },

    /// Rewrite a message into part text files for later synthesis.
    ///
    /// Byte-splits the body on sentence boundaries, pushes each chunk
    /// through the chat rewriter with the configured prompt, and writes
    /// `{base}_part{N}.txt` files under the text directory.
    Prepare {
        /// Mailbox message id.
        message_id: String,
    },

    /// Synthesize pre-chunked part text files in index order.
    ///
    /// Reads `*.txt` files from the given directory sorted by their
    /// `_part{N}` suffix (unparsable names last) and merges the chunk
    /// audio under the given message id.
    FromParts {
        /// Message id used to namespace the audio artifacts.
        message_id: String,

        /// Directory containing the part text files.
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::default()
    };

    let source = Arc::new(GmailSource::new(&cfg.source, &cfg.secrets_dir)?);
    let synth = Arc::new(OpenAiSynthesizer::new(&cfg.synthesis, &cfg.secrets_dir)?);
    let store = Arc::new(FileStore::new(
        cfg.storage.audio_dir.clone(),
        cfg.synthesis.format.clone(),
    ));
    let ledger = Arc::new(Ledger::new(cfg.ledger.path.clone()));
    let pipeline = SpeechPipeline::new(source.clone(), synth, store, ledger);

    match cli.command {
        Commands::Run { message_id, limit } => {
            let opts = RunOptions::from_config(&cfg).with_char_limit(limit);
            let output = pipeline.run_message(&message_id, &opts).await?;
            print_output(&output);
        }
        Commands::Process { message_id, limit } => {
            let opts = RunOptions::from_config(&cfg).with_char_limit(limit);
            print_status(pipeline.run_if_new(&message_id, &opts).await?);
        }
        Commands::Latest { query } => {
            let opts = RunOptions::from_config(&cfg);
            let query = query.or_else(|| cfg.source.query.clone());
            print_status(pipeline.run_latest(query.as_deref(), &opts).await?);
        }
        Commands::Prepare { message_id } => {
            let rewriter = OpenAiRewriter::new(&cfg.rewrite, &cfg.secrets_dir)?;
            let message = source
                .get_by_id(&message_id)
                .await
                .map_err(|e| Error::at_stage(Stage::Fetch, e))?;
            if message.body.is_empty() {
                anyhow::bail!("message {message_id} has no text content");
            }
            let base = artifact_base_name(&message.subject, &message.id);
            let opts = PrepareOptions::from_config(&cfg);
            let written = pipeline
                .prepare_parts(&rewriter, &message.id, &base, &message.body, &opts)
                .await?;
            println!("prepare {message_id}");
            println!("  parts written: {}", written.len());
            for path in &written {
                println!("  {}", path.display());
            }
            println!("ok");
        }
        Commands::FromParts { message_id, dir } => {
            let opts = RunOptions::from_config(&cfg);
            let output = pipeline.run_from_parts(&dir, &message_id, &opts).await?;
            print_output(&output);
        }
    }

    Ok(())
}

fn print_output(output: &RunOutput) {
    println!("run {}", output.message_id);
    println!("  chunks: {}", output.chunk_count);
    println!(
        "  merged: {} ({} bytes)",
        output.merged_path.display(),
        output.audio.data.len()
    );
    println!("ok");
}

fn print_status(status: RunStatus) {
    match status {
        RunStatus::Skipped => println!("skip (already processed)"),
        RunStatus::Completed(output) => print_output(&output),
    }
}
