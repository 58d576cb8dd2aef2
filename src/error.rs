//! Error taxonomy for the synthesis pipeline.
//!
//! Collaborator failures keep their kind (a deadline expiry is never
//! reported as a transport error, so callers can decide to retry a whole
//! message later), and the pipeline wraps them in [`Error::Stage`] so a
//! failed run always names the stage and chunk index that broke.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The requested message does not exist at the source.
    #[error("message not found: {0}")]
    NotFound(String),

    /// Network-level failure talking to a collaborator.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote API answered with a non-success status.
    #[error("provider error {status}: {message}")]
    Provider { status: u16, message: String },

    /// The remote API answered 429.
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    /// A per-call deadline expired.
    #[error("deadline exceeded after {0:?}")]
    Timeout(Duration),

    /// Local persistence failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input (empty message id, message without text, ...).
    #[error("invalid input: {0}")]
    Validation(String),

    /// A collaborator error tagged with the pipeline stage it came from.
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

/// Pipeline stage identifiers used by [`Error::Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    /// Synthesis of the 1-based chunk index.
    Synthesize(usize),
    /// Persisting the 1-based chunk index.
    PersistChunk(usize),
    PersistMerged,
    Rewrite(usize),
    /// Reading the 1-based part file back from disk.
    LoadPart(usize),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "fetch"),
            Stage::Synthesize(n) => write!(f, "synthesize chunk {n}"),
            Stage::PersistChunk(n) => write!(f, "persist chunk {n}"),
            Stage::PersistMerged => write!(f, "persist merged audio"),
            Stage::Rewrite(n) => write!(f, "rewrite chunk {n}"),
            Stage::LoadPart(n) => write!(f, "load part {n}"),
        }
    }
}

impl Error {
    /// Wrap an error with the stage it surfaced from.
    pub fn at_stage(stage: Stage, source: Error) -> Self {
        Error::Stage {
            stage,
            source: Box::new(source),
        }
    }

    /// Map a reqwest failure, keeping timeouts distinct from transport errors.
    pub fn from_http(err: reqwest::Error, deadline: Duration) -> Self {
        if err.is_timeout() {
            Error::Timeout(deadline)
        } else {
            Error::Transport(err.to_string())
        }
    }

    /// The innermost error kind, unwrapping stage tags.
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_tag_names_chunk() {
        let err = Error::at_stage(
            Stage::Synthesize(2),
            Error::Provider {
                status: 500,
                message: "boom".into(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("synthesize chunk 2"), "{msg}");
        assert!(matches!(err.root(), Error::Provider { status: 500, .. }));
    }

    #[test]
    fn timeout_is_not_transport() {
        let err = Error::Timeout(Duration::from_secs(90));
        assert!(!matches!(err, Error::Transport(_)));
    }
}
