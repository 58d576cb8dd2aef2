//! Append-only ledger of processed message ids.
//!
//! One id per line in a flat text file. Membership is a linear scan at
//! call time — the ledger is consulted once per run, so no index is kept.
//! Ids are only appended after a run fully succeeds and are never removed.
//!
//! Writes within one process are serialized by a mutex; concurrent
//! processes appending to the same file are out of scope.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::Result;

pub struct Ledger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `id` has already been recorded. A missing ledger file means
    /// nothing has been processed yet.
    pub fn contains(&self, id: &str) -> Result<bool> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        for line in BufReader::new(file).lines() {
            if line?.trim() == id {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Append `id` followed by a newline, creating the parent directory and
    /// the file on first use. Flushed before returning.
    pub fn record(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        writeln!(file, "{id}")?;
        file.flush()?;
        debug!(id, path = %self.path.display(), "recorded processed id");
        Ok(())
    }
}
