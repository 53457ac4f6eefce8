//! Append-only `events.jsonl` writer and tolerant reader.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::core::types::Event;

/// Open handle on a run's event log.
///
/// Every [`append`](EventLog::append) writes one complete line and flushes it
/// before returning, so a crash never leaves a partial record behind.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    file: File,
    appended: usize,
}

impl EventLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open event log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            appended: 0,
        })
    }

    pub fn append(&mut self, event: &Event) -> Result<()> {
        let mut line = serde_json::to_string(event).context("serialize event")?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .with_context(|| format!("append to event log {}", self.path.display()))?;
        self.appended += 1;
        Ok(())
    }

    /// Records appended through this handle.
    pub fn appended(&self) -> usize {
        self.appended
    }

    pub fn close(self) -> Result<()> {
        debug!(path = %self.path.display(), appended = self.appended, "closing event log");
        self.file
            .sync_all()
            .with_context(|| format!("sync event log {}", self.path.display()))
    }
}

/// Read a JSONL file, skipping blank lines and returning a warning for every
/// line that does not parse as `T`.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, Vec<String>)> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut records = Vec::new();
    let mut warnings = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(record) => records.push(record),
            Err(err) => {
                let message = format!("{}:{}: skipped malformed line: {err}", path.display(), index + 1);
                warn!("{message}");
                warnings.push(message);
            }
        }
    }

    Ok((records, warnings))
}

/// Load the typed events of a log, skipping lines that are not events.
pub fn load_events(path: &Path) -> Result<(Vec<Event>, Vec<String>)> {
    read_jsonl(path)
}
