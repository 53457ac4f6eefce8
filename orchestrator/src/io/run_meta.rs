//! `meta.json` storage for a run.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Run metadata, written once at start and rewritten once at the end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunMeta {
    pub container: String,
    /// Proposal mode name (`manual`, `replay`, `api`).
    pub mode: String,
    /// Full prompt text the run was started with.
    pub prompt: String,
    pub started_at: String,
    /// `None` until the run has been finalized.
    pub ended_at: Option<String>,
}

pub fn load_meta(path: &Path) -> Result<RunMeta> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read run meta {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse run meta {}", path.display()))
}

/// Atomically write run meta (temp file + rename), pretty-printed.
pub fn write_meta(path: &Path, meta: &RunMeta) -> Result<()> {
    debug!(path = %path.display(), ended = meta.ended_at.is_some(), "writing run meta");
    let mut buf = serde_json::to_string_pretty(meta)?;
    buf.push('\n');

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp run meta {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace run meta {}", path.display()))?;
    Ok(())
}
