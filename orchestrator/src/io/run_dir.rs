//! Per-run directory layout (`<runs_dir>/<started_at>/`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

pub const META_FILE: &str = "meta.json";
pub const EVENTS_FILE: &str = "events.jsonl";
pub const CONTEXT_FILE: &str = "context.txt";

#[derive(Debug, Clone)]
pub struct RunPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub events_path: PathBuf,
    pub context_path: PathBuf,
}

impl RunPaths {
    pub fn new(runs_root: &Path, run_id: &str) -> Self {
        let dir = runs_root.join(run_id);
        Self {
            meta_path: dir.join(META_FILE),
            events_path: dir.join(EVENTS_FILE),
            context_path: dir.join(CONTEXT_FILE),
            dir,
        }
    }

    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create run dir {}", self.dir.display()))
    }
}

/// Filesystem-safe UTC timestamp used for run ids and meta times
/// (`2025-01-31T09-15-02.123456Z`).
pub fn format_run_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S%.6fZ").to_string()
}

/// Seconds since the Unix epoch, as written to the `t` field of events.
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

/// Accept either a run directory or a direct path to an events file.
pub fn resolve_events_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(EVENTS_FILE)
    } else {
        path.to_path_buf()
    }
}
