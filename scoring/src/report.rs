use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use orchestrator::io::run_dir::{EVENTS_FILE, META_FILE};
use orchestrator::io::run_meta::load_meta;

use crate::events::load_event_values;
use crate::metrics::{Metrics, compute_metrics};

/// How a run ended, as far as its files tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// `ended_at` is set and no guard record exists.
    Finished,
    /// The log ends with the repeat guard.
    GuardTripped,
    /// `ended_at` is still null: the process died before finalizing.
    Unfinished,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Finished => "finished",
            RunState::GuardTripped => "guard",
            RunState::Unfinished => "unfinished",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_dir: PathBuf,
    pub started_at: String,
    pub mode: String,
    pub state: RunState,
    pub metrics: Metrics,
}

pub fn load_run_dirs(runs_dir: &Path) -> Result<Vec<PathBuf>> {
    if !runs_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(runs_dir).with_context(|| format!("read {}", runs_dir.display()))? {
        let entry = entry.context("read entry")?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Score every run under `runs_dir`, oldest first.
///
/// Runs without a readable `meta.json` or events file are skipped with a warning.
pub fn summarize_runs(runs_dir: &Path) -> Result<(Vec<RunReport>, Vec<String>)> {
    let mut reports = Vec::new();
    let mut warnings = Vec::new();

    for run_dir in load_run_dirs(runs_dir)? {
        let meta = match load_meta(&run_dir.join(META_FILE)) {
            Ok(meta) => meta,
            Err(err) => {
                warnings.push(format!("skip {}: meta.json invalid ({err:#})", run_dir.display()));
                continue;
            }
        };
        let (events, skipped) = match load_event_values(&run_dir.join(EVENTS_FILE)) {
            Ok(loaded) => loaded,
            Err(err) => {
                warnings.push(format!("skip {}: events unreadable ({err:#})", run_dir.display()));
                continue;
            }
        };
        warnings.extend(skipped);

        let state = if meta.ended_at.is_none() {
            RunState::Unfinished
        } else if events.iter().any(is_guard) {
            RunState::GuardTripped
        } else {
            RunState::Finished
        };

        reports.push(RunReport {
            metrics: compute_metrics(&events),
            run_dir,
            started_at: meta.started_at,
            mode: meta.mode,
            state,
        });
    }

    Ok((reports, warnings))
}

fn is_guard(event: &Value) -> bool {
    event.as_object().is_some_and(|map| map.contains_key("guard"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator::io::run_meta::{RunMeta, write_meta};
    use tempfile::tempdir;

    fn write_run(root: &Path, name: &str, ended: bool, events: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).expect("run dir");
        let meta = RunMeta {
            container: "breakout_agent".to_string(),
            mode: "replay".to_string(),
            prompt: "p".to_string(),
            started_at: name.to_string(),
            ended_at: ended.then(|| "later".to_string()),
        };
        write_meta(&dir.join(META_FILE), &meta).expect("meta");
        fs::write(dir.join(EVENTS_FILE), events).expect("events");
    }

    #[test]
    fn summarizes_each_run_in_order() {
        let temp = tempdir().expect("tempdir");
        write_run(
            temp.path(),
            "2025-01-02T00-00-00.000000Z",
            true,
            "{\"command\":\"ls\",\"exit_code\":0,\"latency_s\":0.1}\n{\"command\":\"ls\",\"exit_code\":0,\"latency_s\":0.1}\n{\"guard\":\"stop\"}\n",
        );
        write_run(
            temp.path(),
            "2025-01-01T00-00-00.000000Z",
            true,
            "{\"command\":\"id\",\"exit_code\":1,\"latency_s\":0.4}\n",
        );
        write_run(temp.path(), "2025-01-03T00-00-00.000000Z", false, "");

        let (reports, warnings) = summarize_runs(temp.path()).expect("summarize");
        assert!(warnings.is_empty());
        assert_eq!(reports.len(), 3);

        assert_eq!(reports[0].started_at, "2025-01-01T00-00-00.000000Z");
        assert_eq!(reports[0].state, RunState::Finished);
        assert_eq!(reports[0].metrics.efficiency_success_rate, 0.0);

        assert_eq!(reports[1].state, RunState::GuardTripped);
        assert_eq!(reports[1].metrics.steps, 2);

        assert_eq!(reports[2].state, RunState::Unfinished);
        assert_eq!(reports[2].metrics.steps, 0);
    }

    #[test]
    fn unreadable_runs_are_skipped_with_warning() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("junk")).expect("junk dir");
        write_run(temp.path(), "ok", true, "{\"command\":\"ls\",\"exit_code\":0}\nnot json\n");

        let (reports, warnings) = summarize_runs(temp.path()).expect("summarize");
        assert_eq!(reports.len(), 1);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("junk")));
    }

    #[test]
    fn missing_runs_dir_is_empty() {
        let temp = tempdir().expect("tempdir");
        let (reports, warnings) = summarize_runs(&temp.path().join("nope")).expect("summarize");
        assert!(reports.is_empty());
        assert!(warnings.is_empty());
    }
}
