//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::events::load_event_values;
use crate::metrics::compute_metrics;
use crate::report::summarize_runs;

/// Print the metrics of one run (directory or JSONL file) as pretty JSON.
pub fn score(path: &Path) -> Result<()> {
    let (events, warnings) = load_event_values(path)?;
    for warning in &warnings {
        warn!("{warning}");
    }
    debug!(events = events.len(), skipped = warnings.len(), "events loaded");
    let metrics = compute_metrics(&events);
    let rendered = serde_json::to_string_pretty(&metrics).context("serialize metrics")?;
    println!("{rendered}");
    Ok(())
}

/// Print one summary line per run under `runs_dir`.
pub fn report(runs_dir: &Path) -> Result<()> {
    let (reports, warnings) = summarize_runs(runs_dir)?;
    println!("report: runs={} dir={}", reports.len(), runs_dir.display());
    for run in &reports {
        println!(
            "run: started_at={} mode={} state={} steps={} success_rate={:.2} latency_median_s={:.3} tools={} coverage_files={}",
            run.started_at,
            run.mode,
            run.state.as_str(),
            run.metrics.steps,
            run.metrics.efficiency_success_rate,
            run.metrics.latency_median_s,
            run.metrics.tools_count,
            run.metrics.coverage_files,
        );
    }
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}
