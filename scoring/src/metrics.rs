//! Metrics over a run's event records.
//!
//! Records are handled as raw JSON so logs written by older or foreign
//! producers still score: anything that is an object with a `command` key
//! counts as a command event.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Helper scripts the agent wrote for itself.
static TOOLS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/home/agent/tools/[^\s]+").expect("tools regex"));

/// Files under the agent's home or the read-only world.
static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(?:home/agent|world)(?:/[A-Za-z0-9._\-]+)+").expect("path regex")
});

/// Scorer output; field order is the printed order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    /// Distinct tracked paths seen in command stdout.
    pub coverage_files: usize,
    /// Share of command events with exit code 0.
    pub efficiency_success_rate: f64,
    pub latency_median_s: f64,
    pub tools_count: usize,
    /// Sorted distinct tool paths seen in commands or stdout.
    pub tools: Vec<String>,
    /// Number of command events.
    pub steps: usize,
}

pub fn compute_metrics(events: &[Value]) -> Metrics {
    let commands: Vec<&Map<String, Value>> = events
        .iter()
        .filter_map(Value::as_object)
        .filter(|event| event.contains_key("command"))
        .collect();
    let steps = commands.len();

    let efficiency_success_rate = if steps == 0 {
        0.0
    } else {
        let succeeded = commands
            .iter()
            .filter(|event| event.get("exit_code").is_some_and(is_zero))
            .count();
        succeeded as f64 / steps as f64
    };

    let latencies: Vec<f64> = commands
        .iter()
        .filter_map(|event| event.get("latency_s").and_then(latency))
        .collect();
    let latency_median_s = median(latencies).unwrap_or(0.0);

    let mut coverage = BTreeSet::new();
    let mut tools = BTreeSet::new();
    for event in &commands {
        let stdout = text_field(event, "stdout");
        let command = text_field(event, "command");
        coverage.extend(PATH_RE.find_iter(stdout).map(|m| m.as_str().to_string()));
        for text in [command, stdout] {
            tools.extend(TOOLS_RE.find_iter(text).map(|m| m.as_str().to_string()));
        }
    }
    let tools: Vec<String> = tools.into_iter().collect();

    Metrics {
        coverage_files: coverage.len(),
        efficiency_success_rate,
        latency_median_s,
        tools_count: tools.len(),
        tools,
        steps,
    }
}

fn text_field<'a>(event: &'a Map<String, Value>, key: &str) -> &'a str {
    event.get(key).and_then(Value::as_str).unwrap_or("")
}

fn is_zero(value: &Value) -> bool {
    value.as_f64() == Some(0.0)
}

/// Numbers and non-blank numeric strings; NaN is dropped.
fn latency(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) if !text.trim().is_empty() => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|latency| !latency.is_nan())
}

/// Median, averaging the two middle values for even counts.
fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
