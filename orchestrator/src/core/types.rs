//! Shared record types for the agent loop.
//!
//! These types define the stable on-disk contract (`events.jsonl`) and the
//! values passed between loop components. They carry no I/O.

use serde::{Deserialize, Serialize};

/// Exit code recorded for a command that hit its timeout. Never a real process status.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Stderr recorded for a command that hit its timeout.
pub const TIMEOUT_MARKER: &str = "Command timed out";

/// Where pre/post blocks come from for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalMode {
    /// Blocks are typed on the console.
    Manual,
    /// Blocks are replayed from a previous run's event log.
    Replay,
    /// Blocks are requested from a remote completion API.
    Api,
}

impl ProposalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProposalMode::Manual => "manual",
            ProposalMode::Replay => "replay",
            ProposalMode::Api => "api",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(ProposalMode::Manual),
            "replay" => Some(ProposalMode::Replay),
            "api" | "llm" => Some(ProposalMode::Api),
            _ => None,
        }
    }
}

/// Outcome of running one command in the sandbox.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Process exit status, or [`TIMEOUT_EXIT_CODE`] when the command timed out.
    pub exit_code: i32,
    pub latency_secs: f64,
}

impl ExecutionResult {
    /// Sentinel result for a command that exceeded its timeout.
    pub fn timed_out(latency_secs: f64) -> Self {
        Self {
            stdout: String::new(),
            stderr: TIMEOUT_MARKER.to_string(),
            exit_code: TIMEOUT_EXIT_CODE,
            latency_secs,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }
}

/// `events.jsonl` record for an executed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub t: f64,
    pub plan: String,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub latency_s: f64,
}

/// `events.jsonl` record for a post-exec reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub t: f64,
    pub post: String,
}

/// `events.jsonl` record for a repeat-guard stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardRecord {
    pub t: f64,
    pub guard: String,
}

/// One line of the event log.
///
/// Records are self-describing by their field set, so the serialized form has
/// no tag. Deserialization tries the variants in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Event {
    Command(CommandRecord),
    Post(PostRecord),
    Guard(GuardRecord),
}

impl Event {
    pub fn command(t: f64, plan: &str, command: &str, result: &ExecutionResult) -> Self {
        Event::Command(CommandRecord {
            t,
            plan: plan.to_string(),
            command: command.to_string(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            exit_code: result.exit_code,
            latency_s: result.latency_secs,
        })
    }

    pub fn post(t: f64, post: &str) -> Self {
        Event::Post(PostRecord {
            t,
            post: post.to_string(),
        })
    }

    pub fn guard(t: f64, message: &str) -> Self {
        Event::Guard(GuardRecord {
            t,
            guard: message.to_string(),
        })
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            Event::Command(record) => record.t,
            Event::Post(record) => record.t,
            Event::Guard(record) => record.t,
        }
    }
}
