//! Scripted collaborators for loop tests.
//!
//! None of these spawn processes or touch the network: sources and sandboxes
//! replay queued values and record what the loop asked of them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::core::extract::ExtractError;
use crate::core::types::{ExecutionResult, ProposalMode};
use crate::io::config::OrchestratorConfig;
use crate::io::context::RunContext;
use crate::io::sandbox::Sandbox;
use crate::looping::RunOutcome;
use crate::observer::Observer;
use crate::proposal::ProposalSource;

/// One queued reply from a [`ScriptedSource`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Block(String),
    Fail(String),
}

impl ScriptedReply {
    pub fn block(text: &str) -> Self {
        ScriptedReply::Block(text.to_string())
    }
}

/// Source with separate queues for pre and post blocks.
///
/// An empty pre queue yields blank text (end of run); an empty post queue
/// yields blank text (no reflection). Transcripts seen by each call are kept.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    pre: VecDeque<ScriptedReply>,
    post: VecDeque<ScriptedReply>,
    pub seen_transcripts: Vec<String>,
}

impl ScriptedSource {
    pub fn new(pre: Vec<ScriptedReply>, post: Vec<ScriptedReply>) -> Self {
        Self {
            pre: pre.into(),
            post: post.into(),
            seen_transcripts: Vec::new(),
        }
    }

    /// Convenience for all-success scripts.
    pub fn blocks(pre: &[&str], post: &[&str]) -> Self {
        Self::new(
            pre.iter().map(|text| ScriptedReply::block(text)).collect(),
            post.iter().map(|text| ScriptedReply::block(text)).collect(),
        )
    }

    fn next(queue: &mut VecDeque<ScriptedReply>) -> Result<String> {
        match queue.pop_front() {
            Some(ScriptedReply::Block(text)) => Ok(text),
            Some(ScriptedReply::Fail(message)) => Err(anyhow!(message)),
            None => Ok(String::new()),
        }
    }
}

impl ProposalSource for ScriptedSource {
    fn decide(&mut self, _step: u32, context: &RunContext) -> Result<String> {
        self.seen_transcripts.push(context.transcript());
        Self::next(&mut self.pre)
    }

    fn post_decide(&mut self, _step: u32, context: &RunContext) -> Result<String> {
        self.seen_transcripts.push(context.transcript());
        Self::next(&mut self.post)
    }
}

/// Sandbox returning queued results and recording every command it was given.
///
/// Once the queue is empty it keeps returning a successful empty result.
#[derive(Debug, Default)]
pub struct ScriptedSandbox {
    results: RefCell<VecDeque<Result<ExecutionResult, String>>>,
    commands: RefCell<Vec<String>>,
}

impl ScriptedSandbox {
    pub fn new(results: Vec<Result<ExecutionResult, String>>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl Sandbox for ScriptedSandbox {
    fn exec(&self, command: &str) -> Result<ExecutionResult> {
        self.commands.borrow_mut().push(command.to_string());
        match self.results.borrow_mut().pop_front() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(ok_result("")),
        }
    }
}

/// Observer that records calls as short strings.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub calls: Vec<String>,
}

impl Observer for RecordingObserver {
    fn step_started(&mut self, step: u32) {
        self.calls.push(format!("step {step}"));
    }

    fn extraction_failed(&mut self, step: u32, error: &ExtractError) {
        self.calls.push(format!("extract-failed {step}: {error}"));
    }

    fn command_finished(&mut self, step: u32, command: &str, result: &ExecutionResult) {
        self.calls
            .push(format!("ran {step}: {command} -> {}", result.exit_code));
    }

    fn echo_blocks(&mut self, step: u32, _pre: &str, _post: &str) {
        self.calls.push(format!("echo {step}"));
    }

    fn context_write_failed(&mut self, step: u32, _error: &anyhow::Error) {
        self.calls.push(format!("context-failed {step}"));
    }

    fn guard_tripped(&mut self, step: u32, command: &str, occurrences: u32) {
        self.calls
            .push(format!("guard {step}: {command} x{occurrences}"));
    }

    fn finished(&mut self, outcome: &RunOutcome) {
        self.calls.push(format!("finished {:?}", outcome.stop));
    }
}

pub fn ok_result(stdout: &str) -> ExecutionResult {
    ExecutionResult {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
        latency_secs: 0.01,
    }
}

/// Pre-exec block in the usual Action Protocol layout.
pub fn pre_block(command: &str) -> String {
    format!("<Intent>\nLook around\n\n<Command>\n{command}\n\n<Expected>\nSome output\n")
}

/// Temporary runs root with a matching config (echo on, manual mode).
pub struct TempRuns {
    dir: tempfile::TempDir,
    pub config: OrchestratorConfig,
}

impl TempRuns {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let config = OrchestratorConfig {
            mode: ProposalMode::Manual,
            runs_dir: dir.path().to_path_buf(),
            ..OrchestratorConfig::default()
        };
        Ok(Self { dir, config })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Every run directory created so far, sorted by name.
    pub fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(self.path())? {
            let path = entry?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// The only run directory; errors if there is not exactly one.
    pub fn single_run_dir(&self) -> Result<PathBuf> {
        let mut dirs = self.run_dirs()?;
        if dirs.len() != 1 {
            return Err(anyhow!("expected 1 run dir, found {}", dirs.len()));
        }
        Ok(dirs.remove(0))
    }
}
