//! Progress reporting for the agent loop.
//!
//! The loop reports what it does through [`Observer`]; the binary prints with
//! [`ConsoleObserver`] and tests record calls. All methods default to no-ops.

use crate::core::extract::ExtractError;
use crate::core::types::ExecutionResult;
use crate::looping::{LoopStop, RunOutcome};

pub trait Observer {
    fn step_started(&mut self, _step: u32) {}

    fn extraction_failed(&mut self, _step: u32, _error: &ExtractError) {}

    fn command_finished(&mut self, _step: u32, _command: &str, _result: &ExecutionResult) {}

    /// Pre/post blocks of a completed step; only called when echo is enabled.
    fn echo_blocks(&mut self, _step: u32, _pre: &str, _post: &str) {}

    /// A best-effort `context.txt` write failed; the run continues.
    fn context_write_failed(&mut self, _step: u32, _error: &anyhow::Error) {}

    fn guard_tripped(&mut self, _step: u32, _command: &str, _occurrences: u32) {}

    fn finished(&mut self, _outcome: &RunOutcome) {}
}

/// Prints progress to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver;

impl Observer for ConsoleObserver {
    fn step_started(&mut self, step: u32) {
        println!("Step {step}");
    }

    fn extraction_failed(&mut self, _step: u32, error: &ExtractError) {
        println!("Error: {error}");
    }

    fn command_finished(&mut self, _step: u32, command: &str, result: &ExecutionResult) {
        println!("$ {command}");
        println!("Exit code: {}", result.exit_code);
        println!("Stdout: {}", result.stdout);
        println!("Stderr: {}", result.stderr);
    }

    fn echo_blocks(&mut self, step: u32, pre: &str, post: &str) {
        println!("--- step {step} pre-exec ---\n{}", pre.trim_end());
        println!("--- step {step} post-exec ---\n{}", post.trim_end());
    }

    fn context_write_failed(&mut self, step: u32, error: &anyhow::Error) {
        println!("Warning: step {step}: context not saved: {error:#}");
    }

    fn guard_tripped(&mut self, _step: u32, command: &str, occurrences: u32) {
        println!("Repeat guard: `{command}` proposed {occurrences} times in a row; stopping.");
    }

    fn finished(&mut self, outcome: &RunOutcome) {
        match &outcome.stop {
            LoopStop::SourceExhausted => println!("No more proposals."),
            LoopStop::GuardTripped { .. } => println!("Run stopped by the repeat guard."),
        }
        println!("Run complete. Logs in {}", outcome.run_dir.display());
    }
}
