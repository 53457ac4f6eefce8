//! Proposal sources: where pre-exec and post-exec blocks come from.
//!
//! The [`ProposalSource`] trait decouples the loop from how blocks are
//! produced. One strategy per [`ProposalMode`] is chosen by [`build_source`]
//! when the run starts; tests use scripted sources.

pub mod api;
pub mod console;
pub mod replay;

use anyhow::{Context, Result};

use crate::core::types::ProposalMode;
use crate::io::config::OrchestratorConfig;
use crate::io::context::RunContext;

pub use api::ApiSource;
pub use console::ConsoleSource;
pub use replay::{ReplaySource, ReplayStep};

/// Built-in run prompt, used when no prompt file is configured.
pub const DEFAULT_PROMPT: &str = include_str!("prompts/system.md");

/// Supplies the blocks that drive a run.
pub trait ProposalSource {
    /// Next pre-exec block for `step`. Blank text ends the run.
    fn decide(&mut self, step: u32, context: &RunContext) -> Result<String>;

    /// Reflection on the command just executed. Blank text means no reflection.
    fn post_decide(&mut self, step: u32, context: &RunContext) -> Result<String>;
}

impl<S: ProposalSource + ?Sized> ProposalSource for Box<S> {
    fn decide(&mut self, step: u32, context: &RunContext) -> Result<String> {
        (**self).decide(step, context)
    }

    fn post_decide(&mut self, step: u32, context: &RunContext) -> Result<String> {
        (**self).post_decide(step, context)
    }
}

/// Construct the source for the configured mode.
///
/// `prompt` is the run prompt; API sources send it as the system message.
pub fn build_source(config: &OrchestratorConfig, prompt: &str) -> Result<Box<dyn ProposalSource>> {
    let source: Box<dyn ProposalSource> = match config.mode {
        ProposalMode::Manual => Box::new(ConsoleSource::stdin()),
        ProposalMode::Replay => {
            let path = config
                .replay_path
                .as_deref()
                .context("replay mode requires replay_path")?;
            Box::new(ReplaySource::load(path)?)
        }
        ProposalMode::Api => Box::new(ApiSource::new(&config.api, prompt)?),
    };
    Ok(source)
}
