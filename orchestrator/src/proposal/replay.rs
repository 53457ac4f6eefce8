//! Replay source: FIFO buffer of blocks, usually rebuilt from a prior run.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};

use super::ProposalSource;
use crate::core::types::Event;
use crate::io::context::RunContext;
use crate::io::event_log::load_events;
use crate::io::run_dir::resolve_events_path;

/// One buffered step: the pre-exec block and the reflection that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStep {
    pub pre: String,
    pub post: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    steps: VecDeque<ReplayStep>,
    pending_post: Option<String>,
}

impl ReplaySource {
    pub fn new(steps: impl IntoIterator<Item = ReplayStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            pending_post: None,
        }
    }

    /// Pair every command event's plan with the post event directly after it.
    ///
    /// Guard events and stray post events are ignored.
    pub fn from_events(events: &[Event]) -> Self {
        let mut steps: Vec<ReplayStep> = Vec::new();
        let mut last_was_command = false;
        for event in events {
            match event {
                Event::Command(record) => {
                    steps.push(ReplayStep {
                        pre: record.plan.clone(),
                        post: None,
                    });
                    last_was_command = true;
                }
                Event::Post(record) => {
                    if last_was_command && let Some(step) = steps.last_mut() {
                        step.post = Some(record.post.clone());
                    }
                    last_was_command = false;
                }
                Event::Guard(_) => last_was_command = false,
            }
        }
        Self::new(steps)
    }

    /// Load from a run directory or an `events.jsonl` path.
    pub fn load(path: &Path) -> Result<Self> {
        let events_path = resolve_events_path(path);
        let (events, warnings) = load_events(&events_path)?;
        let source = Self::from_events(&events);
        info!(
            path = %events_path.display(),
            steps = source.remaining(),
            skipped_lines = warnings.len(),
            "loaded replay"
        );
        Ok(source)
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl ProposalSource for ReplaySource {
    fn decide(&mut self, step: u32, _context: &RunContext) -> Result<String> {
        match self.steps.pop_front() {
            Some(next) => {
                self.pending_post = next.post;
                Ok(next.pre)
            }
            None => {
                debug!(step, "replay exhausted");
                self.pending_post = None;
                Ok(String::new())
            }
        }
    }

    fn post_decide(&mut self, _step: u32, _context: &RunContext) -> Result<String> {
        Ok(self.pending_post.take().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ExecutionResult;

    fn command(plan: &str) -> Event {
        let result = ExecutionResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            latency_secs: 0.0,
        };
        Event::command(0.0, plan, "ls", &result)
    }

    #[test]
    fn yields_in_order_then_empty() {
        let context = RunContext::detached(10);
        let mut source = ReplaySource::new([
            ReplayStep {
                pre: "first".to_string(),
                post: Some("after first".to_string()),
            },
            ReplayStep {
                pre: "second".to_string(),
                post: None,
            },
        ]);

        assert_eq!(source.decide(1, &context).expect("decide"), "first");
        assert_eq!(source.post_decide(1, &context).expect("post"), "after first");
        assert_eq!(source.decide(2, &context).expect("decide"), "second");
        assert_eq!(source.post_decide(2, &context).expect("post"), "");
        assert_eq!(source.decide(3, &context).expect("decide"), "");
        assert_eq!(source.decide(4, &context).expect("decide"), "");
    }

    #[test]
    fn pairs_plans_with_following_posts() {
        let events = vec![
            command("plan one"),
            Event::post(1.0, "post one"),
            command("plan two"),
            command("plan three"),
            Event::post(2.0, "post three"),
            Event::guard(3.0, "stop"),
            Event::post(4.0, "stray"),
        ];

        let source = ReplaySource::from_events(&events);
        let steps: Vec<ReplayStep> = source.steps.into_iter().collect();
        assert_eq!(
            steps,
            vec![
                ReplayStep {
                    pre: "plan one".to_string(),
                    post: Some("post one".to_string()),
                },
                ReplayStep {
                    pre: "plan two".to_string(),
                    post: None,
                },
                ReplayStep {
                    pre: "plan three".to_string(),
                    post: Some("post three".to_string()),
                },
            ]
        );
    }

    #[test]
    fn loads_from_run_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            temp.path().join("events.jsonl"),
            "{\"t\":1.0,\"plan\":\"<Command>\\nls\",\"command\":\"ls\",\"stdout\":\"\",\"stderr\":\"\",\"exit_code\":0,\"latency_s\":0.1}\ngarbage\n",
        )
        .expect("write");

        let mut source = ReplaySource::load(temp.path()).expect("load");
        assert_eq!(source.remaining(), 1);
        let block = source
            .decide(1, &RunContext::detached(10))
            .expect("decide");
        assert_eq!(block, "<Command>\nls");
    }
}
