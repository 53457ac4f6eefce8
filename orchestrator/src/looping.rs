//! The agent loop behind `orchestrator run`.
//!
//! One iteration: ask the source for a pre-exec block, extract the command,
//! consult the repeat guard, execute in the sandbox, log, then ask for the
//! post-exec block. The run directory is created first and `meta.json` is
//! finalized on every exit path, including fatal errors and panics.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::extract::extract_command;
use crate::core::repeat_guard::{GuardVerdict, RepeatGuard};
use crate::core::types::Event;
use crate::io::config::OrchestratorConfig;
use crate::io::context::RunContext;
use crate::io::event_log::EventLog;
use crate::io::run_dir::{RunPaths, epoch_seconds, format_run_timestamp};
use crate::io::run_meta::{RunMeta, write_meta};
use crate::io::sandbox::Sandbox;
use crate::observer::Observer;
use crate::proposal::ProposalSource;

/// Reason why `run_loop` stopped without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The source returned a blank pre-exec block.
    SourceExhausted,
    /// The same command was proposed `occurrences` times in a row.
    GuardTripped { command: String, occurrences: u32 },
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_dir: PathBuf,
    /// Last step number reached (the step that stopped the run).
    pub steps: u32,
    pub commands_executed: u32,
    pub posts_recorded: u32,
    pub extraction_failures: u32,
    pub stop: LoopStop,
}

#[derive(Debug, Default)]
struct Tally {
    steps: u32,
    commands_executed: u32,
    posts_recorded: u32,
    extraction_failures: u32,
}

/// Run the loop until the source is exhausted or the repeat guard trips.
///
/// Errors from the source, the sandbox, or the event log abort the run. The
/// run directory then still holds every record appended so far and a
/// finalized `meta.json`.
pub fn run_loop<S, X, O>(
    config: &OrchestratorConfig,
    prompt: &str,
    source: &mut S,
    sandbox: &X,
    observer: &mut O,
) -> Result<RunOutcome>
where
    S: ProposalSource + ?Sized,
    X: Sandbox + ?Sized,
    O: Observer + ?Sized,
{
    let started_at = format_run_timestamp(Utc::now());
    let paths = RunPaths::new(&config.runs_dir, &started_at);
    paths.create()?;

    let meta = RunMeta {
        container: config.container.clone(),
        mode: config.mode.as_str().to_string(),
        prompt: prompt.to_string(),
        started_at,
        ended_at: None,
    };
    write_meta(&paths.meta_path, &meta).context("write run meta")?;
    info!(run_dir = %paths.dir.display(), mode = %meta.mode, "run started");
    let mut meta_guard = MetaGuard::new(&paths.meta_path, meta);

    let mut tally = Tally::default();
    let body = (|| -> Result<LoopStop> {
        let mut log = EventLog::open(&paths.events_path)?;
        let stop = drive(config, source, sandbox, observer, &mut log, &paths, &mut tally);
        let closed = log.close();
        let stop = stop?;
        closed?;
        Ok(stop)
    })();

    let finalized = meta_guard.complete().context("finalize run meta");

    let stop = match (body, finalized) {
        (Ok(stop), Ok(())) => stop,
        (Ok(_), Err(err)) => return Err(err),
        (Err(err), finalized) => {
            if let Err(meta_err) = finalized {
                warn!(error = %format!("{meta_err:#}"), "run meta not finalized after fatal error");
            }
            return Err(err.context(format!("run aborted; partial logs in {}", paths.dir.display())));
        }
    };

    info!(steps = tally.steps, commands = tally.commands_executed, ?stop, "run finished");
    let outcome = RunOutcome {
        run_dir: paths.dir,
        steps: tally.steps,
        commands_executed: tally.commands_executed,
        posts_recorded: tally.posts_recorded,
        extraction_failures: tally.extraction_failures,
        stop,
    };
    observer.finished(&outcome);
    Ok(outcome)
}

/// Stamps `ended_at` into `meta.json` exactly once, on drop if `complete` never ran.
struct MetaGuard {
    path: PathBuf,
    meta: RunMeta,
    done: bool,
}

impl MetaGuard {
    fn new(path: &Path, meta: RunMeta) -> Self {
        Self {
            path: path.to_path_buf(),
            meta,
            done: false,
        }
    }

    fn complete(&mut self) -> Result<()> {
        self.done = true;
        self.meta.ended_at = Some(format_run_timestamp(Utc::now()));
        write_meta(&self.path, &self.meta)
    }
}

impl Drop for MetaGuard {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.complete();
        }
    }
}

fn drive<S, X, O>(
    config: &OrchestratorConfig,
    source: &mut S,
    sandbox: &X,
    observer: &mut O,
    log: &mut EventLog,
    paths: &RunPaths,
    tally: &mut Tally,
) -> Result<LoopStop>
where
    S: ProposalSource + ?Sized,
    X: Sandbox + ?Sized,
    O: Observer + ?Sized,
{
    let mut guard = RepeatGuard::new(config.max_repeat);
    let mut context = RunContext::new(
        Some(paths.context_path.clone()),
        config.context_stdout_chars,
    );

    loop {
        tally.steps += 1;
        let step = tally.steps;
        observer.step_started(step);

        let pre = source
            .decide(step, &context)
            .with_context(|| format!("step {step}: request pre-exec block"))?;
        if pre.trim().is_empty() {
            debug!(step, "source exhausted");
            return Ok(LoopStop::SourceExhausted);
        }

        let command = match extract_command(&pre) {
            Ok(command) => command,
            Err(err) => {
                // Nothing is logged and the guard is left alone.
                tally.extraction_failures += 1;
                warn!(step, error = %err, "no command extracted");
                observer.extraction_failed(step, &err);
                continue;
            }
        };

        if let GuardVerdict::Tripped { occurrences } = guard.observe(&command) {
            let message = format!(
                "repeat guard tripped: command {command:?} proposed {occurrences} times consecutively"
            );
            log.append(&Event::guard(epoch_seconds(), &message))?;
            warn!(step, command = %command, occurrences, "repeat guard tripped");
            observer.guard_tripped(step, &command, occurrences);
            return Ok(LoopStop::GuardTripped {
                command,
                occurrences,
            });
        }

        let result = sandbox
            .exec(&command)
            .with_context(|| format!("step {step}: execute {command:?}"))?;
        log.append(&Event::command(epoch_seconds(), &pre, &command, &result))?;
        tally.commands_executed += 1;
        debug!(step, exit_code = result.exit_code, latency_s = result.latency_secs, "command logged");
        observer.command_finished(step, &command, &result);

        best_effort(
            step,
            context.record_pre(step, &pre, &command, result.exit_code, &result.stdout),
            observer,
        );

        let post = source
            .post_decide(step, &context)
            .with_context(|| format!("step {step}: request post-exec block"))?;
        if post.trim().is_empty() {
            continue;
        }
        log.append(&Event::post(epoch_seconds(), &post))?;
        tally.posts_recorded += 1;
        best_effort(step, context.record_post(step, &post), observer);
        if config.echo {
            observer.echo_blocks(step, &pre, &post);
        }
    }
}

/// Report a failed side-channel write and carry on.
fn best_effort<O: Observer + ?Sized>(step: u32, result: Result<()>, observer: &mut O) {
    if let Err(err) = result {
        warn!(step, error = %format!("{err:#}"), "context write failed");
        observer.context_write_failed(step, &err);
    }
}
