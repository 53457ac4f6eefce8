//! `orchestrator` binary: run the agent loop or test command extraction.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};

use orchestrator::core::extract::extract_command;
use orchestrator::core::types::ProposalMode;
use orchestrator::exit_codes;
use orchestrator::io::config::{OrchestratorConfig, resolve_config};
use orchestrator::io::sandbox::ContainerSandbox;
use orchestrator::logging;
use orchestrator::looping::run_loop;
use orchestrator::observer::ConsoleObserver;
use orchestrator::proposal::{DEFAULT_PROMPT, build_source};

#[derive(Parser)]
#[command(
    name = "orchestrator",
    version,
    about = "Run an agent loop against a sandboxed container"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a run and write its logs under the runs directory.
    Run(RunArgs),
    /// Print the command extracted from a pre-exec block (FILE or stdin).
    Extract { file: Option<PathBuf> },
}

#[derive(Args)]
struct RunArgs {
    /// TOML config file; environment variables and flags override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Proposal source: manual, replay, or api.
    #[arg(long, value_parser = parse_mode)]
    mode: Option<ProposalMode>,
    #[arg(long)]
    container: Option<String>,
    #[arg(long)]
    runs_dir: Option<PathBuf>,
    /// Identical consecutive commands that stop the run.
    #[arg(long)]
    max_repeat: Option<u32>,
    /// Per-command timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
    /// Run directory or events.jsonl to replay (implies --mode replay).
    #[arg(long)]
    replay: Option<PathBuf>,
    /// Do not echo pre/post blocks after each step.
    #[arg(long)]
    no_echo: bool,
}

impl RunArgs {
    fn apply(self, config: &mut OrchestratorConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(container) = self.container {
            config.container = container;
        }
        if let Some(runs_dir) = self.runs_dir {
            config.runs_dir = runs_dir;
        }
        if let Some(max_repeat) = self.max_repeat {
            config.max_repeat = max_repeat;
        }
        if let Some(timeout) = self.timeout {
            config.command_timeout_secs = timeout;
        }
        if let Some(replay) = self.replay {
            config.replay_path = Some(replay);
            if self.mode.is_none() {
                config.mode = ProposalMode::Replay;
            }
        }
        if self.no_echo {
            config.echo = false;
        }
    }
}

fn parse_mode(raw: &str) -> Result<ProposalMode, String> {
    ProposalMode::parse(raw).ok_or_else(|| format!("unknown mode '{raw}' (manual, replay, api)"))
}

fn main() {
    let dotenv = dotenvy::dotenv();
    logging::init();
    if let Err(err) = dotenv
        && !err.not_found()
    {
        warn!(error = %err, "ignoring unreadable .env file");
    }

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Extract { file } => cmd_extract(file.as_deref()),
    }
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    let mut config = resolve_config(args.config.as_deref(), |name| std::env::var(name).ok())?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;
    debug!(mode = ?config.mode, container = %config.container, "configuration resolved");

    let prompt = load_prompt(config.prompt_path.as_deref())?;
    let mut source = build_source(&config, &prompt)?;
    let sandbox = ContainerSandbox::from_config(&config);
    let mut observer = ConsoleObserver;

    run_loop(&config, &prompt, &mut source, &sandbox, &mut observer)?;
    Ok(exit_codes::OK)
}

fn cmd_extract(file: Option<&Path>) -> Result<i32> {
    let block = match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read stdin")?;
            buf
        }
    };

    match extract_command(&block) {
        Ok(command) => {
            println!("{command}");
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("error: {err}");
            Ok(exit_codes::FAILED)
        }
    }
}

fn load_prompt(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("read prompt {}", path.display()))
        }
        None => Ok(DEFAULT_PROMPT.to_string()),
    }
}
