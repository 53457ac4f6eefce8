mod cli;
mod events;
mod metrics;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use orchestrator::{exit_codes, logging};

#[derive(Parser)]
#[command(name = "scoring", version, about = "Score orchestrator run logs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print metrics JSON for a run directory or an events.jsonl file.
    Score { path: PathBuf },
    /// Summarize every run under a runs directory.
    Report {
        #[arg(default_value = "runs")]
        runs_dir: PathBuf,
    },
}

fn main() {
    logging::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Score { path } => cli::score(&path),
        Command::Report { runs_dir } => cli::report(&runs_dir),
    };
    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(exit_codes::FAILED);
    }
}
