//! CLI tests for the `orchestrator` binary.
//!
//! Spawns the binary and verifies exit codes and output. Runs use a stand-in
//! container runtime script so no container engine is needed.

use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use orchestrator::exit_codes;
use orchestrator::io::event_log::load_events;
use orchestrator::io::run_dir::{EVENTS_FILE, META_FILE};
use orchestrator::io::run_meta::load_meta;
use orchestrator::test_support::TempRuns;

fn orchestrator() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_orchestrator"));
    for name in [
        "LLM_MODE",
        "AGENT_CONTAINER",
        "RUNS_DIR",
        "MAX_REPEAT",
        "ECHO",
        "CMD_TIMEOUT",
        "PROMPT_PATH",
        "REPLAY_PATH",
        "SANDBOX_RUNTIME",
    ] {
        cmd.env_remove(name);
    }
    cmd
}

#[test]
fn extract_prints_command() {
    let temp = tempfile::tempdir().expect("tempdir");
    let block = temp.path().join("block.txt");
    fs::write(&block, "**Command:** `ls -la /world`\n").expect("write block");

    let output = orchestrator()
        .current_dir(temp.path())
        .arg("extract")
        .arg(&block)
        .output()
        .expect("orchestrator extract");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ls -la /world\n");
}

#[test]
fn extract_reads_stdin_and_reports_malformed_blocks() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut child = orchestrator()
        .current_dir(temp.path())
        .arg("extract")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"<Command>\n\n<Expected>\nnothing\n")
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no command follows"));
}

#[test]
fn malformed_env_file_warns_and_continues() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join(".env"), "this is not an assignment\n").expect("write .env");
    let block = temp.path().join("block.txt");
    fs::write(&block, "<Command>\nid\n").expect("write block");

    let output = orchestrator()
        .current_dir(temp.path())
        .env("RUST_LOG", "warn")
        .arg("extract")
        .arg(&block)
        .output()
        .expect("orchestrator extract");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "id\n");
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("ignoring unreadable .env file"),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn missing_env_file_is_silent() {
    let temp = tempfile::tempdir().expect("tempdir");
    let block = temp.path().join("block.txt");
    fs::write(&block, "<Command>\nid\n").expect("write block");

    let output = orchestrator()
        .current_dir(temp.path())
        .env("RUST_LOG", "warn")
        .arg("extract")
        .arg(&block)
        .output()
        .expect("orchestrator extract");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(!String::from_utf8_lossy(&output.stderr).contains(".env"));
}

#[test]
fn unknown_mode_is_a_usage_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let status = orchestrator()
        .current_dir(temp.path())
        .args(["run", "--mode", "telepathy"])
        .status()
        .expect("orchestrator run");

    assert_eq!(status.code(), Some(exit_codes::USAGE));
}

#[test]
fn invalid_config_fails_before_creating_a_run() {
    let runs = TempRuns::new().expect("runs");
    let output = orchestrator()
        .current_dir(runs.path())
        .args(["run", "--max-repeat", "1", "--runs-dir"])
        .arg(runs.path().join("runs"))
        .output()
        .expect("orchestrator run");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("max_repeat"));
    assert!(!runs.path().join("runs").exists());
}

/// Replays a hand-written log through a fake runtime that echoes its arguments.
#[cfg(unix)]
#[test]
fn replay_run_executes_through_runtime() {
    use std::os::unix::fs::PermissionsExt;

    let runs = TempRuns::new().expect("runs");
    let runtime = runs.path().join("fake-runtime");
    // Arguments: exec <container> <shell> -lc <command>
    fs::write(&runtime, "#!/bin/sh\necho \"$2:$5\"\n").expect("write runtime");
    let mut perms = fs::metadata(&runtime).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&runtime, perms).expect("chmod");

    let source_log = runs.path().join("source.jsonl");
    fs::write(
        &source_log,
        concat!(
            "{\"t\":1.0,\"plan\":\"<Command>\\nls /world\",\"command\":\"ls /world\",\"stdout\":\"\",\"stderr\":\"\",\"exit_code\":0,\"latency_s\":0.1}\n",
            "{\"t\":2.0,\"post\":\"<Observation>\\nlisted\"}\n",
        ),
    )
    .expect("write log");

    let runs_dir = runs.path().join("runs");
    let output = orchestrator()
        .current_dir(runs.path())
        .env("SANDBOX_RUNTIME", &runtime)
        .env("AGENT_CONTAINER", "sandbox_under_test")
        .args(["run", "--no-echo", "--replay"])
        .arg(&source_log)
        .arg("--runs-dir")
        .arg(&runs_dir)
        .output()
        .expect("orchestrator run");

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Step 1"));
    assert!(stdout.contains("Run complete."));

    let run_dir = fs::read_dir(&runs_dir)
        .expect("runs dir")
        .next()
        .expect("one run")
        .expect("entry")
        .path();
    let meta = load_meta(&run_dir.join(META_FILE)).expect("meta");
    assert_eq!(meta.mode, "replay");
    assert_eq!(meta.container, "sandbox_under_test");
    assert!(meta.ended_at.is_some());

    let raw = fs::read_to_string(run_dir.join(EVENTS_FILE)).expect("events");
    let first: serde_json::Value =
        serde_json::from_str(raw.lines().next().expect("line")).expect("json");
    assert_eq!(first["command"], "ls /world");
    assert_eq!(first["stdout"], "sandbox_under_test:ls /world\n");
    let (events, _) = load_events(&run_dir.join(EVENTS_FILE)).expect("events");
    assert_eq!(events.len(), 2);
}
