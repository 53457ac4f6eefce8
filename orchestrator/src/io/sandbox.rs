//! Sandbox abstraction for command execution.
//!
//! The [`Sandbox`] trait decouples the loop from the container runtime.
//! [`ContainerSandbox`] shells out to `<runtime> exec <container> <shell> -lc
//! <command>`; tests use scripted sandboxes that never spawn processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::types::ExecutionResult;
use crate::io::config::OrchestratorConfig;
use crate::io::process::{ProcessExit, run_with_timeout};

/// Runs one command and reports what happened.
///
/// A timeout is a result ([`ExecutionResult::timed_out`]), not an error.
/// Errors mean the command could not be run at all.
pub trait Sandbox {
    fn exec(&self, command: &str) -> Result<ExecutionResult>;
}

/// Executes commands inside a running container through the runtime CLI.
#[derive(Debug, Clone)]
pub struct ContainerSandbox {
    runtime: String,
    container: String,
    shell: String,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ContainerSandbox {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            runtime: config.sandbox.runtime.clone(),
            container: config.container.clone(),
            shell: config.sandbox.shell.clone(),
            timeout: Duration::from_secs(config.command_timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    /// Runtime invocation for `command`; the command string is passed as one argument.
    pub fn build_command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.runtime);
        cmd.arg("exec")
            .arg(&self.container)
            .arg(&self.shell)
            .arg("-lc")
            .arg(command);
        cmd
    }
}

impl Sandbox for ContainerSandbox {
    #[instrument(skip_all, fields(container = %self.container, timeout_secs = self.timeout.as_secs()))]
    fn exec(&self, command: &str) -> Result<ExecutionResult> {
        info!(command, "executing in sandbox");
        let output = run_with_timeout(
            self.build_command(command),
            self.timeout,
            self.output_limit_bytes,
        )
        .with_context(|| format!("{} exec {}", self.runtime, self.container))?;

        let latency_secs = output.elapsed.as_secs_f64();
        match output.exit {
            ProcessExit::TimedOut => {
                warn!(command, "sandboxed command timed out");
                Ok(ExecutionResult::timed_out(latency_secs))
            }
            ProcessExit::Exited(exit_code) => Ok(ExecutionResult {
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code,
                latency_secs,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn sandbox(runtime: &str, timeout: Duration) -> ContainerSandbox {
        ContainerSandbox {
            runtime: runtime.to_string(),
            container: "breakout_agent".to_string(),
            shell: "/bin/bash".to_string(),
            timeout,
            output_limit_bytes: 10_000,
        }
    }

    #[test]
    fn builds_login_shell_invocation() {
        let cmd = sandbox("docker", Duration::from_secs(60)).build_command("ls -la /world");
        assert_eq!(cmd.get_program(), OsStr::new("docker"));
        let args: Vec<&OsStr> = cmd.get_args().collect();
        assert_eq!(
            args,
            vec![
                OsStr::new("exec"),
                OsStr::new("breakout_agent"),
                OsStr::new("/bin/bash"),
                OsStr::new("-lc"),
                OsStr::new("ls -la /world"),
            ]
        );
    }

    #[test]
    fn from_config_uses_configured_runtime_and_timeout() {
        let config = OrchestratorConfig {
            container: "box".to_string(),
            command_timeout_secs: 5,
            ..OrchestratorConfig::default()
        };
        let sandbox = ContainerSandbox::from_config(&config);
        assert_eq!(sandbox.timeout, Duration::from_secs(5));
        let cmd = sandbox.build_command("true");
        assert_eq!(cmd.get_program(), OsStr::new("docker"));
        assert_eq!(cmd.get_args().nth(1), Some(OsStr::new("box")));
    }

    /// Uses a stand-in runtime script so the real argument layout is exercised
    /// without a container engine.
    #[cfg(unix)]
    #[test]
    fn maps_timeout_to_sentinel_result() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runtime = temp.path().join("fake-runtime");
        std::fs::write(&runtime, "#!/bin/sh\nexec sleep 5\n").expect("write runtime");
        make_executable(&runtime);

        let result = sandbox(runtime.to_str().expect("utf8 path"), Duration::from_millis(200))
            .exec("ls")
            .expect("exec");
        assert!(result.is_timeout());
        assert_eq!(result.stderr, "Command timed out");
        assert!(result.stdout.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn passes_command_as_last_argument() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runtime = temp.path().join("fake-runtime");
        // $5 is the command string after: exec <container> <shell> -lc
        std::fs::write(&runtime, "#!/bin/sh\nprintf '%s' \"$5\"\nexit 7\n").expect("write runtime");
        make_executable(&runtime);

        let result = sandbox(runtime.to_str().expect("utf8 path"), Duration::from_secs(10))
            .exec("echo 'a b'")
            .expect("exec");
        assert_eq!(result.stdout, "echo 'a b'");
        assert_eq!(result.exit_code, 7);
        assert!(result.latency_secs >= 0.0);
    }

    #[cfg(unix)]
    fn make_executable(path: &std::path::Path) {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).expect("chmod");
    }
}
