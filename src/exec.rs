//! Execution engine — runs external commands under a bounded wall-clock
//! timeout and captures their outcome.
//!
//! Commands are spawned as argument vectors in their own process group;
//! nothing is passed through a shell. On timeout the whole group receives
//! SIGKILL and the child is reaped before the result is returned, so no
//! orphaned children survive the call regardless of what the command forked.
//!
//! The gateway offers no transactionality: a command may have partially
//! executed its side effects even when the reported outcome is a timeout or
//! an internal fault.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ExecConfig;
use crate::error::GatewayError;
use crate::policy::Policy;

/// How a spawned command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Exited with code 0.
    Success,
    /// Exited with a non-zero code. Not an error at this layer —
    /// interpretation is left to the caller.
    Failure,
    /// Killed at the wall-clock bound. Output captured up to that point is
    /// discarded, not authoritative.
    Timeout,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub outcome: ExecOutcome,
}

pub struct Executor {
    policy: Arc<Policy>,
    default_timeout: Duration,
    max_timeout: Duration,
}

impl Executor {
    pub fn new(policy: Arc<Policy>, config: &ExecConfig) -> Self {
        Self {
            policy,
            default_timeout: Duration::from_secs(config.timeout_secs),
            max_timeout: Duration::from_secs(config.max_timeout_secs),
        }
    }

    /// Resolve a per-request timeout override against the configured
    /// default and ceiling.
    pub fn effective_timeout(&self, override_secs: Option<u64>) -> Duration {
        match override_secs {
            Some(secs) => Duration::from_secs(secs).min(self.max_timeout),
            None => self.default_timeout,
        }
    }

    /// Run a whitespace-tokenized command line.
    ///
    /// The line must pass the command allow-list and `working_dir`, if
    /// supplied, the path policy; violations return `PolicyDenied` without
    /// spawning anything. Tokens after the first become plain arguments —
    /// pipes and redirections are not interpreted.
    pub async fn execute_line(
        &self,
        command_line: &str,
        working_dir: Option<&Path>,
        timeout_secs: Option<u64>,
    ) -> Result<ExecutionResult, GatewayError> {
        self.policy.check_command(command_line)?;
        let argv: Vec<String> = command_line
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        self.run_checked(&argv, working_dir, timeout_secs).await
    }

    /// Run an argument vector built by an adapter (service control, health
    /// probes). The executable still has to be allow-listed.
    pub async fn execute_argv(
        &self,
        argv: &[String],
        working_dir: Option<&Path>,
        timeout_secs: Option<u64>,
    ) -> Result<ExecutionResult, GatewayError> {
        let program = argv
            .first()
            .ok_or_else(|| GatewayError::PolicyDenied("empty command".to_string()))?;
        if !self.policy.is_executable_allowed(program) {
            return Err(GatewayError::PolicyDenied(format!(
                "command not allowed: {program}"
            )));
        }
        self.run_checked(argv, working_dir, timeout_secs).await
    }

    async fn run_checked(
        &self,
        argv: &[String],
        working_dir: Option<&Path>,
        timeout_secs: Option<u64>,
    ) -> Result<ExecutionResult, GatewayError> {
        let cwd = match working_dir {
            Some(dir) => Some(self.policy.check_path(dir)?),
            None => None,
        };
        let timeout = self.effective_timeout(timeout_secs);

        debug!(command = %argv.join(" "), timeout_secs = timeout.as_secs(), "spawning command");
        spawn_and_wait(argv, cwd.as_deref(), timeout).await
    }
}

/// Spawn `argv` and wait for completion or the timeout, whichever is first.
async fn spawn_and_wait(
    argv: &[String],
    working_dir: Option<&Path>,
    timeout: Duration,
) -> Result<ExecutionResult, GatewayError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| GatewayError::PolicyDenied("empty command".to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }
    // New process group so a timeout can take down the whole tree.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .map_err(|e| GatewayError::Internal(format!("failed to spawn {program}: {e}")))?;

    let pid = child.id();
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    // Drain both pipes concurrently while waiting, so a command that fills
    // one pipe cannot deadlock against a sequential reader.
    let wait = async {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let drain_out = async {
            if let Some(pipe) = stdout.as_mut() {
                let _ = pipe.read_to_end(&mut out).await;
            }
        };
        let drain_err = async {
            if let Some(pipe) = stderr.as_mut() {
                let _ = pipe.read_to_end(&mut err).await;
            }
        };
        tokio::join!(drain_out, drain_err);
        let status = child.wait().await;
        (status, out, err)
    };

    let waited = tokio::time::timeout(timeout, wait).await;

    match waited {
        Ok((status, out, err)) => {
            let status = status
                .map_err(|e| GatewayError::Internal(format!("failed to wait on {program}: {e}")))?;
            let return_code = status.code().unwrap_or(-1);
            Ok(ExecutionResult {
                stdout: String::from_utf8_lossy(&out).into_owned(),
                stderr: String::from_utf8_lossy(&err).into_owned(),
                return_code,
                outcome: if status.success() {
                    ExecOutcome::Success
                } else {
                    ExecOutcome::Failure
                },
            })
        }
        Err(_) => {
            warn!(command = %program, timeout_secs = timeout.as_secs(), "command timed out, killing process group");
            kill_group(&mut child, pid);
            // Reap before responding — no orphans survive the call.
            let _ = child.wait().await;
            Ok(ExecutionResult {
                stdout: String::new(),
                stderr: String::new(),
                return_code: -1,
                outcome: ExecOutcome::Timeout,
            })
        }
    }
}

#[cfg(unix)]
fn kill_group(child: &mut tokio::process::Child, pid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    match pid {
        // The child was put in its own group with pgid == pid.
        Some(pid) => {
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
        None => {
            let _ = child.start_kill();
        }
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut tokio::process::Child, _pid: Option<u32>) {
    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use std::time::Instant;

    fn executor(timeout_secs: u64) -> Executor {
        let policy = Arc::new(Policy::from_config(&PolicyConfig {
            allowed_paths: vec!["/tmp".to_string()],
            denied_paths: vec![],
            allowed_commands: ["echo", "sleep", "false", "pwd"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }));
        Executor::new(
            Arc::clone(&policy),
            &ExecConfig {
                timeout_secs,
                max_timeout_secs: 60,
            },
        )
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let result = executor(10)
            .execute_line("echo hello world", None, None)
            .await
            .unwrap();
        assert_eq!(result.stdout.trim(), "hello world");
        assert_eq!(result.return_code, 0);
        assert_eq!(result.outcome, ExecOutcome::Success);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let result = executor(10).execute_line("false", None, None).await.unwrap();
        assert_ne!(result.return_code, 0);
        assert_eq!(result.outcome, ExecOutcome::Failure);
    }

    #[tokio::test]
    async fn test_timeout_kills_without_waiting_out_the_sleep() {
        let start = Instant::now();
        let result = executor(1)
            .execute_line("sleep 30", None, None)
            .await
            .unwrap();
        assert_eq!(result.outcome, ExecOutcome::Timeout);
        assert!(result.stdout.is_empty());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_denied_command_never_spawns() {
        let err = executor(10)
            .execute_line("rm -rf /", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PolicyDenied(_)));
    }

    #[tokio::test]
    async fn test_empty_command_denied() {
        let err = executor(10).execute_line("   ", None, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::PolicyDenied(_)));
    }

    #[tokio::test]
    async fn test_working_dir_is_policy_checked() {
        let exec = executor(10);
        let err = exec
            .execute_line("pwd", Some(Path::new("/etc")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PolicyDenied(_)));

        let ok = exec
            .execute_line("pwd", Some(Path::new("/tmp")), None)
            .await
            .unwrap();
        assert_eq!(ok.stdout.trim(), "/tmp");
    }

    #[tokio::test]
    async fn test_concurrent_timeouts_are_independent() {
        let exec = executor(1);
        let slow = exec.execute_line("sleep 30", None, None);
        let fast = exec.execute_line("echo quick", None, Some(10));

        let (slow, fast) = tokio::join!(slow, fast);
        assert_eq!(slow.unwrap().outcome, ExecOutcome::Timeout);
        let fast = fast.unwrap();
        assert_eq!(fast.outcome, ExecOutcome::Success);
        assert_eq!(fast.stdout.trim(), "quick");
    }

    #[tokio::test]
    async fn test_timeout_override_is_clamped() {
        let exec = executor(30);
        assert_eq!(
            exec.effective_timeout(Some(3600)),
            Duration::from_secs(60)
        );
        assert_eq!(exec.effective_timeout(Some(5)), Duration::from_secs(5));
        assert_eq!(exec.effective_timeout(None), Duration::from_secs(30));
    }
}
