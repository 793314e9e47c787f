//! Process runner backed by `tokio::process`

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::RunError;

/// Runs commands as local child processes
///
/// Children are spawned with `kill_on_drop`, so a cancelled invocation does
/// not leave the process running.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn execute(
        &self,
        command: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, RunError> {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled {
                program: command.program.clone(),
            });
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        cmd.envs(&command.env);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(
            dir = ?command.working_dir,
            "Running: {}", command
        );

        let child = cmd.spawn().map_err(|source| RunError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Cancelled: {}", command);
                return Err(RunError::Cancelled {
                    program: command.program.clone(),
                });
            }
            result = child.wait_with_output() => result.map_err(|source| RunError::Wait {
                program: command.program.clone(),
                source,
            })?,
        };

        let output = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if output.code != Some(0) {
            return Err(RunError::Failed {
                program: command.program.clone(),
                code: output.code,
                output: output.combined(),
            });
        }

        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").args(["-c", script])
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let output = ProcessRunner
            .execute(&sh("echo hello"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.code, Some(0));
    }

    #[tokio::test]
    async fn test_failure_wraps_combined_output() {
        let result = ProcessRunner
            .execute(
                &sh("echo planning; echo boom >&2; exit 3"),
                &CancellationToken::new(),
            )
            .await;

        match result {
            Err(RunError::Failed { code, output, .. }) => {
                assert_eq!(code, Some(3));
                assert!(output.contains("planning"));
                assert!(output.contains("boom"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_working_dir_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let env = BTreeMap::from([("KUBEFORGE_PROBE".to_string(), "42".to_string())]);
        let cmd = sh("pwd; echo $KUBEFORGE_PROBE")
            .current_dir(dir.path())
            .envs(&env);

        let output = ProcessRunner
            .execute(&cmd, &CancellationToken::new())
            .await
            .unwrap();

        let canonical = dir.path().canonicalize().unwrap();
        let mut lines = output.stdout.lines();
        let pwd = std::path::PathBuf::from(lines.next().unwrap());
        assert_eq!(pwd.canonicalize().unwrap(), canonical);
        assert_eq!(lines.next(), Some("42"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let result = ProcessRunner
            .execute(
                &CommandSpec::new("kubeforge-no-such-binary"),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(RunError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_cancellation_stops_waiting() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = ProcessRunner.execute(&sh("sleep 30"), &cancel).await;

        assert!(matches!(result, Err(RunError::Cancelled { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_spawn() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = ProcessRunner
            .execute(&CommandSpec::new("kubeforge-no-such-binary"), &cancel)
            .await;
        assert!(matches!(result, Err(RunError::Cancelled { .. })));
    }
}
