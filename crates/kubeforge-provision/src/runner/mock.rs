//! Mock command runner for testing
//!
//! Responds from a script keyed by subcommand (the first argument) and
//! records every invocation, so tests can assert what would have been run
//! without spawning processes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::RunError;

/// Scripted in-memory command runner
#[derive(Clone, Default)]
pub struct MockCommandRunner {
    /// Subcommand -> scripted result
    script: Arc<RwLock<HashMap<String, CommandOutput>>>,
    /// Every invocation, in order
    invocations: Arc<RwLock<Vec<CommandSpec>>>,
}

impl MockCommandRunner {
    /// Create a runner where every command succeeds with empty output
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed with the given stdout when the subcommand runs
    pub fn respond(self, subcommand: &str, stdout: impl Into<String>) -> Self {
        self.script
            .write()
            .unwrap()
            .insert(subcommand.to_string(), CommandOutput::success(stdout));
        self
    }

    /// Exit with `code` and the given stderr when the subcommand runs
    pub fn fail(self, subcommand: &str, code: i32, stderr: impl Into<String>) -> Self {
        self.script.write().unwrap().insert(
            subcommand.to_string(),
            CommandOutput {
                code: Some(code),
                stdout: String::new(),
                stderr: stderr.into(),
            },
        );
        self
    }

    /// All recorded invocations
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations.read().unwrap().clone()
    }

    /// Subcommands in invocation order
    pub fn subcommands(&self) -> Vec<String> {
        self.invocations
            .read()
            .unwrap()
            .iter()
            .filter_map(|cmd| cmd.subcommand().map(str::to_string))
            .collect()
    }

    /// Number of recorded invocations
    pub fn call_count(&self) -> usize {
        self.invocations.read().unwrap().len()
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
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

        self.invocations.write().unwrap().push(command.clone());

        let scripted = command
            .subcommand()
            .and_then(|sub| self.script.read().unwrap().get(sub).cloned())
            .unwrap_or_else(|| CommandOutput::success(""));

        if scripted.code != Some(0) {
            return Err(RunError::Failed {
                program: command.program.clone(),
                code: scripted.code,
                output: scripted.combined(),
            });
        }

        Ok(scripted)
    }
}
