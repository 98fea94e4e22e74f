//! Local command execution using `tokio::process`

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::ExecError;
use crate::result::{CommandResult, CommandSpec};
use crate::traits::CommandRunner;

/// Resolve a program name to its full path using `PATH`
///
/// # Errors
/// Returns `ExecError::ProgramNotFound` if the program is not on `PATH`
pub fn locate_program(program: &str) -> Result<PathBuf, ExecError> {
    which::which(program).map_err(|_| ExecError::ProgramNotFound(program.to_string()))
}

/// Local command runner
///
/// Spawns programs directly (no shell) with the inherited environment plus
/// the command's env overlay.
#[derive(Debug, Clone)]
pub struct LocalRunner;

impl LocalRunner {
    /// Create a new local runner
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    #[instrument(skip(self, spec), fields(program = %spec.program), level = "debug")]
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        debug!(command = %spec.display_line(), "executing local command");

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExecError::ProgramNotFound(spec.program.clone()),
                _ => ExecError::SpawnError(e.to_string()),
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(
            program = %spec.program,
            status = status,
            duration = ?duration,
            "command completed"
        );

        if !output.status.success() {
            debug!(
                program = %spec.program,
                status = status,
                stderr = %stderr,
                "command exited non-zero"
            );
        }

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }

    fn locate(&self, program: &str) -> bool {
        locate_program(program).is_ok()
    }

    fn runner_type(&self) -> &'static str {
        "local"
    }
}
