//! `vmm_manager` client: runs the tool and parses its JSON output

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};
use vmm_exec::CommandRunner;

use crate::command::ToolCommand;
use crate::config::VmmConfig;
use crate::error::InventoryError;

/// Client for the VM listing tool
pub struct VmmClient {
    /// Runner used to spawn the tool
    runner: Arc<dyn CommandRunner>,
    /// Command line builder
    command: ToolCommand,
}

impl VmmClient {
    /// Create a client that runs `vmm_manager` through `runner`
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            command: ToolCommand::new(),
        }
    }

    /// Replace the command builder (e.g. to point at another program)
    #[must_use]
    pub fn with_command(mut self, command: ToolCommand) -> Self {
        self.command = command;
        self
    }

    /// Run `vmm_manager show` and return its parsed stdout
    ///
    /// Empty output is returned as `Value::Null`, which decodes to an empty
    /// listing.
    ///
    /// # Errors
    /// Returns `ToolNotFound` before running anything if the tool is missing,
    /// `ExecutionFailed` if it cannot be run or exits non-zero, and
    /// `ParseError` if stdout is not JSON.
    #[instrument(skip(self, config), fields(server = %config.server))]
    pub async fn fetch(&self, config: &VmmConfig) -> Result<Value, InventoryError> {
        let spec = self.command.build(config, self.runner.as_ref())?;

        debug!(command = %spec.display_line(), "running vm listing tool");

        let result = self.runner.run(&spec).await.map_err(|e| {
            if e.is_not_found() {
                InventoryError::ToolNotFound(spec.program.clone())
            } else {
                InventoryError::ExecutionFailed {
                    message: e.to_string(),
                    output: String::new(),
                }
            }
        })?;

        if !result.success() {
            return Err(InventoryError::ExecutionFailed {
                message: format!(
                    "command '{}' returned non-zero exit status {}",
                    spec.display_line(),
                    result.status
                ),
                output: result.combined_output(),
            });
        }

        parse_output(&result.stdout)
    }
}

/// Parse tool stdout strictly as JSON
///
/// # Errors
/// Returns `InventoryError::ParseError` for anything that is not JSON.
pub fn parse_output(stdout: &str) -> Result<Value, InventoryError> {
    if stdout.trim().is_empty() {
        return Ok(Value::Null);
    }

    let value: Value =
        serde_json::from_str(stdout).map_err(|e| InventoryError::ParseError(e.to_string()))?;

    let vms = value.get("vms").and_then(Value::as_array).map_or(0, Vec::len);
    debug!(vms, "parsed vm listing");

    Ok(value)
}
