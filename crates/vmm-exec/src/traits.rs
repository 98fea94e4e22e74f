//! Command runner trait

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::{CommandResult, CommandSpec};

/// Runs a program and reports how it exited
///
/// Implementations return `Ok` for any process that ran to completion,
/// whatever its exit status; callers decide what a non-zero status means.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command and wait for it to finish
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, ExecError>;

    /// Whether `program` can be found by this runner
    fn locate(&self, program: &str) -> bool;

    /// Get runner type name
    fn runner_type(&self) -> &'static str;
}
