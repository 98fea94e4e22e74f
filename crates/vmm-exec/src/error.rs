//! Error types for vmm-exec

use thiserror::Error;

/// Errors that can occur while running an external program
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Program could not be located on `PATH`
    #[error("program not found on PATH: {0}")]
    ProgramNotFound(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error while waiting on the process
    #[error("I/O error: {0}")]
    IoError(String),
}

impl ExecError {
    /// Check if the program itself was missing
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExecError::ProgramNotFound(_))
    }
}
