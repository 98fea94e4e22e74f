//! Error types for vmm-inventory

use thiserror::Error;

/// Errors that can occur while building the inventory
#[derive(Error, Debug, Clone)]
pub enum InventoryError {
    /// The VM listing tool is not installed
    #[error("{0} not found on PATH; install it with `pip install vmm-manager`")]
    ToolNotFound(String),

    /// The VM listing tool failed or could not be run
    #[error("vmm_manager error: {message}\n{output}")]
    ExecutionFailed {
        /// Underlying error message
        message: String,
        /// Captured stdout and stderr
        output: String,
    },

    /// Tool output or cached document was not the expected JSON
    #[error("JSON parse error: {0}")]
    ParseError(String),

    /// A grouped VM has no network flagged as default
    #[error("VM {vm} has no default network with an IP address")]
    MissingDefaultNetwork {
        /// VM name
        vm: String,
    },

    /// Source file is not one this plugin reads
    #[error("invalid inventory source: {0}")]
    InvalidSource(String),

    /// Invalid or missing configuration option
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// Cache read or write failed
    #[error("cache error: {0}")]
    CacheError(String),
}

impl InventoryError {
    /// Check if the error came from configuration rather than the tool
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            InventoryError::ConfigError(_) | InventoryError::InvalidSource(_)
        )
    }

    /// Check if the tool needs to be installed
    #[must_use]
    pub fn needs_installation(&self) -> bool {
        matches!(self, InventoryError::ToolNotFound(_))
    }
}
