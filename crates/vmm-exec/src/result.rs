//! Command line and result types

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// A program invocation: argv plus an environment overlay
///
/// The overlay is merged on top of the inherited process environment when
/// the command runs. It is built once per invocation and never shared.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Ordered arguments
    pub args: Vec<String>,
    /// Environment variables set for the child only
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Create a spec for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Render the command line for logs (environment values are never shown)
    #[must_use]
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

// Environment values may carry credentials, so only the keys are printed.
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Result of a command execution
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Combine stdout and stderr
    #[must_use]
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_argument_order() {
        let spec = CommandSpec::new("tool")
            .args(["--a", "1"])
            .arg("show")
            .env("SECRET", "hunter2");

        assert_eq!(spec.args, vec!["--a", "1", "show"]);
        assert_eq!(spec.display_line(), "tool --a 1 show");
    }

    #[test]
    fn test_debug_hides_env_values() {
        let spec = CommandSpec::new("tool").env("SECRET", "hunter2");
        let rendered = format!("{spec:?}");

        assert!(rendered.contains("SECRET"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_combined_output() {
        let result = CommandResult {
            status: 1,
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            duration: Duration::ZERO,
        };
        assert_eq!(result.combined_output(), "out\nerr");
        assert!(!result.success());
    }
}
