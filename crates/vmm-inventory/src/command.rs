//! `vmm_manager` command line construction

use std::path::PathBuf;

use vmm_exec::{CommandRunner, CommandSpec};

use crate::config::VmmConfig;
use crate::error::InventoryError;

/// Default program name of the VM listing tool
pub const TOOL: &str = "vmm_manager";

/// Child environment variable carrying the SCVMM user
pub const USERNAME_ENV: &str = "VMM_USERNAME";

/// Child environment variable carrying the SCVMM password
pub const PASSWORD_ENV: &str = "VMM_PASSWORD";

/// Builds the `show` invocation of the VM listing tool
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
}

impl ToolCommand {
    /// Builder for the default `vmm_manager` program
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: TOOL.to_string(),
        }
    }

    /// Use another program name or path
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Program this builder invokes
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the command for `config`
    ///
    /// Credentials travel in the environment overlay so they never appear in
    /// the process list.
    ///
    /// # Errors
    /// Returns `InventoryError::ToolNotFound` if `runner` cannot locate the
    /// program, or `InventoryError::ConfigError` if the inventory path cannot
    /// be made absolute.
    pub fn build(
        &self,
        config: &VmmConfig,
        runner: &dyn CommandRunner,
    ) -> Result<CommandSpec, InventoryError> {
        if !runner.locate(&self.program) {
            return Err(InventoryError::ToolNotFound(self.program.clone()));
        }

        let inventory = absolute_inventory(config)?;

        Ok(CommandSpec::new(&self.program)
            .args(["--access-point", config.access_point.as_str()])
            .args(["--server", config.server.as_str()])
            .arg("--hide-progress")
            .arg("show")
            .arg("--inventory")
            .arg(inventory.display().to_string())
            .env(USERNAME_ENV, &config.username)
            .env(PASSWORD_ENV, &config.password))
    }
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self::new()
    }
}

fn absolute_inventory(config: &VmmConfig) -> Result<PathBuf, InventoryError> {
    std::path::absolute(&config.inventory).map_err(|e| {
        InventoryError::ConfigError(format!(
            "cannot resolve inventory path {}: {e}",
            config.inventory.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;
    use vmm_exec::{CommandResult, ExecError};

    use super::*;
    use crate::config::{CacheSettings, MissingNetworkPolicy};

    struct Locator(bool);

    #[async_trait]
    impl CommandRunner for Locator {
        async fn run(&self, _spec: &CommandSpec) -> Result<CommandResult, ExecError> {
            unreachable!("builder never runs commands")
        }

        fn locate(&self, _program: &str) -> bool {
            self.0
        }

        fn runner_type(&self) -> &'static str {
            "locator"
        }
    }

    fn config(inventory: &str) -> VmmConfig {
        VmmConfig {
            source: PathBuf::from("vmm_manager.yml"),
            access_point: "access".to_string(),
            server: "scvmm".to_string(),
            inventory: PathBuf::from(inventory),
            username: "admin".to_string(),
            password: "s3cret".to_string(),
            ssh: None,
            cache: CacheSettings {
                enabled: false,
                timeout: None,
                dir: PathBuf::from("/tmp"),
            },
            missing_network: MissingNetworkPolicy::Fail,
        }
    }

    #[test]
    fn test_command_line() {
        let spec = ToolCommand::new()
            .build(&config("/srv/inventory.yaml"), &Locator(true))
            .unwrap();

        assert_eq!(spec.program, "vmm_manager");
        assert_eq!(
            spec.args,
            vec![
                "--access-point",
                "access",
                "--server",
                "scvmm",
                "--hide-progress",
                "show",
                "--inventory",
                "/srv/inventory.yaml"
            ]
        );
    }

    #[test]
    fn test_credentials_only_in_env() {
        let spec = ToolCommand::new()
            .build(&config("/srv/inventory.yaml"), &Locator(true))
            .unwrap();

        assert!(!spec.args.iter().any(|a| a == "admin" || a == "s3cret"));
        assert_eq!(spec.env.get(USERNAME_ENV).map(String::as_str), Some("admin"));
        assert_eq!(spec.env.get(PASSWORD_ENV).map(String::as_str), Some("s3cret"));
    }

    #[test]
    fn test_relative_inventory_made_absolute() {
        let spec = ToolCommand::new()
            .build(&config("inventory.yaml"), &Locator(true))
            .unwrap();

        let inventory = spec.args.last().unwrap();
        assert!(Path::new(inventory).is_absolute());
        assert!(inventory.ends_with("inventory.yaml"));
    }

    #[test]
    fn test_missing_tool_fails_before_running() {
        let err = ToolCommand::new()
            .with_program("vmm_manager_custom")
            .build(&config("/srv/inventory.yaml"), &Locator(false))
            .unwrap_err();

        assert!(err.needs_installation());
        assert!(err.to_string().contains("vmm_manager_custom"));
    }

    #[test]
    fn test_ssh_settings_not_passed_to_tool() {
        let mut cfg = config("/srv/inventory.yaml");
        cfg.ssh = vmm_exec::SshIdentity::from_parts(Some("deploy".into()), Some("/k".into()));
        let spec = ToolCommand::new().build(&cfg, &Locator(true)).unwrap();

        assert!(!spec.args.iter().any(|a| a.contains("deploy") || a == "/k"));
        assert_eq!(spec.env.len(), 2);
    }
}
