//! Inventory source configuration
//!
//! A source is a YAML file named `*vmm_manager.yml` (or `.yaml`) carrying
//! `plugin: vmm_manager` and the options below. Every option can also come
//! from an environment variable; a value in the file wins over the
//! environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vmm_exec::SshIdentity;

use crate::error::InventoryError;

/// Value expected in the `plugin` key
pub const PLUGIN_NAME: &str = "vmm_manager";

/// Environment variable naming the source file for the CLI
pub const SOURCE_ENV: &str = "VMM_INVENTORY_SOURCE";

const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 3600;

/// What to do with a grouped VM that has no default network
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingNetworkPolicy {
    /// Abort the whole build
    #[default]
    Fail,
    /// Leave the VM out of the inventory and keep going
    Skip,
}

/// Raw contents of a source file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceFile {
    /// Must be `vmm_manager`
    pub plugin: Option<String>,
    pub vmm_access_point: Option<String>,
    pub vmm_server: Option<String>,
    pub vmm_inventory: Option<String>,
    pub vmm_username: Option<String>,
    pub vmm_password: Option<String>,
    pub vmm_ssh_priv_key_file: Option<String>,
    pub vmm_ssh_user: Option<String>,
    pub cache: Option<bool>,
    /// Seconds; 0 keeps entries forever
    pub cache_timeout: Option<u64>,
    pub cache_connection: Option<String>,
    #[serde(default)]
    pub missing_default_network: MissingNetworkPolicy,
}

impl SourceFile {
    /// Parse source file contents
    ///
    /// # Errors
    /// Returns `InventoryError::InvalidSource` on malformed YAML or a
    /// `plugin` value other than `vmm_manager`.
    pub fn parse(content: &str) -> Result<Self, InventoryError> {
        let file: SourceFile = serde_yaml::from_str(content)
            .map_err(|e| InventoryError::InvalidSource(e.to_string()))?;

        match file.plugin.as_deref() {
            Some(PLUGIN_NAME) => Ok(file),
            Some(other) => Err(InventoryError::InvalidSource(format!(
                "plugin is '{other}', expected '{PLUGIN_NAME}'"
            ))),
            None => Err(InventoryError::InvalidSource(
                "missing 'plugin' key".to_string(),
            )),
        }
    }
}

/// Check whether `path` names a file this plugin consumes
#[must_use]
pub fn verify_source(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("vmm_manager.yml") || n.ends_with("vmm_manager.yaml"))
}

/// Cache settings for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Whether results are read from and written to the cache
    pub enabled: bool,
    /// Entry lifetime; `None` never expires
    pub timeout: Option<Duration>,
    /// Directory holding cache files
    pub dir: PathBuf,
}

/// Fully resolved configuration for one inventory source
#[derive(Clone)]
pub struct VmmConfig {
    /// Path of the source file; also the cache identity
    pub source: PathBuf,
    /// Windows server with OpenSSH and access to SCVMM PowerShell
    pub access_point: String,
    /// SCVMM server
    pub server: String,
    /// `vmm_manager` inventory file (YAML)
    pub inventory: PathBuf,
    pub username: String,
    pub password: String,
    /// Set only when both key file and SSH user are configured
    pub ssh: Option<SshIdentity>,
    pub cache: CacheSettings,
    pub missing_network: MissingNetworkPolicy,
}

impl fmt::Debug for VmmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmmConfig")
            .field("source", &self.source)
            .field("access_point", &self.access_point)
            .field("server", &self.server)
            .field("inventory", &self.inventory)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ssh", &self.ssh)
            .field("cache", &self.cache)
            .field("missing_network", &self.missing_network)
            .finish()
    }
}

impl VmmConfig {
    /// Read and resolve a source file against the process environment
    ///
    /// # Errors
    /// Returns an error if the file name is not a vmm_manager source, the file
    /// cannot be read or parsed, or a required option is missing.
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        if !verify_source(path) {
            return Err(InventoryError::InvalidSource(format!(
                "{} does not end in vmm_manager.yml or vmm_manager.yaml",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| InventoryError::InvalidSource(format!("{}: {e}", path.display())))?;
        let file = SourceFile::parse(&content)?;

        Self::resolve(file, path, |name| std::env::var(name).ok())
    }

    /// Merge file values with environment fallbacks
    ///
    /// `env` looks up a variable by name.
    ///
    /// # Errors
    /// Returns `InventoryError::ConfigError` if a required option is missing
    /// or an environment value cannot be parsed.
    pub fn resolve<F>(file: SourceFile, source: &Path, env: F) -> Result<Self, InventoryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |value: Option<String>, var: &str| {
            value.or_else(|| env(var)).filter(|v| !v.is_empty())
        };
        let require = |value: Option<String>, option: &str, var: &str| {
            pick(value, var).ok_or_else(|| {
                InventoryError::ConfigError(format!("option {option} is required (or set {var})"))
            })
        };

        let access_point = require(file.vmm_access_point, "vmm_access_point", "VMM_ACCESS_POINT")?;
        let server = require(file.vmm_server, "vmm_server", "VMM_SERVER")?;
        let inventory = require(file.vmm_inventory, "vmm_inventory", "VMM_INVENTORY")?;
        let username = require(file.vmm_username, "vmm_username", "VMM_USERNAME")?;
        let password = require(file.vmm_password, "vmm_password", "VMM_PASSWORD")?;

        let ssh_key =
            pick(file.vmm_ssh_priv_key_file, "VMM_SSH_PRIV_KEY_FILE").map(|k| expand_home(&k));
        let ssh_user = pick(file.vmm_ssh_user, "VMM_SSH_USER");

        let enabled = match file.cache {
            Some(enabled) => enabled,
            None => env("VMM_CACHE").map(|v| parse_bool(&v)).transpose()?.unwrap_or(false),
        };
        let timeout_secs = match file.cache_timeout {
            Some(secs) => secs,
            None => env("VMM_CACHE_TIMEOUT")
                .map(|v| {
                    v.trim().parse::<u64>().map_err(|_| {
                        InventoryError::ConfigError(format!(
                            "VMM_CACHE_TIMEOUT is not a number: {v}"
                        ))
                    })
                })
                .transpose()?
                .unwrap_or(DEFAULT_CACHE_TIMEOUT_SECS),
        };
        let dir = pick(file.cache_connection, "VMM_CACHE_CONNECTION")
            .map(|d| expand_home(&d))
            .unwrap_or_else(default_cache_dir);

        let config = Self {
            source: source.to_path_buf(),
            access_point,
            server,
            inventory: PathBuf::from(inventory),
            username,
            password,
            ssh: SshIdentity::from_parts(ssh_user, ssh_key),
            cache: CacheSettings {
                enabled,
                timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
                dir,
            },
            missing_network: file.missing_default_network,
        };

        debug!(?config, "resolved source configuration");

        Ok(config)
    }
}

/// Ansible-style boolean
fn parse_bool(value: &str) -> Result<bool, InventoryError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" => Ok(true),
        "0" | "false" | "no" | "off" | "n" | "" => Ok(false),
        other => Err(InventoryError::ConfigError(format!("not a boolean: {other}"))),
    }
}

fn expand_home(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("vmm-inventory")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const FULL: &str = r"
plugin: vmm_manager
vmm_access_point: access_server
vmm_server: scvmm_server
vmm_inventory: inventory.yaml
vmm_username: username
vmm_password: s3cret
";

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_verify_source() {
        assert!(verify_source(Path::new("/etc/ansible/prod.vmm_manager.yml")));
        assert!(verify_source(Path::new("vmm_manager.yaml")));
        assert!(!verify_source(Path::new("inventory.yml")));
        assert!(!verify_source(Path::new("vmm_manager.yml.bak")));
    }

    #[test]
    fn test_wrong_plugin_rejected() {
        let err = SourceFile::parse("plugin: aws_ec2\n").unwrap_err();
        assert!(err.is_config_error());

        let err = SourceFile::parse("vmm_server: x\n").unwrap_err();
        assert!(matches!(err, InventoryError::InvalidSource(_)));
    }

    #[test]
    fn test_resolve_from_file() {
        let file = SourceFile::parse(FULL).unwrap();
        let config = VmmConfig::resolve(file, Path::new("a.vmm_manager.yml"), no_env).unwrap();

        assert_eq!(config.access_point, "access_server");
        assert_eq!(config.server, "scvmm_server");
        assert_eq!(config.inventory, PathBuf::from("inventory.yaml"));
        assert!(config.ssh.is_none());
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.timeout, Some(Duration::from_secs(3600)));
        assert_eq!(config.missing_network, MissingNetworkPolicy::Fail);
    }

    #[test]
    fn test_env_fills_missing_options_and_file_wins() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("VMM_ACCESS_POINT", "env_access"),
            ("VMM_SERVER", "env_server"),
            ("VMM_INVENTORY", "env.yaml"),
            ("VMM_USERNAME", "env_user"),
            ("VMM_PASSWORD", "env_pass"),
            ("VMM_SSH_PRIV_KEY_FILE", "/keys/id"),
            ("VMM_SSH_USER", "deploy"),
            ("VMM_CACHE", "yes"),
            ("VMM_CACHE_TIMEOUT", "0"),
        ]);
        let file = SourceFile::parse("plugin: vmm_manager\nvmm_server: file_server\n").unwrap();
        let config = VmmConfig::resolve(file, Path::new("vmm_manager.yml"), |k| {
            env.get(k).map(ToString::to_string)
        })
        .unwrap();

        assert_eq!(config.server, "file_server");
        assert_eq!(config.access_point, "env_access");
        assert_eq!(config.password, "env_pass");
        assert_eq!(
            config.ssh,
            Some(SshIdentity {
                user: "deploy".into(),
                key: "/keys/id".into()
            })
        );
        assert!(config.cache.enabled);
        assert_eq!(config.cache.timeout, None);
    }

    #[test]
    fn test_missing_required_option() {
        let file = SourceFile::parse("plugin: vmm_manager\nvmm_server: s\n").unwrap();
        let err = VmmConfig::resolve(file, Path::new("vmm_manager.yml"), no_env).unwrap_err();

        assert!(err.to_string().contains("vmm_access_point"));
        assert!(err.to_string().contains("VMM_ACCESS_POINT"));
    }

    #[test]
    fn test_bad_cache_flag() {
        let file = SourceFile::parse(FULL).unwrap();
        let err = VmmConfig::resolve(file, Path::new("vmm_manager.yml"), |k| {
            (k == "VMM_CACHE").then(|| "maybe".to_string())
        })
        .unwrap_err();

        assert!(matches!(err, InventoryError::ConfigError(_)));
    }

    #[test]
    fn test_skip_policy_from_file() {
        let content = format!("{FULL}missing_default_network: skip\n");
        let file = SourceFile::parse(&content).unwrap();
        let config = VmmConfig::resolve(file, Path::new("vmm_manager.yml"), no_env).unwrap();

        assert_eq!(config.missing_network, MissingNetworkPolicy::Skip);
    }

    #[test]
    fn test_debug_redacts_password() {
        let file = SourceFile::parse(FULL).unwrap();
        let config = VmmConfig::resolve(file, Path::new("vmm_manager.yml"), no_env).unwrap();

        assert!(!format!("{config:?}").contains("s3cret"));
    }

    #[test]
    fn test_key_and_cache_paths_expand_tilde() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let content = format!(
            "{FULL}vmm_ssh_priv_key_file: ~/.ssh/id_ed25519\nvmm_ssh_user: deploy\n\
             cache_connection: \"~\"\n"
        );
        let file = SourceFile::parse(&content).unwrap();
        let config = VmmConfig::resolve(file, Path::new("vmm_manager.yml"), no_env).unwrap();

        assert_eq!(config.ssh.unwrap().key, home.join(".ssh/id_ed25519"));
        assert_eq!(config.cache.dir, home);
        assert_eq!(expand_home("/abs/~/key"), PathBuf::from("/abs/~/key"));
    }

    #[test]
    fn test_load_rejects_unrecognised_file_name() {
        let err = VmmConfig::load(Path::new("/tmp/hosts.yml")).unwrap_err();
        assert!(matches!(err, InventoryError::InvalidSource(_)));
    }
}
