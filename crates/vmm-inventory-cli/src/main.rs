//! vmm-inventory CLI
//!
//! Ansible dynamic inventory script backed by `vmm_manager`. Ansible calls it
//! with `--list` (whole inventory) or `--host <name>` (one host's variables).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgGroup, Parser};
use color_eyre::Result;
use eyre::WrapErr;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vmm_exec::LocalRunner;
use vmm_inventory::config::SOURCE_ENV;
use vmm_inventory::{FileCache, InventoryBuilder, VmmConfig};

#[derive(Parser, Debug)]
#[command(name = "vmm-inventory", version)]
#[command(about = "Ansible dynamic inventory from SCVMM via vmm_manager", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["list", "host"])))]
struct Cli {
    /// Print all groups, hosts and host variables
    #[arg(long)]
    list: bool,

    /// Print the variables of a single host
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Inventory source file (name must end in vmm_manager.yml)
    #[arg(short, long, env = SOURCE_ENV, default_value = "vmm_manager.yml")]
    source: PathBuf,

    /// Ignore cached results and refresh the cache
    #[arg(long)]
    refresh_cache: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let output = run(&cli).await?;
    println!("{output}");

    Ok(())
}

/// Build the inventory and render the requested document
async fn run(cli: &Cli) -> Result<String> {
    let config = VmmConfig::load(&cli.source)
        .wrap_err_with(|| format!("failed to load inventory source {}", cli.source.display()))?;

    debug!(?config, "loaded inventory source");

    let runner = Arc::new(LocalRunner::new());
    let cache = Arc::new(FileCache::new(&config.cache.dir, config.cache.timeout));
    let builder = InventoryBuilder::new(runner, cache);

    let inventory = builder
        .build(&config, !cli.refresh_cache)
        .await
        .wrap_err("failed to build inventory")?;

    let document = match &cli.host {
        Some(host) => inventory.host_json(host),
        None => inventory.to_list_json(),
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };

    Ok(rendered)
}

/// Logs go to stderr; stdout carries the inventory document
fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_list_mode() {
        let cli = Cli::try_parse_from(["vmm-inventory", "--list", "-s", "prod.vmm_manager.yml"])
            .unwrap();

        assert!(cli.list);
        assert!(cli.host.is_none());
        assert_eq!(cli.source, PathBuf::from("prod.vmm_manager.yml"));
    }

    #[test]
    fn test_host_mode() {
        let cli = Cli::try_parse_from(["vmm-inventory", "--host", "vm1", "--refresh-cache"])
            .unwrap();

        assert_eq!(cli.host.as_deref(), Some("vm1"));
        assert!(cli.refresh_cache);
    }

    #[test]
    fn test_mode_required_and_exclusive() {
        assert!(Cli::try_parse_from(["vmm-inventory"]).is_err());
        assert!(Cli::try_parse_from(["vmm-inventory", "--list", "--host", "vm1"]).is_err());
    }

    #[tokio::test]
    async fn test_run_rejects_unrecognised_source() {
        let cli = Cli::try_parse_from(["vmm-inventory", "--list", "-s", "/tmp/hosts.yml"])
            .unwrap();

        let err = run(&cli).await.unwrap_err();
        assert!(format!("{err:#}").contains("hosts.yml"));
    }
}
