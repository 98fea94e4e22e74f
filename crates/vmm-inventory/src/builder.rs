//! High-level inventory build API
//!
//! Fetches the VM listing (through the cache when enabled) and maps each VM
//! record onto inventory groups, hosts and host variables.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use vmm_exec::{CommandRunner, OpenSshProbe, SshProbe};

use crate::cache::{CachePolicy, CacheStore, cache_key};
use crate::client::VmmClient;
use crate::config::{MissingNetworkPolicy, VmmConfig};
use crate::error::InventoryError;
use crate::inventory::{AnsibleInventory, InventorySink, META_KEY};
use crate::types::VmListing;

/// Host variable holding the connection address
pub const HOST_VAR: &str = "ansible_host";

/// Host variable set when the SSH probe succeeds
pub const SSH_KEY_VAR: &str = "ansible_ssh_private_key_file";

/// Counts reported after populating an inventory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    /// Groups created
    pub groups: usize,
    /// Hosts added
    pub hosts: usize,
    /// VMs left out because they have no group association
    pub ungrouped: usize,
    /// VMs left out by the skip policy for missing default networks
    pub skipped: usize,
    /// Hosts that received the SSH key variable
    pub ssh_verified: usize,
}

/// Inventory builder
pub struct InventoryBuilder {
    client: VmmClient,
    cache: Arc<dyn CacheStore>,
    ssh: Arc<dyn SshProbe>,
}

impl InventoryBuilder {
    /// Create a builder that runs the tool and `ssh` through `runner`
    pub fn new(runner: Arc<dyn CommandRunner>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            client: VmmClient::new(runner.clone()),
            cache,
            ssh: Arc::new(OpenSshProbe::new(runner)),
        }
    }

    /// Replace the tool client
    #[must_use]
    pub fn with_client(mut self, client: VmmClient) -> Self {
        self.client = client;
        self
    }

    /// Replace the SSH probe
    #[must_use]
    pub fn with_ssh_probe(mut self, ssh: Arc<dyn SshProbe>) -> Self {
        self.ssh = ssh;
        self
    }

    /// Fetch the VM listing document, honouring the cache policy
    ///
    /// | use cache | cache valid | action |
    /// |---|---|---|
    /// | false | any | run the tool, do not store |
    /// | true | true | cached entry if present, else run and store |
    /// | true | false | run the tool and store |
    ///
    /// # Errors
    /// Propagates tool, parse and cache errors.
    #[instrument(skip(self, config), fields(source = %config.source.display()))]
    pub async fn load(
        &self,
        config: &VmmConfig,
        cache_valid: bool,
    ) -> Result<Value, InventoryError> {
        let policy = CachePolicy {
            use_cache: config.cache.enabled,
            cache_valid,
        };
        let key = cache_key(&config.source);

        if policy.may_read()
            && let Some(document) = self.cache.get(&key).await?
        {
            info!(key = %key, "using cached vm listing");
            return Ok(document);
        }

        let document = self.client.fetch(config).await?;

        if policy.should_write() {
            self.cache.set(&key, &document).await?;
            debug!(key = %key, "stored vm listing in cache");
        }

        Ok(document)
    }

    /// Fetch the listing and build a complete inventory
    ///
    /// # Errors
    /// Returns the first fatal error; no partial inventory is produced.
    #[instrument(skip(self, config), fields(source = %config.source.display()))]
    pub async fn build(
        &self,
        config: &VmmConfig,
        cache_valid: bool,
    ) -> Result<AnsibleInventory, InventoryError> {
        let document = self.load(config, cache_valid).await?;
        let listing = VmListing::from_value(&document)?;

        let mut inventory = AnsibleInventory::new();
        let summary = self.populate(&listing, config, &mut inventory).await?;

        info!(
            groups = summary.groups,
            hosts = summary.hosts,
            ungrouped = summary.ungrouped,
            skipped = summary.skipped,
            ssh_verified = summary.ssh_verified,
            "inventory built"
        );

        Ok(inventory)
    }

    /// Map VM records onto `inventory`
    ///
    /// VMs without group associations are left out; associations with the
    /// reserved `_meta` group are ignored with a warning. A grouped VM without a
    /// default network fails the build unless the source uses the skip
    /// policy. Extra variables are applied after the fixed ones and win on
    /// name clashes.
    ///
    /// # Errors
    /// Returns `InventoryError::MissingDefaultNetwork` under the fail policy.
    pub async fn populate(
        &self,
        listing: &VmListing,
        config: &VmmConfig,
        inventory: &mut dyn InventorySink,
    ) -> Result<PopulateSummary, InventoryError> {
        let mut summary = PopulateSummary::default();
        let mut seen_groups: HashSet<&str> = HashSet::new();

        for vm in listing.records() {
            let mut groups = Vec::with_capacity(vm.ansible.len());
            let mut extra_vars = Vec::new();

            for association in &vm.ansible {
                if association.group == META_KEY {
                    warn!(
                        vm = %vm.name,
                        group = META_KEY,
                        "reserved group name, ignoring association"
                    );
                    continue;
                }

                groups.push(association.group.as_str());
                extra_vars.extend(association.vars.iter());

                if seen_groups.insert(association.group.as_str()) {
                    inventory.add_group(&association.group);
                    summary.groups += 1;
                }
            }

            if groups.is_empty() {
                debug!(vm = %vm.name, "no group association, leaving out");
                summary.ungrouped += 1;
                continue;
            }

            let Some(address) = vm.default_address() else {
                match config.missing_network {
                    MissingNetworkPolicy::Fail => {
                        return Err(InventoryError::MissingDefaultNetwork {
                            vm: vm.name.clone(),
                        });
                    }
                    MissingNetworkPolicy::Skip => {
                        warn!(vm = %vm.name, "no default network, leaving out");
                        summary.skipped += 1;
                        continue;
                    }
                }
            };

            inventory.add_host(&vm.name);
            for group in &groups {
                inventory.add_child(group, &vm.name);
            }
            summary.hosts += 1;

            inventory.set_variable(&vm.name, HOST_VAR, json!(address));
            for (name, value) in vm.metadata_vars() {
                inventory.set_variable(&vm.name, name, value);
            }
            for var in extra_vars {
                inventory.set_variable(&vm.name, &var.name, var.value.clone());
            }

            if let Some(identity) = &config.ssh
                && self.ssh.probe(address, &identity.user, &identity.key).await
            {
                inventory.set_variable(
                    &vm.name,
                    SSH_KEY_VAR,
                    json!(identity.key.display().to_string()),
                );
                summary.ssh_verified += 1;
            }
        }

        Ok(summary)
    }
}
