//! vmm-inventory: Ansible dynamic inventory from `vmm_manager`
//!
//! Runs the `vmm_manager` tool against an SCVMM server, optionally caches its
//! JSON output, and maps the reported VMs onto inventory groups, hosts and
//! host variables.

pub mod builder;
pub mod cache;
pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod inventory;
pub mod types;

pub use builder::{HOST_VAR, InventoryBuilder, PopulateSummary, SSH_KEY_VAR};
pub use cache::{CachePolicy, CacheStore, FileCache, MemoryCache, cache_key};
pub use client::VmmClient;
pub use command::ToolCommand;
pub use config::{MissingNetworkPolicy, SourceFile, VmmConfig, verify_source};
pub use error::InventoryError;
pub use inventory::{ALL_GROUP, AnsibleInventory, InventorySink, META_KEY};
pub use types::{Association, ExtraVar, Network, VmListing, VmRecord};
