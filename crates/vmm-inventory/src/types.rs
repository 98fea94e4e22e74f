//! VM listing type definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::InventoryError;

// ============================================================================
// Tool output
// ============================================================================

/// Top-level document printed by `vmm_manager show`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmListing {
    /// Virtual machines, in the order the tool reported them
    #[serde(default)]
    pub vms: Option<Vec<VmRecord>>,
}

impl VmListing {
    /// Decode a listing from an already parsed JSON document
    ///
    /// `null` and documents without a `vms` list are empty listings.
    ///
    /// # Errors
    /// Returns `InventoryError::ParseError` if the document does not match the
    /// VM record schema.
    pub fn from_value(value: &Value) -> Result<Self, InventoryError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(value).map_err(|e| InventoryError::ParseError(e.to_string()))
    }

    /// VM records (empty when the tool reported none)
    #[must_use]
    pub fn records(&self) -> &[VmRecord] {
        self.vms.as_deref().unwrap_or_default()
    }
}

/// One virtual machine
///
/// Only `name`, `networks` and `ansible` are interpreted. The remaining
/// fields are opaque metadata copied into host variables as the tool
/// reported them; absent fields become `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmRecord {
    /// Unique VM name, used as the inventory host name
    pub name: String,
    /// SCVMM identifier
    #[serde(default)]
    pub vmm_id: Value,
    /// Free-form VM description
    #[serde(default)]
    pub description: Value,
    /// Template or image the VM was created from
    #[serde(default)]
    pub image: Value,
    /// SCVMM region (cloud or host group)
    #[serde(default)]
    pub region: Value,
    /// Hypervisor host inside the region
    #[serde(default)]
    pub region_host: Value,
    /// Power state as reported by SCVMM (`Running`, `PowerOff`, ...)
    #[serde(default)]
    pub status: Value,
    /// Virtual CPU count
    #[serde(default)]
    pub cpu: Value,
    /// Memory in MB
    #[serde(default)]
    pub memory: Value,
    /// Network attachments
    #[serde(default)]
    pub networks: Vec<Network>,
    /// Inventory group associations
    #[serde(default)]
    pub ansible: Vec<Association>,
}

impl VmRecord {
    /// First IP of the first network flagged as default
    #[must_use]
    pub fn default_address(&self) -> Option<&str> {
        self.networks
            .iter()
            .find(|n| n.default)
            .and_then(|n| n.ips.first())
            .map(String::as_str)
    }

    /// Host variables derived from the record itself, in output order
    /// (`ansible_host` is set separately from the resolved address)
    #[must_use]
    pub fn metadata_vars(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("vmm_id", self.vmm_id.clone()),
            ("description", self.description.clone()),
            ("image", self.image.clone()),
            ("region", self.region.clone()),
            ("region_host", self.region_host.clone()),
            ("status", self.status.clone()),
            ("cpu", self.cpu.clone()),
            ("memory", self.memory.clone()),
            ("networks", serde_json::to_value(&self.networks).unwrap_or(Value::Null)),
        ]
    }
}

/// Network attachment of a VM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Addresses on this network
    #[serde(default)]
    pub ips: Vec<String>,
    /// Primary network flag
    #[serde(default)]
    pub default: bool,
    /// Remaining fields, kept so the `networks` host variable is lossless
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Association of a VM with one inventory group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    /// Group name
    pub group: String,
    /// Extra host variables contributed by this association
    #[serde(default)]
    pub vars: Vec<ExtraVar>,
}

/// A single extra host variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraVar {
    /// Variable name
    pub name: String,
    /// Any JSON value; absent means `null`
    #[serde(default)]
    pub value: Value,
}
