//! Inventory model and Ansible dynamic-inventory rendering

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value, json};

/// Implicit group every host belongs to
pub const ALL_GROUP: &str = "all";

/// Top-level `--list` key holding host variables; cannot be a group
pub const META_KEY: &str = "_meta";

/// Mutation interface the record mapper writes into
pub trait InventorySink: Send {
    /// Create a group if it does not exist
    fn add_group(&mut self, group: &str);

    /// Create a host if it does not exist
    fn add_host(&mut self, host: &str);

    /// Make `host` a member of `group`; repeated links are no-ops
    fn add_child(&mut self, group: &str, host: &str);

    /// Set a host variable, replacing any previous value
    fn set_variable(&mut self, host: &str, name: &str, value: Value);
}

/// Ordered in-memory inventory
///
/// Groups, hosts, group members and host variables all keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct AnsibleInventory {
    groups: IndexMap<String, IndexSet<String>>,
    hosts: IndexMap<String, IndexMap<String, Value>>,
}

impl AnsibleInventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Group names in creation order
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Host names in creation order
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    /// Members of `group`
    #[must_use]
    pub fn group_hosts(&self, group: &str) -> Option<Vec<&str>> {
        self.groups
            .get(group)
            .map(|members| members.iter().map(String::as_str).collect())
    }

    /// Variables of `host`
    #[must_use]
    pub fn host_vars(&self, host: &str) -> Option<&IndexMap<String, Value>> {
        self.hosts.get(host)
    }

    /// Single variable of `host`
    #[must_use]
    pub fn host_var(&self, host: &str, name: &str) -> Option<&Value> {
        self.hosts.get(host).and_then(|vars| vars.get(name))
    }

    /// Render the `--list` document
    ///
    /// ```json
    /// {"all": {"children": [...]}, "<group>": {"hosts": [...]}, "_meta": {"hostvars": {...}}}
    /// ```
    ///
    /// Members of an explicit `all` group are listed under `all.hosts`. A
    /// group named `_meta` cannot be expressed and is left out.
    #[must_use]
    pub fn to_list_json(&self) -> Value {
        let mut result = Map::new();

        let children: Vec<&str> = self
            .groups()
            .filter(|g| *g != ALL_GROUP && *g != META_KEY)
            .collect();
        let mut all = Map::new();
        all.insert("children".to_string(), json!(children));
        if let Some(hosts) = self.group_hosts(ALL_GROUP) {
            all.insert("hosts".to_string(), json!(hosts));
        }
        result.insert(ALL_GROUP.to_string(), Value::Object(all));

        for (name, members) in &self.groups {
            if name == ALL_GROUP || name == META_KEY {
                continue;
            }
            let hosts: Vec<&str> = members.iter().map(String::as_str).collect();
            result.insert(name.clone(), json!({ "hosts": hosts }));
        }

        let hostvars: Map<String, Value> = self
            .hosts
            .iter()
            .map(|(host, vars)| (host.clone(), vars_to_json(vars)))
            .collect();
        result.insert(META_KEY.to_string(), json!({ "hostvars": hostvars }));

        Value::Object(result)
    }

    /// Render the `--host <name>` document; unknown hosts have no variables
    #[must_use]
    pub fn host_json(&self, host: &str) -> Value {
        self.hosts
            .get(host)
            .map_or_else(|| Value::Object(Map::new()), vars_to_json)
    }
}

fn vars_to_json(vars: &IndexMap<String, Value>) -> Value {
    Value::Object(vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

impl InventorySink for AnsibleInventory {
    fn add_group(&mut self, group: &str) {
        if !self.groups.contains_key(group) {
            self.groups.insert(group.to_string(), IndexSet::new());
        }
    }

    fn add_host(&mut self, host: &str) {
        if !self.hosts.contains_key(host) {
            self.hosts.insert(host.to_string(), IndexMap::new());
        }
    }

    fn add_child(&mut self, group: &str, host: &str) {
        self.add_group(group);
        self.add_host(host);
        if let Some(members) = self.groups.get_mut(group) {
            members.insert(host.to_string());
        }
    }

    fn set_variable(&mut self, host: &str, name: &str, value: Value) {
        self.add_host(host);
        if let Some(vars) = self.hosts.get_mut(host) {
            vars.insert(name.to_string(), value);
        }
    }
}
