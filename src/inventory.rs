// Host and cluster inventory (TOML)

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::health::cluster::Member;
use crate::routes::ignore::IgnoreSet;

/// Where hosts live and how they are grouped into clusters
pub trait Inventory {
    /// Address for a host name; unknown names are used as the address
    fn host_address(&self, name: &str) -> String;

    fn cluster_members(&self, cluster: &str) -> Vec<String>;

    fn ignored_routes(&self, cluster: &str) -> IgnoreSet;

    fn all_hosts(&self) -> Vec<String>;

    fn standalone_hosts(&self) -> Vec<String>;

    fn clusters(&self) -> Vec<String>;

    /// Cluster members resolved to addresses
    fn resolve_members(&self, cluster: &str) -> Vec<Member> {
        self.cluster_members(cluster)
            .into_iter()
            .map(|name| {
                let address = self.host_address(&name);
                Member { name, address }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    hosts: BTreeMap<String, String>,

    #[serde(default)]
    clusters: BTreeMap<String, ClusterEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ClusterEntry {
    #[serde(default)]
    members: BTreeMap<String, String>,

    #[serde(default)]
    ignore_routes: Vec<String>,
}

/// Inventory loaded from a TOML file:
///
/// ```toml
/// [hosts]
/// fw-edge = "192.0.2.10"
///
/// [clusters.core]
/// members = { fw-a = "192.0.2.1", fw-b = "192.0.2.2" }
/// ignore_routes = ["10.99.0.0/16"]
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlInventory {
    file: InventoryFile,
}

impl TomlInventory {
    pub fn load(path: &Path) -> AppResult<Self> {
        tracing::info!("Loading inventory from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Inventory(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content).map_err(|e| match e {
            AppError::Inventory(msg) => AppError::Inventory(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn parse(content: &str) -> AppResult<Self> {
        let file: InventoryFile =
            toml::from_str(content).map_err(|e| AppError::Inventory(e.to_string()))?;
        Ok(TomlInventory { file })
    }
}

impl Inventory for TomlInventory {
    fn host_address(&self, name: &str) -> String {
        if let Some(address) = self.file.hosts.get(name) {
            return address.clone();
        }
        self.file
            .clusters
            .values()
            .find_map(|c| c.members.get(name))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn cluster_members(&self, cluster: &str) -> Vec<String> {
        self.file
            .clusters
            .get(cluster)
            .map(|c| c.members.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn ignored_routes(&self, cluster: &str) -> IgnoreSet {
        self.file
            .clusters
            .get(cluster)
            .map(|c| c.ignore_routes.iter().collect())
            .unwrap_or_default()
    }

    fn all_hosts(&self) -> Vec<String> {
        let mut hosts = self.standalone_hosts();
        for cluster in self.file.clusters.values() {
            hosts.extend(cluster.members.keys().cloned());
        }
        hosts
    }

    fn standalone_hosts(&self) -> Vec<String> {
        self.file.hosts.keys().cloned().collect()
    }

    fn clusters(&self) -> Vec<String> {
        self.file.clusters.keys().cloned().collect()
    }
}
