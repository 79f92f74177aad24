// Fleet-wide check: every standalone host, then every cluster

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::cluster::{ClusterAssessor, ClusterResult};
use super::host::HostResult;
use crate::inventory::Inventory;

#[derive(Debug, Clone, Serialize)]
pub struct ClusterCheck {
    pub name: String,
    /// `Err` holds the reason the cluster could not be assessed at all
    pub outcome: Result<ClusterResult, String>,
}

impl ClusterCheck {
    pub fn ok(&self) -> bool {
        matches!(&self.outcome, Ok(result) if result.ok)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub hosts: Vec<HostResult>,
    pub clusters: Vec<ClusterCheck>,
}

impl CheckReport {
    pub fn failed_hosts(&self) -> impl Iterator<Item = &HostResult> {
        self.hosts.iter().filter(|h| !h.ok())
    }

    pub fn failed_clusters(&self) -> impl Iterator<Item = &ClusterCheck> {
        self.clusters.iter().filter(|c| !c.ok())
    }

    pub fn ok(&self) -> bool {
        self.failed_hosts().next().is_none() && self.failed_clusters().next().is_none()
    }
}

/// Assess everything in the inventory. A failing host or cluster is
/// recorded and the run moves on.
pub async fn run_check(inventory: &dyn Inventory, assessor: &ClusterAssessor<'_>) -> CheckReport {
    let started_at = Utc::now();
    let mut hosts = Vec::new();
    let mut clusters = Vec::new();

    for name in inventory.standalone_hosts() {
        let address = inventory.host_address(&name);
        hosts.push(assessor.host_assessor().assess(&name, &address).await);
    }

    for name in inventory.clusters() {
        let members = inventory.resolve_members(&name);
        let ignore = inventory.ignored_routes(&name);
        let outcome = assessor
            .assess(&name, &members, &ignore)
            .await
            .map_err(|e| e.to_string());
        clusters.push(ClusterCheck { name, outcome });
    }

    let report = CheckReport {
        started_at,
        finished_at: Utc::now(),
        hosts,
        clusters,
    };

    tracing::info!(
        "Check finished: {} of {} hosts and {} of {} clusters with issues",
        report.failed_hosts().count(),
        report.hosts.len(),
        report.failed_clusters().count(),
        report.clusters.len()
    );

    report
}
