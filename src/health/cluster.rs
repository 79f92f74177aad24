// Cluster health assessment for two-member HA pairs

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::Instrument;

use super::host::{HostAssessor, HostResult};
use super::ClusterErrors;
use crate::error::{AppError, AppResult};
use crate::routes::ignore::{self, IgnoreSet};
use crate::routes::reconcile::{reconcile, Reconciliation};
use crate::routes::RouteSet;
use crate::session::HaStatus;

/// HA states that mean the member is taking part in the cluster. Matching is
/// a case-sensitive substring test on the status text.
const HA_ACCEPTED_STATES: &[&str] = &["active", "standby"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub address: String,
}

impl Member {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Member {
            name: name.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterResult {
    pub name: String,
    /// Member results in inventory order
    pub hosts: Vec<HostResult>,
    /// Per host, its routes the peer lacks that the ignore list did not excuse
    pub mismatches: BTreeMap<String, RouteSet>,
    /// Per host, peer-exclusive routes excused by the ignore list
    pub suppressed: BTreeMap<String, RouteSet>,
    /// Present only when both members were assessed cleanly
    pub reconciliation: Option<Reconciliation>,
    pub errors: ClusterErrors,
    pub ok: bool,
}

impl ClusterResult {
    /// Failed because a member could not be assessed, not because the
    /// members disagree
    pub fn member_failed(&self) -> bool {
        self.hosts.iter().any(|h| !h.ok())
    }

    pub fn routes_match(&self) -> bool {
        self.reconciliation.is_some() && !self.errors.contains(ClusterErrors::ROUTE_MISMATCH)
    }
}

pub fn ha_acceptable(status: Option<&HaStatus>) -> bool {
    status.is_some_and(|ha| HA_ACCEPTED_STATES.iter().any(|s| ha.status.contains(s)))
}

pub struct ClusterAssessor<'a> {
    hosts: HostAssessor<'a>,
    parallel: bool,
    probe_timeout: Duration,
}

impl<'a> ClusterAssessor<'a> {
    pub fn new(hosts: HostAssessor<'a>, parallel: bool, probe_timeout: Duration) -> Self {
        ClusterAssessor {
            hosts,
            parallel,
            probe_timeout,
        }
    }

    pub fn host_assessor(&self) -> &HostAssessor<'a> {
        &self.hosts
    }

    /// Assess a cluster. Fails without touching any host unless there are
    /// exactly two members.
    pub async fn assess(
        &self,
        cluster: &str,
        members: &[Member],
        ignore: &IgnoreSet,
    ) -> AppResult<ClusterResult> {
        let [first, second] = members else {
            tracing::error!("Cluster {} does not contain exactly two members", cluster);
            return Err(AppError::MalformedCluster {
                cluster: cluster.to_string(),
                members: members.len(),
            });
        };

        let span = tracing::info_span!("cluster", name = %cluster);
        Ok(self
            .assess_members(cluster, first, second, ignore)
            .instrument(span)
            .await)
    }

    /// Compare two hosts that are not defined as a cluster in the inventory
    pub async fn assess_pair(&self, first: Member, second: Member, ignore: &IgnoreSet) -> ClusterResult {
        let name = format!("{}+{}", first.name, second.name);
        let span = tracing::info_span!("cluster", name = %name);
        self.assess_members(&name, &first, &second, ignore)
            .instrument(span)
            .await
    }

    async fn assess_member(&self, member: &Member) -> HostResult {
        self.hosts
            .assess_within(&member.name, &member.address, self.probe_timeout)
            .await
    }

    async fn assess_members(
        &self,
        cluster: &str,
        first: &Member,
        second: &Member,
        ignore: &IgnoreSet,
    ) -> ClusterResult {
        let (first_result, second_result) = if self.parallel {
            tokio::join!(self.assess_member(first), self.assess_member(second))
        } else {
            let a = self.assess_member(first).await;
            let b = self.assess_member(second).await;
            (a, b)
        };

        let mut result = ClusterResult {
            name: cluster.to_string(),
            hosts: Vec::with_capacity(2),
            mismatches: BTreeMap::new(),
            suppressed: BTreeMap::new(),
            reconciliation: None,
            errors: ClusterErrors::default(),
            ok: false,
        };

        if !first_result.ok() || !second_result.ok() {
            tracing::warn!("Cluster member failed, skipping route and HA comparison");
            result.hosts = vec![first_result, second_result];
            return result;
        }

        let empty = RouteSet::new();
        let reconciliation = reconcile(
            first_result.routes().unwrap_or(&empty),
            second_result.routes().unwrap_or(&empty),
        );

        if reconciliation.is_consistent() {
            tracing::debug!("Route tables are identical");
        } else if !ignore.is_empty() {
            tracing::debug!("Checking peer-exclusive routes against {} ignored networks", ignore.len());
        }

        let first_filtered = ignore::filter(&reconciliation.only_a, ignore);
        let second_filtered = ignore::filter(&reconciliation.only_b, ignore);

        if !first_filtered.flagged.is_empty() || !second_filtered.flagged.is_empty() {
            tracing::warn!(
                "Routes do not match: {} only on {}, {} only on {}",
                first_filtered.flagged.len(),
                first.name,
                second_filtered.flagged.len(),
                second.name
            );
            result.errors.insert(ClusterErrors::ROUTE_MISMATCH);
        } else {
            tracing::info!("Routes match");
        }

        let first_ha = ha_acceptable(first_result.ha_status());
        let second_ha = ha_acceptable(second_result.ha_status());
        if !(first_ha && second_ha) {
            tracing::warn!(
                "HA not working: {} is {}, {} is {}",
                first.name,
                ha_text(first_result.ha_status()),
                second.name,
                ha_text(second_result.ha_status())
            );
            result.errors.insert(ClusterErrors::HA_INCONSISTENT);
        }

        result.mismatches.insert(first.name.clone(), first_filtered.flagged);
        result.mismatches.insert(second.name.clone(), second_filtered.flagged);
        result.suppressed.insert(first.name.clone(), first_filtered.suppressed);
        result.suppressed.insert(second.name.clone(), second_filtered.suppressed);
        result.reconciliation = Some(reconciliation);
        result.hosts = vec![first_result, second_result];
        result.ok = result.errors.is_empty();

        result
    }
}

fn ha_text(status: Option<&HaStatus>) -> &str {
    status.map(|s| s.status.as_str()).unwrap_or("not configured")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::mock::{default_routes, MockFactory, ScriptedHost};
    use crate::health::HostErrors;
    use crate::routes::route;
    use crate::session::Credentials;

    fn members() -> Vec<Member> {
        vec![Member::new("fw-a", "192.0.2.1"), Member::new("fw-b", "192.0.2.2")]
    }

    fn assessor<'a>(factory: &'a MockFactory, credentials: &'a Credentials) -> ClusterAssessor<'a> {
        ClusterAssessor::new(HostAssessor::new(factory, credentials), false, Duration::from_secs(5))
    }

    fn extra_route_routes() -> Vec<crate::routes::NetworkRoute> {
        let mut routes = default_routes();
        routes.push(route("10.50.0.0/16", "192.168.1.253", "eth1"));
        routes
    }

    #[tokio::test]
    async fn test_identical_routes_and_healthy_ha() {
        let factory = MockFactory::new()
            .with_host("fw-a", ScriptedHost::healthy("active"))
            .with_host("fw-b", ScriptedHost::healthy("standby"));
        let credentials = MockFactory::credentials();
        let result = assessor(&factory, &credentials)
            .assess("core", &members(), &IgnoreSet::new())
            .await
            .unwrap();

        assert!(result.ok);
        assert!(result.errors.is_empty());
        assert!(result.routes_match());
        assert!(result.mismatches.values().all(|r| r.is_empty()));
        assert_eq!(result.hosts[0].name, "fw-a");
        assert_eq!(result.hosts[1].name, "fw-b");
        assert_eq!(result.reconciliation.as_ref().unwrap().shared.len(), 3);
    }

    #[tokio::test]
    async fn test_extra_route_on_first_member() {
        let factory = MockFactory::new()
            .with_host("fw-a", ScriptedHost::healthy("active").with_routes(extra_route_routes()))
            .with_host("fw-b", ScriptedHost::healthy("standby"));
        let credentials = MockFactory::credentials();
        let result = assessor(&factory, &credentials)
            .assess("core", &members(), &IgnoreSet::new())
            .await
            .unwrap();

        assert!(!result.ok);
        assert_eq!(result.errors, ClusterErrors::ROUTE_MISMATCH);
        let fw_a = &result.mismatches["fw-a"];
        assert_eq!(fw_a.len(), 1);
        assert_eq!(fw_a.iter().next().unwrap().net(), "10.50.0.0/16");
        assert!(result.mismatches["fw-b"].is_empty());
    }

    #[tokio::test]
    async fn test_ignored_route_does_not_flag_mismatch() {
        let factory = MockFactory::new()
            .with_host("fw-a", ScriptedHost::healthy("active").with_routes(extra_route_routes()))
            .with_host("fw-b", ScriptedHost::healthy("standby"));
        let credentials = MockFactory::credentials();
        let ignore: IgnoreSet = ["10.50.0.0/16"].into_iter().collect();
        let result = assessor(&factory, &credentials)
            .assess("core", &members(), &ignore)
            .await
            .unwrap();

        assert!(result.ok);
        assert!(result.mismatches["fw-a"].is_empty());
        assert_eq!(result.suppressed["fw-a"].len(), 1);
        // underlying comparison is unchanged
        assert_eq!(result.reconciliation.as_ref().unwrap().only_a.len(), 1);
    }

    #[tokio::test]
    async fn test_ha_without_known_state_fails_cluster() {
        let factory = MockFactory::new()
            .with_host("fw-a", ScriptedHost::healthy("active"))
            .with_host("fw-b", ScriptedHost::healthy("down"));
        let credentials = MockFactory::credentials();
        let result = assessor(&factory, &credentials)
            .assess("core", &members(), &IgnoreSet::new())
            .await
            .unwrap();

        assert!(!result.ok);
        assert_eq!(result.errors, ClusterErrors::HA_INCONSISTENT);
        assert!(result.routes_match());
    }

    #[tokio::test]
    async fn test_ha_match_is_case_sensitive() {
        let factory = MockFactory::new()
            .with_host("fw-a", ScriptedHost::healthy("Active"))
            .with_host("fw-b", ScriptedHost::healthy("standby"));
        let credentials = MockFactory::credentials();
        let result = assessor(&factory, &credentials)
            .assess("core", &members(), &IgnoreSet::new())
            .await
            .unwrap();

        assert!(result.errors.contains(ClusterErrors::HA_INCONSISTENT));
    }

    #[tokio::test]
    async fn test_failed_member_leaves_cluster_flags_unset() {
        let factory = MockFactory::new()
            .with_host("fw-a", ScriptedHost::unreachable())
            .with_host("fw-b", ScriptedHost::healthy("standby").with_routes(extra_route_routes()));
        let credentials = MockFactory::credentials();
        let result = assessor(&factory, &credentials)
            .assess("core", &members(), &IgnoreSet::new())
            .await
            .unwrap();

        assert!(!result.ok);
        assert!(result.errors.is_empty());
        assert!(result.member_failed());
        assert!(result.reconciliation.is_none());
        assert!(result.mismatches.is_empty());
        assert_eq!(result.hosts[0].errors, HostErrors::CONNECT);
        // second member still assessed
        assert!(factory.query_count("fw-b") > 0);
    }

    #[tokio::test]
    async fn test_malformed_cluster_makes_no_queries() {
        let factory = MockFactory::new().with_host("fw-a", ScriptedHost::healthy("active"));
        let credentials = MockFactory::credentials();
        let assessor = assessor(&factory, &credentials);

        let one = vec![Member::new("fw-a", "192.0.2.1")];
        let err = assessor.assess("core", &one, &IgnoreSet::new()).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedCluster { members: 1, .. }));

        let mut three = members();
        three.push(Member::new("fw-c", "192.0.2.3"));
        let err = assessor.assess("core", &three, &IgnoreSet::new()).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedCluster { members: 3, .. }));

        assert_eq!(factory.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_parallel_member_timeout() {
        let mut slow = ScriptedHost::healthy("active");
        slow.delay = Some(Duration::from_secs(30));
        let factory = MockFactory::new()
            .with_host("fw-a", slow)
            .with_host("fw-b", ScriptedHost::healthy("standby"));
        let credentials = MockFactory::credentials();
        let assessor = ClusterAssessor::new(
            HostAssessor::new(&factory, &credentials),
            true,
            Duration::from_millis(100),
        );

        let result = assessor.assess("core", &members(), &IgnoreSet::new()).await.unwrap();

        assert!(!result.ok);
        assert_eq!(result.hosts[0].errors, HostErrors::CONNECT);
        assert!(result.hosts[1].ok());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_ha_acceptable() {
        let status = |s: &str| HaStatus { mode: None, status: s.to_string() };
        assert!(ha_acceptable(Some(&status("active"))));
        assert!(ha_acceptable(Some(&status("standby"))));
        assert!(ha_acceptable(Some(&status("active attention"))));
        assert!(!ha_acceptable(Some(&status("ready"))));
        assert!(!ha_acceptable(None));
    }

    #[tokio::test]
    async fn test_sequential_timeout_releases_session() {
        let mut slow = ScriptedHost::healthy("active");
        slow.delay = Some(Duration::from_secs(30));
        let factory = MockFactory::new()
            .with_host("fw-a", slow)
            .with_host("fw-b", ScriptedHost::healthy("standby"));
        let credentials = MockFactory::credentials();
        let assessor = ClusterAssessor::new(
            HostAssessor::new(&factory, &credentials),
            false,
            Duration::from_millis(100),
        );

        let result = assessor.assess("core", &members(), &IgnoreSet::new()).await.unwrap();

        assert!(!result.ok);
        assert_eq!(result.hosts[0].errors, HostErrors::CONNECT);
        let calls = factory.calls_for("fw-a");
        assert!(calls.contains(&"logout".to_string()));
        assert!(calls.contains(&"disconnect".to_string()));
        assert!(result.hosts[1].ok());
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let factory = MockFactory::new()
            .with_host("fw-a", ScriptedHost::healthy("active").with_routes(extra_route_routes()))
            .with_host("fw-b", ScriptedHost::healthy("ready"));
        let credentials = MockFactory::credentials();

        let sequential = ClusterAssessor::new(HostAssessor::new(&factory, &credentials), false, Duration::from_secs(5))
            .assess("core", &members(), &IgnoreSet::new())
            .await
            .unwrap();
        let parallel = ClusterAssessor::new(HostAssessor::new(&factory, &credentials), true, Duration::from_secs(5))
            .assess("core", &members(), &IgnoreSet::new())
            .await
            .unwrap();

        let mut expected = ClusterErrors::ROUTE_MISMATCH;
        expected.insert(ClusterErrors::HA_INCONSISTENT);
        assert_eq!(parallel.errors, expected);
        assert_eq!(parallel.errors, sequential.errors);
        assert_eq!(parallel.reconciliation, sequential.reconciliation);
        assert_eq!(parallel.mismatches, sequential.mismatches);
        assert_eq!(parallel.hosts[0].name, "fw-a");
        assert_eq!(parallel.hosts[1].name, "fw-b");
        assert!(!parallel.ok);
    }
}
