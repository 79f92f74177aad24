// Host health assessment: one session, every facet attempted

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

use super::{Facet, HostErrors};
use crate::error::{AppError, AppResult};
use crate::routes::RouteSet;
use crate::session::{
    Credentials, FirmwareInfo, HaStatus, LogicalInterface, OsInfo, PhysicalInterface,
    RemoteSession, SessionFactory,
};

/// Everything collected from one host in one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostFacts {
    pub os: Facet<OsInfo>,
    pub info: Facet<FirmwareInfo>,
    pub logical_interfaces: Facet<Vec<LogicalInterface>>,
    pub physical_interfaces: Facet<Vec<PhysicalInterface>>,
    pub routes: Facet<RouteSet>,
    /// Collected `None` means HA is not configured
    pub ha_status: Facet<Option<HaStatus>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostResult {
    pub name: String,
    pub address: String,
    pub facts: HostFacts,
    pub connect_error: Option<String>,
    pub errors: HostErrors,
}

impl HostResult {
    /// A host that was never reached; no facet is recorded
    pub fn unreachable(name: &str, address: &str, reason: impl Into<String>) -> Self {
        let mut errors = HostErrors::default();
        errors.insert(HostErrors::CONNECT);
        HostResult {
            name: name.to_string(),
            address: address.to_string(),
            facts: HostFacts::default(),
            connect_error: Some(reason.into()),
            errors,
        }
    }

    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn routes(&self) -> Option<&RouteSet> {
        self.facts.routes.value()
    }

    pub fn ha_status(&self) -> Option<&HaStatus> {
        self.facts.ha_status.value().and_then(Option::as_ref)
    }
}

/// Accumulates facets as they are collected, whatever their outcome
struct HostResultBuilder {
    name: String,
    address: String,
    facts: HostFacts,
    errors: HostErrors,
}

impl HostResultBuilder {
    fn new(name: &str, address: &str) -> Self {
        HostResultBuilder {
            name: name.to_string(),
            address: address.to_string(),
            facts: HostFacts::default(),
            errors: HostErrors::default(),
        }
    }

    fn record<T>(&mut self, facet: &str, flag: HostErrors, result: AppResult<T>) -> Facet<T> {
        match &result {
            Ok(_) => tracing::info!("Retrieved {}", facet),
            Err(e) => {
                tracing::warn!("Failed to retrieve {}: {}", facet, e);
                self.errors.insert(flag);
            }
        }
        result.into()
    }

    fn build(self) -> HostResult {
        HostResult {
            name: self.name,
            address: self.address,
            facts: self.facts,
            connect_error: None,
            errors: self.errors,
        }
    }
}

/// An empty interface or route list means the query did not really work
fn require_data<T>(facet: &'static str, result: AppResult<Vec<T>>) -> AppResult<Vec<T>> {
    match result {
        Ok(items) if items.is_empty() => Err(AppError::query(facet, "no data returned")),
        other => other,
    }
}

pub struct HostAssessor<'a> {
    factory: &'a dyn SessionFactory,
    credentials: &'a Credentials,
}

impl<'a> HostAssessor<'a> {
    pub fn new(factory: &'a dyn SessionFactory, credentials: &'a Credentials) -> Self {
        HostAssessor { factory, credentials }
    }

    /// Connect to `address` and collect every facet.
    ///
    /// A failed connection ends the assessment with only the connect flag
    /// set. Once connected, each facet is attempted regardless of the others
    /// and the session is always logged out and disconnected afterwards.
    pub async fn assess(&self, name: &str, address: &str) -> HostResult {
        self.assess_bounded(name, address, None).await
    }

    /// Like [`assess`](Self::assess), but gives up once `limit` has passed.
    /// The session is still logged out and disconnected, and the host is
    /// reported unreachable.
    pub async fn assess_within(&self, name: &str, address: &str, limit: Duration) -> HostResult {
        self.assess_bounded(name, address, Some(limit)).await
    }

    async fn assess_bounded(&self, name: &str, address: &str, limit: Option<Duration>) -> HostResult {
        let span = tracing::info_span!("host", name = %name, address = %address);
        self.assess_inner(name, address, limit).instrument(span).await
    }

    async fn assess_inner(&self, name: &str, address: &str, limit: Option<Duration>) -> HostResult {
        let deadline = limit.map(|limit| Instant::now() + limit);
        let mut session = self.factory.open(name, address, self.credentials);

        match until(deadline, session.connect()).await {
            Some(Ok(())) => tracing::info!("Connected"),
            Some(Err(e)) => {
                tracing::warn!("Connection failed: {}", e);
                session.disconnect().await;
                let reason = match e {
                    AppError::Connection { message, .. } => message,
                    other => other.to_string(),
                };
                return HostResult::unreachable(name, address, reason);
            }
            None => {
                session.disconnect().await;
                return HostResult::unreachable(name, address, timed_out(limit));
            }
        }

        let mut builder = HostResultBuilder::new(name, address);
        let finished = until(deadline, collect(&mut *session, &mut builder))
            .await
            .is_some();

        session.logout().await;
        session.disconnect().await;

        if !finished {
            return HostResult::unreachable(name, address, timed_out(limit));
        }

        let result = builder.build();
        if result.ok() {
            tracing::info!("Host assessment complete");
        } else {
            tracing::warn!("Host assessment found issues: {}", result.errors.descriptions().join(", "));
        }
        result
    }
}

/// Run `fut` to completion, or until `deadline` if there is one
async fn until<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

fn timed_out(limit: Option<Duration>) -> String {
    let limit = limit.unwrap_or_default();
    tracing::warn!("Assessment timed out after {:?}", limit);
    AppError::Timeout(format!("assessment did not finish within {:?}", limit)).to_string()
}

/// Query every facet over a connected session
async fn collect(session: &mut dyn RemoteSession, builder: &mut HostResultBuilder) {
    let os = session.query_os().await;
    let info = session.query_info().await;
    // Either half failing fails the OS facet
    builder.facts.os = builder.record("OS information", HostErrors::OS, os);
    builder.facts.info = builder.record("firmware information", HostErrors::OS, info);

    let logical = require_data("logical interfaces", session.query_logical_interfaces().await);
    builder.facts.logical_interfaces =
        builder.record("logical interface information", HostErrors::LOGICAL_INTERFACES, logical);

    let logical: &[LogicalInterface] = builder
        .facts
        .logical_interfaces
        .value()
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let physical = require_data(
        "physical interfaces",
        session.query_physical_interfaces(logical).await,
    );
    builder.facts.physical_interfaces =
        builder.record("physical interface information", HostErrors::PHYSICAL_INTERFACES, physical);

    let routes = session
        .query_routes()
        .await
        .and_then(|routes| {
            if routes.is_empty() {
                Err(AppError::query("routes", "no data returned"))
            } else {
                Ok(routes)
            }
        });
    builder.facts.routes = builder.record("routes", HostErrors::ROUTES, routes);

    let ha = session.query_ha_status().await;
    builder.facts.ha_status = builder.record("HA information", HostErrors::HA, ha);
}
