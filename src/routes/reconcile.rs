// Route reconciliation between two cluster peers

use serde::Serialize;

use super::RouteSet;

/// Result of comparing two route sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Routes of A that B also has (in A's order)
    pub shared: RouteSet,
    pub only_a: RouteSet,
    pub only_b: RouteSet,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.only_a.is_empty() && self.only_b.is_empty()
    }
}

/// Split two route sets into shared and peer-exclusive routes.
///
/// Plain linear scans: route tables are tens of entries, and this is a set
/// comparison, not a routing decision, so no sorting or prefix matching.
pub fn reconcile(a: &RouteSet, b: &RouteSet) -> Reconciliation {
    let mut result = Reconciliation::default();

    for route in a {
        if b.contains(route) {
            tracing::trace!("found in peer: {} -> {}", route.net(), route.gateway_text());
            result.shared.push(route.clone());
        } else {
            tracing::trace!("not found in peer: {} -> {}", route.net(), route.gateway_text());
            result.only_a.push(route.clone());
        }
    }

    for route in b {
        if !a.contains(route) {
            tracing::trace!("not found in peer: {} -> {}", route.net(), route.gateway_text());
            result.only_b.push(route.clone());
        }
    }

    tracing::debug!(
        "Reconciled routes: {} shared, {} only on first host, {} only on second host",
        result.shared.len(),
        result.only_a.len(),
        result.only_b.len()
    );

    result
}
