// Per-cluster ignore list for routes expected to differ between members

use serde::Serialize;
use std::collections::BTreeSet;

use super::RouteSet;

/// Destination networks an operator expects to differ between cluster
/// members. Lookups are exact string matches on the network text, not
/// CIDR containment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IgnoreSet(BTreeSet<String>);

impl IgnoreSet {
    pub fn new() -> Self {
        IgnoreSet(BTreeSet::new())
    }

    pub fn contains(&self, net: &str) -> bool {
        self.0.contains(net)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for IgnoreSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        IgnoreSet(
            iter.into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

/// Peer-exclusive routes split by the ignore list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filtered {
    /// Mismatches that count against the cluster
    pub flagged: RouteSet,
    /// Mismatches the ignore list excused, kept so operators can see them
    pub suppressed: RouteSet,
}

pub fn filter(routes: &RouteSet, ignore: &IgnoreSet) -> Filtered {
    let mut result = Filtered::default();

    for route in routes {
        if ignore.contains(&route.net()) {
            tracing::debug!("Ignoring mismatched route {} -> {}", route.net(), route.gateway_text());
            result.suppressed.push(route.clone());
        } else {
            result.flagged.push(route.clone());
        }
    }

    result
}
