// Routes module - route model, route table parsing and peer reconciliation

pub mod ignore;
pub mod network;
pub mod parser;
pub mod reconcile;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

pub use network::Destination;

/// A single route as collected from a host.
///
/// Equality only looks at the destination network and gateway. Different
/// firmware renders the same route with different device names and text, so
/// those fields are informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkRoute {
    pub destination: Destination,
    pub gateway: Option<IpAddr>,
    pub device: String,
    pub text: Option<String>,
}

impl NetworkRoute {
    pub fn new(destination: Destination, gateway: Option<IpAddr>, device: impl Into<String>) -> Self {
        NetworkRoute {
            destination,
            gateway,
            device: device.into(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Destination network string, as matched against ignore lists
    pub fn net(&self) -> String {
        self.destination.to_string()
    }

    /// Gateway as text; connected routes render as `0.0.0.0`
    pub fn gateway_text(&self) -> String {
        match self.gateway {
            Some(gw) => gw.to_string(),
            None => "0.0.0.0".to_string(),
        }
    }
}

impl PartialEq for NetworkRoute {
    fn eq(&self, other: &Self) -> bool {
        self.destination == other.destination && self.gateway == other.gateway
    }
}

impl Eq for NetworkRoute {}

impl fmt::Display for NetworkRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} -> {:<16} dev {}",
            self.net(),
            self.gateway_text(),
            self.device
        )
    }
}

/// Routes returned by one host query. Order is kept for display only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteSet(Vec<NetworkRoute>);

impl RouteSet {
    pub fn new() -> Self {
        RouteSet(Vec::new())
    }

    pub fn push(&mut self, route: NetworkRoute) {
        self.0.push(route);
    }

    /// Membership under route equality (linear scan)
    pub fn contains(&self, route: &NetworkRoute) -> bool {
        self.0.iter().any(|r| r == route)
    }

    /// Route a host would use for `dest` (longest prefix match)
    pub fn lookup(&self, dest: IpAddr) -> Option<&NetworkRoute> {
        let mut best_match: Option<&NetworkRoute> = None;

        for route in &self.0 {
            if !route.destination.contains(dest) {
                continue;
            }
            match best_match {
                Some(current) if current.destination.prefix_len() >= route.destination.prefix_len() => {}
                _ => best_match = Some(route),
            }
        }

        best_match
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NetworkRoute> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<NetworkRoute>> for RouteSet {
    fn from(routes: Vec<NetworkRoute>) -> Self {
        RouteSet(routes)
    }
}

impl FromIterator<NetworkRoute> for RouteSet {
    fn from_iter<I: IntoIterator<Item = NetworkRoute>>(iter: I) -> Self {
        RouteSet(iter.into_iter().collect())
    }
}

impl IntoIterator for RouteSet {
    type Item = NetworkRoute;
    type IntoIter = std::vec::IntoIter<NetworkRoute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RouteSet {
    type Item = &'a NetworkRoute;
    type IntoIter = std::slice::Iter<'a, NetworkRoute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
pub(crate) fn route(net: &str, gateway: &str, device: &str) -> NetworkRoute {
    let gateway = if gateway.is_empty() {
        None
    } else {
        Some(gateway.parse().unwrap())
    };
    NetworkRoute::new(net.parse().unwrap(), gateway, device)
}
