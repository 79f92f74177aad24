// Routing table parser for `ip route show` output collected from a host

use super::{Destination, NetworkRoute, RouteSet};

const ROUTE_TYPES: &[&str] = &[
    "unicast",
    "local",
    "broadcast",
    "multicast",
    "blackhole",
    "unreachable",
    "prohibit",
    "throw",
];

/// Parse the text output of `ip route show` into a route set.
///
/// Lines that cannot be understood are skipped; a firewall's table often
/// carries vendor-specific entries we have no use for.
pub fn parse_ip_route(output: &str) -> RouteSet {
    let mut routes = RouteSet::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_route_line(line) {
            Some(route) => routes.push(route),
            None => tracing::debug!("Skipping unparsable route line: {}", line),
        }
    }

    routes
}

fn parse_route_line(line: &str) -> Option<NetworkRoute> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    let mut i = 0;
    let mut route_type = None;
    if let Some(first) = parts.first() {
        if ROUTE_TYPES.contains(first) {
            route_type = Some(*first);
            i = 1;
        }
    }

    let destination: Destination = parts.get(i)?.parse().ok()?;
    i += 1;

    let mut gateway = None;
    let mut device = String::new();

    while i < parts.len() {
        match parts.get(i).copied() {
            Some("via") => {
                if let Some(gw) = parts.get(i + 1) {
                    gateway = gw.parse().ok();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            Some("dev") => {
                if let Some(iface) = parts.get(i + 1) {
                    device = iface.to_string();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => {
                i += 1;
            }
        }
    }

    if device.is_empty() {
        device = route_type.unwrap_or("unknown").to_string();
    }

    Some(NetworkRoute::new(destination, gateway, device).with_text(line))
}
