// Report rendering: human-readable text, `entity:field:value` lines, JSON

use serde::Serialize;
use std::collections::HashSet;
use std::io::{self, Write};

use crate::health::check::{CheckReport, ClusterCheck};
use crate::health::cluster::ClusterResult;
use crate::health::host::HostResult;
use crate::health::{Facet, HostErrors};
use crate::routes::ignore::IgnoreSet;
use crate::routes::reconcile::Reconciliation;
use crate::routes::{NetworkRoute, RouteSet};
use crate::session::{HaStatus, LogicalInterface, PhysicalInterface};

const RULE: &str = "========================================================";

pub fn write_json<W: Write, T: Serialize>(w: &mut W, value: &T) -> crate::error::AppResult<()> {
    serde_json::to_writer_pretty(&mut *w, value)?;
    writeln!(w)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Human-readable
// ---------------------------------------------------------------------------

pub fn write_ha_state<W: Write>(w: &mut W, status: Option<&HaStatus>) -> io::Result<()> {
    match status {
        Some(ha) => writeln!(w, "# cpha state: {}", ha.status),
        None => writeln!(w, "# cpha state: (not configured)"),
    }
}

fn facet_line<W: Write, T>(w: &mut W, label: &str, facet: &Facet<T>) -> io::Result<()> {
    match facet {
        Facet::Collected(_) => writeln!(w, "Retrieving {} ... done", label),
        Facet::Failed(reason) => writeln!(w, "Retrieving {} ... error: {}", label, reason),
        Facet::NotAttempted => writeln!(w, "Retrieving {} ... skipped", label),
    }
}

/// Step-by-step outcome for one host
pub fn write_host<W: Write>(w: &mut W, host: &HostResult) -> io::Result<()> {
    writeln!(w, "Host: {} ({})", host.name, host.address)?;

    if let Some(reason) = &host.connect_error {
        writeln!(w, "Connecting ... error: {}", reason)?;
        return Ok(());
    }
    writeln!(w, "Connecting ... done")?;

    let facts = &host.facts;
    facet_line(w, "OS information", &facts.os)?;
    facet_line(w, "firmware information", &facts.info)?;
    facet_line(w, "logical interface information", &facts.logical_interfaces)?;
    facet_line(w, "physical interface information", &facts.physical_interfaces)?;
    facet_line(w, "routes", &facts.routes)?;
    facet_line(w, "HA information", &facts.ha_status)?;

    if let (Some(os), Some(info)) = (facts.os.value(), facts.info.value()) {
        writeln!(w, "OS: {} {} (firmware {}, {})", os.class, os.os_type, info.version, info.platform)?;
    }
    if facts.ha_status.is_collected() {
        write_ha_state(w, host.ha_status())?;
    }
    Ok(())
}

fn write_route_block<W: Write>(
    w: &mut W,
    title: &str,
    routes: &RouteSet,
    ignore: Option<&IgnoreSet>,
) -> io::Result<()> {
    writeln!(w, "{} ({})", title, routes.len())?;
    writeln!(w, "{}", RULE)?;

    if routes.is_empty() {
        writeln!(w, "(none)")?;
    }
    for route in routes {
        match ignore {
            Some(ignore) if ignore.contains(&route.net()) => {
                writeln!(w, "Ignored: {:<20} -> {:<16}", route.net(), route.gateway_text())?
            }
            _ => writeln!(w, "{}", route)?,
        }
    }
    writeln!(w)
}

/// Shared and peer-exclusive routes, marking entries the ignore list excuses
pub fn write_compared_routes<W: Write>(
    w: &mut W,
    reconciliation: &Reconciliation,
    first: &str,
    second: &str,
    ignore: &IgnoreSet,
) -> io::Result<()> {
    write_route_block(w, "Shared Routes", &reconciliation.shared, None)?;
    write_route_block(w, &format!("{} Only Routes", first), &reconciliation.only_a, Some(ignore))?;
    write_route_block(w, &format!("{} Only Routes", second), &reconciliation.only_b, Some(ignore))
}

pub fn write_cluster<W: Write>(w: &mut W, cluster: &ClusterResult, ignore: &IgnoreSet) -> io::Result<()> {
    writeln!(w, "Cluster: {}", cluster.name)?;
    writeln!(w)?;

    for host in &cluster.hosts {
        write_host(w, host)?;
        writeln!(w)?;
    }

    if cluster.member_failed() {
        writeln!(w, "Route comparison skipped: a cluster member could not be assessed")?;
    } else if let (Some(reconciliation), [first, second]) = (&cluster.reconciliation, cluster.hosts.as_slice()) {
        write_compared_routes(w, reconciliation, &first.name, &second.name, ignore)?;
    }

    for text in cluster.errors.descriptions() {
        writeln!(w, "Error: {}", text)?;
    }
    writeln!(w, "Cluster {}: {}", cluster.name, if cluster.ok { "OK" } else { "FAILED" })
}

fn write_host_errors<W: Write>(w: &mut W, indent: &str, host: &HostResult) -> io::Result<()> {
    if host.errors.contains(HostErrors::CONNECT) {
        // Nothing else was attempted
        return writeln!(w, "{}Error: could not connect to host", indent);
    }
    for text in host.errors.descriptions() {
        writeln!(w, "{}Error: {}", indent, text)?;
    }
    Ok(())
}

/// Summary of everything that needs attention after a check run
pub fn write_summary<W: Write>(w: &mut W, report: &CheckReport) -> io::Result<()> {
    let failed_hosts: Vec<_> = report.failed_hosts().collect();
    let failed_clusters: Vec<_> = report.failed_clusters().collect();

    writeln!(w)?;
    writeln!(w, "{}", RULE)?;
    writeln!(w, "Summary")?;
    writeln!(w, " Number of hosts with issues ...: {}", failed_hosts.len())?;
    writeln!(w, " Number of clusters with issues : {}", failed_clusters.len())?;
    writeln!(w)?;

    writeln!(w, "Hosts")?;
    for host in failed_hosts {
        writeln!(w, "  Host: {}", host.name)?;
        write_host_errors(w, "   ", host)?;
        writeln!(w)?;
    }

    writeln!(w, "Clusters")?;
    for check in failed_clusters {
        writeln!(w, " Cluster name: {}", check.name)?;
        match &check.outcome {
            Err(reason) => writeln!(w, "  Error: {}", reason)?,
            Ok(cluster) => {
                for text in cluster.errors.descriptions() {
                    writeln!(w, "  Error: {}", text)?;
                }
                writeln!(w)?;

                for host in &cluster.hosts {
                    writeln!(w, "  Host: {}", host.name)?;
                    write_host_errors(w, "   ", host)?;

                    if let Some(routes) = cluster.mismatches.get(&host.name).filter(|r| !r.is_empty()) {
                        writeln!(w, "   Mismatched routes:")?;
                        for route in routes {
                            writeln!(w, "    {}", route)?;
                        }
                        writeln!(w)?;
                    }
                }
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Machine-parseable `entity:field:value` lines
// ---------------------------------------------------------------------------

fn quoted(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("\"{}\"", v),
        None => "null".to_string(),
    }
}

pub fn write_host_lines<W: Write>(w: &mut W, host: &HostResult) -> io::Result<()> {
    let name = &host.name;
    writeln!(w, "host:{}:addr:{}", name, host.address)?;

    if host.connect_error.is_none() {
        let info = host.facts.info.value();
        writeln!(w, "host:{}:fwver:{}", name, quoted(info.map(|i| i.version.as_str())))?;
        writeln!(w, "host:{}:platform:{}", name, quoted(info.map(|i| i.platform.as_str())))?;
        writeln!(w, "host:{}:logical:{}", name, host.facts.logical_interfaces.is_collected())?;
        writeln!(w, "host:{}:physical:{}", name, host.facts.physical_interfaces.is_collected())?;
        writeln!(w, "host:{}:routes:{}", name, host.facts.routes.is_collected())?;
        writeln!(w, "host:{}:ha:{}", name, host.facts.ha_status.is_collected())?;
    }

    writeln!(w, "host:{}:ok:{}", name, host.ok())
}

pub fn write_cluster_lines<W: Write>(w: &mut W, cluster: &ClusterResult) -> io::Result<()> {
    for host in &cluster.hosts {
        write_host_lines(w, host)?;
        let status = host.ha_status().map(|s| s.status.as_str()).filter(|_| host.ok());
        writeln!(w, "host:{}:cpha:{}", host.name, quoted(status))?;
    }

    writeln!(w, "cluster:{}:routes_match:{}", cluster.name, cluster.routes_match())?;
    writeln!(w, "cluster:{}:ok:{}", cluster.name, cluster.ok)
}

pub fn write_check_lines<W: Write>(w: &mut W, report: &CheckReport) -> io::Result<()> {
    for host in &report.hosts {
        write_host_lines(w, host)?;
    }
    for check in &report.clusters {
        write_cluster_check_lines(w, check)?;
    }
    Ok(())
}

fn write_cluster_check_lines<W: Write>(w: &mut W, check: &ClusterCheck) -> io::Result<()> {
    match &check.outcome {
        Ok(cluster) => write_cluster_lines(w, cluster),
        Err(reason) => {
            writeln!(w, "cluster:{}:error:{}", check.name, quoted(Some(reason)))?;
            writeln!(w, "cluster:{}:ok:false", check.name)
        }
    }
}

// ---------------------------------------------------------------------------
// Migration config (Gaia clish)
// ---------------------------------------------------------------------------

fn write_interfaces<W: Write>(
    w: &mut W,
    physical: &[PhysicalInterface],
    logical: &[LogicalInterface],
) -> io::Result<()> {
    writeln!(w, "# physical interfaces")?;
    let mut seen = HashSet::new();
    for iface in physical {
        if seen.insert(iface.name.as_str()) {
            writeln!(w, "set interface {} state on", iface.name)?;
        }
    }

    writeln!(w, "# VLANs")?;
    for iface in physical {
        if let Some(vlan) = &iface.vlan {
            writeln!(w, "add interface {} vlan {}", iface.name, vlan)?;
        }
    }

    writeln!(w, "# logical interfaces")?;
    for iface in logical {
        let parsed = iface.address.as_deref().and_then(|a| {
            let (ip, len) = a.split_once('/').unwrap_or((a, "32"));
            ip.parse::<std::net::IpAddr>().ok().map(|ip| (ip, len))
        });
        match parsed {
            Some((ip, len)) => writeln!(w, "set interface {} ipv4-address {} mask-length {}", iface.name, ip, len)?,
            None => writeln!(w, "# invalid ip/netmask")?,
        }
    }
    Ok(())
}

fn write_static_routes<W: Write>(w: &mut W, routes: &RouteSet) -> io::Result<()> {
    writeln!(w, "# static routes")?;
    // Connected routes come with the interfaces
    for route in routes.iter().filter(|r| r.gateway.is_some()) {
        writeln!(w, "set static-route {} nexthop gateway address {} priority 1 on", static_route_target(route), route.gateway_text())?;
    }
    Ok(())
}

fn static_route_target(route: &NetworkRoute) -> String {
    if route.destination.is_default() {
        "default".to_string()
    } else {
        route.net()
    }
}

/// Gaia configuration commands that rebuild a host's interfaces and routes
pub fn write_migration<W: Write>(w: &mut W, host: &HostResult) -> io::Result<()> {
    writeln!(w, "# host: {}", host.name)?;
    write_ha_state(w, host.ha_status())?;

    let empty_physical = Vec::new();
    let empty_logical = Vec::new();
    write_interfaces(
        w,
        host.facts.physical_interfaces.value().unwrap_or(&empty_physical),
        host.facts.logical_interfaces.value().unwrap_or(&empty_logical),
    )?;

    let empty = RouteSet::new();
    write_static_routes(w, host.routes().unwrap_or(&empty))
}
