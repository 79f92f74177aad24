// Parsers for command output collected over a session

use std::collections::HashMap;

use super::{FirmwareInfo, HaStatus, LogicalInterface, OsClass, OsInfo, PhysicalInterface};

/// Classify the OS from `/etc/cp-release` and `uname -s` output
pub fn parse_os(release: &str, kernel: &str) -> OsInfo {
    let release = release.trim();
    let kernel = kernel.trim();

    let class = if release.contains("Gaia") {
        OsClass::Gaia
    } else if release.contains("SecurePlatform") || release.contains("SPLAT") {
        OsClass::SecurePlatform
    } else if release.contains("Crossbeam") || release.contains("XOS") {
        OsClass::Crossbeam
    } else if kernel.contains("IPSO") {
        OsClass::Ipso
    } else if !kernel.is_empty() {
        OsClass::Unknown(kernel.to_string())
    } else {
        OsClass::Unknown("unknown".to_string())
    };

    let os_type = find_release(release).unwrap_or_else(|| "unknown".to_string());

    OsInfo { class, os_type }
}

/// Extract firmware version and platform from `fw ver` and `uname -srm`
pub fn parse_info(fw_ver: &str, uname: &str) -> Option<FirmwareInfo> {
    let version = find_release(fw_ver)?;
    let platform = uname.trim();
    if platform.is_empty() {
        return None;
    }

    Some(FirmwareInfo {
        version,
        platform: platform.to_string(),
    })
}

/// Find a release token such as `R80.40` or `(R65)`
fn find_release(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c| c == '(' || c == ')' || c == ','))
        .find(|t| {
            let mut chars = t.chars();
            chars.next() == Some('R') && chars.next().is_some_and(|c| c.is_ascii_digit())
        })
        .map(String::from)
}

/// Parse `ip -o -4 addr show` into logical interfaces (loopback skipped)
pub fn parse_logical_interfaces(output: &str) -> Vec<LogicalInterface> {
    let mut interfaces: Vec<LogicalInterface> = Vec::new();

    for line in output.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(name) = parts.get(1) else {
            continue;
        };
        let name = name.trim_end_matches(':');
        if name == "lo" {
            continue;
        }

        let address = parts
            .iter()
            .position(|p| *p == "inet")
            .and_then(|i| parts.get(i + 1))
            .map(|a| a.to_string());

        // Secondary addresses show up as extra lines; keep the first
        if interfaces.iter().any(|i| i.name == name) {
            continue;
        }

        interfaces.push(LogicalInterface {
            name: name.to_string(),
            address,
        });
    }

    interfaces
}

/// Parse `ip -o link show` into a map of link name to parent link
pub fn parse_links(output: &str) -> HashMap<String, Option<String>> {
    let mut links = HashMap::new();

    for line in output.lines() {
        let Some(field) = line.split_whitespace().nth(1) else {
            continue;
        };
        let field = field.trim_end_matches(':');

        match field.split_once('@') {
            Some((name, parent)) => {
                links.insert(name.to_string(), Some(parent.to_string()));
            }
            None => {
                links.insert(field.to_string(), None);
            }
        }
    }

    links
}

/// Resolve the physical port and VLAN behind each logical interface
pub fn physical_interfaces(
    logical: &[LogicalInterface],
    links: &HashMap<String, Option<String>>,
) -> Vec<PhysicalInterface> {
    logical
        .iter()
        .map(|iface| {
            let parent = match links.get(&iface.name) {
                Some(Some(parent)) => Some(parent.clone()),
                Some(None) => None,
                // Not in the link list, fall back to the naming convention
                None => iface.name.rsplit_once('.').map(|(p, _)| p.to_string()),
            };

            match parent {
                Some(parent) => {
                    let vlan = iface
                        .name
                        .strip_prefix(&format!("{}.", parent))
                        .map(String::from);
                    PhysicalInterface { name: parent, vlan }
                }
                None => PhysicalInterface {
                    name: iface.name.clone(),
                    vlan: None,
                },
            }
        })
        .collect()
}

/// Parse `cphaprob state`. Returns `None` when HA is not running.
///
/// The local member's state is lowercased (`ACTIVE` becomes `active`).
pub fn parse_ha_status(output: &str) -> Option<HaStatus> {
    let text = output.trim();
    if text.is_empty() || text.contains("not started") || text.contains("not running") {
        return None;
    }

    let mode = text
        .lines()
        .find_map(|l| l.trim().strip_prefix("Cluster Mode:"))
        .map(|m| m.trim().to_string());

    let status = text
        .lines()
        .find(|l| l.contains("(local)"))
        .and_then(|l| {
            let parts: Vec<&str> = l.split_whitespace().collect();
            let load = parts.iter().position(|p| p.ends_with('%'))?;
            parts.get(load + 1).map(|s| s.to_lowercase())
        })
        .unwrap_or_else(|| "unknown".to_string());

    Some(HaStatus { mode, status })
}
