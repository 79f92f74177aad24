mod config;
mod error;
mod health;
mod inventory;
mod report;
mod routes;
mod session;

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use config::{Command, Config, OutputFormat};
use health::check::run_check;
use health::cluster::{ClusterAssessor, Member};
use health::host::{HostAssessor, HostResult};
use inventory::{Inventory, TomlInventory};
use routes::ignore::IgnoreSet;
use session::ssh::SshSessionFactory;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    // Diagnostics go to stderr, reports to stdout
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn load_inventory(path: &Path) -> TomlInventory {
    match TomlInventory::load(path) {
        Ok(inventory) => inventory,
        Err(e) => {
            // Host names on the command line still work as addresses
            tracing::warn!("Failed to load inventory: {}", e);
            TomlInventory::default()
        }
    }
}

/// Runs the selected command; `Ok(false)` means something assessed unhealthy
async fn run(config: Config) -> anyhow::Result<bool> {
    let inventory = load_inventory(&config.inventory);
    let factory = SshSessionFactory::new(config.ssh.clone());
    let assessor = ClusterAssessor::new(
        HostAssessor::new(&factory, &config.credentials),
        config.parallel,
        config.probe_timeout,
    );
    let mut out = std::io::stdout();

    let healthy = match &config.command {
        Command::Check { summary } => {
            let report = run_check(&inventory, &assessor).await;
            match config.format {
                OutputFormat::Json => report::write_json(&mut out, &report)?,
                OutputFormat::Lines => report::write_check_lines(&mut out, &report)?,
                OutputFormat::Text => {
                    for host in &report.hosts {
                        report::write_host(&mut out, host)?;
                        writeln!(out)?;
                    }
                    for check in &report.clusters {
                        match &check.outcome {
                            Ok(cluster) => {
                                let ignore = inventory.ignored_routes(&check.name);
                                report::write_cluster(&mut out, cluster, &ignore)?;
                            }
                            Err(reason) => writeln!(out, "Cluster {}: {}", check.name, reason)?,
                        }
                        writeln!(out)?;
                    }
                }
            }
            if *summary && config.format != OutputFormat::Json {
                report::write_summary(&mut out, &report)?;
            }
            report.ok()
        }

        Command::Cluster { name, host1, host2 } => {
            let (result, ignore) = match (name, host1, host2) {
                (Some(name), _, _) => {
                    let members = inventory.resolve_members(name);
                    let ignore = inventory.ignored_routes(name);
                    match assessor.assess(name, &members, &ignore).await {
                        Ok(result) => (result, ignore),
                        Err(e) => {
                            tracing::error!("{}", e);
                            eprintln!("Error: {}. {}", e, e.remediation());
                            return Ok(false);
                        }
                    }
                }
                (None, Some(host1), Some(host2)) => {
                    let first = Member::new(host1.as_str(), inventory.host_address(host1));
                    let second = Member::new(host2.as_str(), inventory.host_address(host2));
                    let ignore = IgnoreSet::new();
                    (assessor.assess_pair(first, second, &ignore).await, ignore)
                }
                _ => anyhow::bail!("Give either --name or both --host1 and --host2"),
            };

            match config.format {
                OutputFormat::Json => report::write_json(&mut out, &result)?,
                OutputFormat::Lines => report::write_cluster_lines(&mut out, &result)?,
                OutputFormat::Text => report::write_cluster(&mut out, &result, &ignore)?,
            }
            result.ok
        }

        Command::Host { host } => {
            let result = assess_host(&assessor, &inventory, host).await;
            write_host_result(&mut out, config.format, &result)?;
            result.ok()
        }

        Command::All => {
            let mut healthy = true;
            for host in inventory.all_hosts() {
                let result = assess_host(&assessor, &inventory, &host).await;
                write_host_result(&mut out, config.format, &result)?;
                if config.format == OutputFormat::Text {
                    writeln!(out, "========================================================")?;
                }
                healthy &= result.ok();
            }
            healthy
        }

        Command::Migrate { host } => {
            let result = assess_host(&assessor, &inventory, host).await;
            if !result.ok() {
                tracing::error!("Not writing migration config for {}: assessment failed", host);
                report::write_host(&mut std::io::stderr(), &result)?;
            } else if config.format == OutputFormat::Json {
                report::write_json(&mut out, &result)?;
            } else {
                report::write_migration(&mut out, &result)?;
            }
            result.ok()
        }

        Command::Lookup { host, ip } => {
            let result = assess_host(&assessor, &inventory, host).await;
            let Some(routes) = result.routes() else {
                anyhow::bail!("Could not retrieve routes from {}", host);
            };
            let matched = routes.lookup(*ip);
            match config.format {
                OutputFormat::Json => report::write_json(&mut out, &matched)?,
                OutputFormat::Lines => writeln!(
                    out,
                    "lookup:{}:route:{}",
                    ip,
                    matched.map(|r| r.net()).unwrap_or_else(|| "null".to_string())
                )?,
                OutputFormat::Text => match matched {
                    Some(route) => writeln!(out, "{}", route)?,
                    None => writeln!(out, "No route to {} on {}", ip, host)?,
                },
            }
            matched.is_some()
        }
    };

    out.flush()?;
    Ok(healthy)
}

async fn assess_host(assessor: &ClusterAssessor<'_>, inventory: &dyn Inventory, host: &str) -> HostResult {
    let address = inventory.host_address(host);
    assessor.host_assessor().assess(host, &address).await
}

fn write_host_result<W: Write>(out: &mut W, format: OutputFormat, result: &HostResult) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => report::write_json(out, result)?,
        OutputFormat::Lines => report::write_host_lines(out, result)?,
        OutputFormat::Text => report::write_host(out, result)?,
    }
    Ok(())
}
