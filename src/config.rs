// Configuration management for fwcheck
// Supports CLI arguments, config file (TOML), and environment variables

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

use crate::session::ssh::SshSettings;
use crate::session::Credentials;

/// fwcheck - Health checks for firewalls and two-node HA clusters
#[derive(Parser, Debug, Clone)]
#[command(name = "fwcheck")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "FWCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the host inventory
    #[arg(short, long, global = true, env = "FWCHECK_INVENTORY")]
    pub inventory: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, global = true, env = "FWCHECK_LOG")]
    pub log_level: Option<String>,

    /// Verbose output (same as --log-level debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Probe both cluster members at the same time
    #[arg(long, global = true, env = "FWCHECK_PARALLEL")]
    pub parallel: bool,

    /// SSH user name
    #[arg(short, long, global = true, env = "FWCHECK_USER")]
    pub user: Option<String>,

    /// SSH port
    #[arg(short, long, global = true, env = "FWCHECK_PORT")]
    pub port: Option<u16>,

    /// SSH identity file
    #[arg(long, global = true, env = "FWCHECK_IDENTITY")]
    pub identity: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check every standalone host and cluster in the inventory
    Check {
        /// Print a summary of hosts and clusters with issues
        #[arg(long)]
        summary: bool,
    },
    /// Compare the two members of a cluster
    Cluster {
        /// Cluster name from the inventory
        #[arg(long, conflicts_with_all = ["host1", "host2"])]
        name: Option<String>,

        /// First host (name or address)
        #[arg(long, requires = "host2")]
        host1: Option<String>,

        /// Second host (name or address)
        #[arg(long, requires = "host1")]
        host2: Option<String>,
    },
    /// Assess a single host
    Host { host: String },
    /// Assess every host in the inventory one by one
    All,
    /// Print Gaia configuration commands that rebuild a host's interfaces and routes
    Migrate { host: String },
    /// Show which of a host's routes carries traffic for an address
    Lookup { host: String, ip: std::net::IpAddr },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable report
    Text,
    /// `entity:field:value` lines for log scraping
    Lines,
    /// JSON documents
    Json,
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Inventory path
    #[serde(default)]
    pub inventory: Option<PathBuf>,

    /// SSH settings
    #[serde(default)]
    pub ssh: SshConfig,

    /// Assessment settings
    #[serde(default)]
    pub assessment: AssessmentConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Login user; falls back to $USER
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default)]
    pub identity_file: Option<PathBuf>,

    /// ssh binary to run
    #[serde(default = "default_ssh_binary")]
    pub binary: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Directory for control-master sockets
    #[serde(default = "default_control_dir")]
    pub control_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentConfig {
    /// Probe both cluster members concurrently
    #[serde(default)]
    pub parallel: bool,

    /// Upper bound for a whole host assessment
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_ssh_port() -> u16 {
    22
}
fn default_ssh_binary() -> String {
    "ssh".to_string()
}
fn default_connect_timeout() -> u64 {
    15
}
fn default_command_timeout() -> u64 {
    30
}
fn default_control_dir() -> PathBuf {
    std::env::temp_dir()
}
fn default_probe_timeout() -> u64 {
    300
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_inventory() -> PathBuf {
    PathBuf::from("hosts.toml")
}

impl Default for SshConfig {
    fn default() -> Self {
        SshConfig {
            user: None,
            port: default_ssh_port(),
            identity_file: None,
            binary: default_ssh_binary(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            control_dir: default_control_dir(),
        }
    }
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        AssessmentConfig {
            parallel: false,
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    pub format: OutputFormat,
    pub log_level: Level,
    pub inventory: PathBuf,
    pub credentials: Credentials,
    pub ssh: SshSettings,
    pub parallel: bool,
    pub probe_timeout: Duration,
}

impl Config {
    /// Load configuration from all sources (CLI args, config file, defaults)
    /// Priority: CLI args > Environment variables > Config file > Defaults
    pub fn load() -> anyhow::Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(cli_args: CliArgs) -> anyhow::Result<Self> {
        // Load config file if specified
        let config_file = if let Some(config_path) = &cli_args.config {
            let config_content = std::fs::read_to_string(config_path)?;
            toml::from_str::<ConfigFile>(&config_content)?
        } else {
            // Try loading from default locations
            let default_paths = vec![PathBuf::from("fwcheck.toml"), PathBuf::from("config.toml")];

            let mut loaded_config = None;
            for path in default_paths {
                if path.exists() {
                    let config_content = std::fs::read_to_string(&path)?;
                    loaded_config = Some(toml::from_str::<ConfigFile>(&config_content)?);
                    break;
                }
            }

            loaded_config.unwrap_or_default()
        };

        Self::merge(cli_args, config_file)
    }

    fn merge(cli_args: CliArgs, config_file: ConfigFile) -> anyhow::Result<Self> {
        let log_level = if cli_args.verbose {
            Level::DEBUG
        } else {
            parse_log_level(cli_args.log_level.as_deref().unwrap_or(&config_file.logging.level))?
        };

        let inventory = cli_args
            .inventory
            .or(config_file.inventory)
            .unwrap_or_else(default_inventory);

        let username = cli_args
            .user
            .or(config_file.ssh.user)
            .or_else(|| std::env::var("USER").ok())
            .ok_or_else(|| anyhow::anyhow!("No SSH user given; use --user or set [ssh] user"))?;

        let credentials = Credentials {
            username,
            port: cli_args.port.unwrap_or(config_file.ssh.port),
            identity_file: cli_args.identity.or(config_file.ssh.identity_file),
        };

        let ssh = SshSettings {
            binary: config_file.ssh.binary,
            connect_timeout: Duration::from_secs(config_file.ssh.connect_timeout_secs),
            command_timeout: Duration::from_secs(config_file.ssh.command_timeout_secs),
            control_dir: config_file.ssh.control_dir,
        };

        Ok(Config {
            command: cli_args.command,
            format: cli_args.format,
            log_level,
            inventory,
            credentials,
            ssh,
            parallel: cli_args.parallel || config_file.assessment.parallel,
            probe_timeout: Duration::from_secs(config_file.assessment.probe_timeout_secs),
        })
    }
}

fn parse_log_level(level_str: &str) -> anyhow::Result<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(anyhow::anyhow!("Invalid log level: {}", level_str)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.ssh.binary, "ssh");
        assert!(!config.assessment.parallel);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_parse_config_file() {
        let config: ConfigFile = toml::from_str(
            r#"
inventory = "/etc/fwcheck/hosts.toml"

[ssh]
user = "admin"
port = 2222

[assessment]
parallel = true
probe_timeout_secs = 60
"#,
        )
        .unwrap();

        assert_eq!(config.inventory, Some(PathBuf::from("/etc/fwcheck/hosts.toml")));
        assert_eq!(config.ssh.user.as_deref(), Some("admin"));
        assert_eq!(config.ssh.port, 2222);
        assert_eq!(config.ssh.command_timeout_secs, 30);
        assert!(config.assessment.parallel);
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let mut file = ConfigFile::default();
        file.ssh.user = Some("admin".to_string());
        file.ssh.port = 2222;
        file.assessment.probe_timeout_secs = 60;

        let config = Config::merge(
            args(&["fwcheck", "--user", "ops", "--port", "22", "check", "--summary"]),
            file,
        )
        .unwrap();

        assert_eq!(config.credentials.username, "ops");
        assert_eq!(config.credentials.port, 22);
        assert_eq!(config.probe_timeout, Duration::from_secs(60));
        assert_eq!(config.inventory, PathBuf::from("hosts.toml"));
        assert!(matches!(config.command, Command::Check { summary: true }));
    }

    #[test]
    fn test_verbose_means_debug() {
        let mut file = ConfigFile::default();
        file.ssh.user = Some("admin".to_string());
        let config = Config::merge(args(&["fwcheck", "-v", "all"]), file).unwrap();
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn test_cluster_arguments() {
        let parsed = args(&["fwcheck", "cluster", "--host1", "fw-a", "--host2", "fw-b"]);
        assert!(matches!(parsed.command, Command::Cluster { name: None, .. }));

        assert!(CliArgs::try_parse_from(["fwcheck", "cluster", "--host1", "fw-a"]).is_err());
        assert!(CliArgs::try_parse_from(["fwcheck", "cluster", "--name", "core", "--host1", "a", "--host2", "b"]).is_err());
    }

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("info"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("DEBUG"), Ok(Level::DEBUG)));
        assert!(parse_log_level("invalid").is_err());
    }
}
