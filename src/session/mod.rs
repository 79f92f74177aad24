// Session module - the remote session collaborator used to query firewalls

pub mod parse;
pub mod ssh;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::AppResult;
use crate::routes::RouteSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsClass {
    Gaia,
    SecurePlatform,
    Ipso,
    Crossbeam,
    Unknown(String),
}

impl fmt::Display for OsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsClass::Gaia => write!(f, "Gaia"),
            OsClass::SecurePlatform => write!(f, "SecurePlatform"),
            OsClass::Ipso => write!(f, "IPSO"),
            OsClass::Crossbeam => write!(f, "Crossbeam"),
            OsClass::Unknown(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub class: OsClass,
    /// Release string, e.g. `R80.40`
    pub os_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    pub version: String,
    pub platform: String,
}

/// An addressed (layer 3) interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalInterface {
    pub name: String,
    /// Address in CIDR notation
    pub address: Option<String>,
}

/// The physical port behind a logical interface, with its VLAN tag if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalInterface {
    pub name: String,
    pub vlan: Option<String>,
}

/// Free-form HA state as reported by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaStatus {
    pub mode: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
}

/// A session with one firewall.
///
/// `connect` must succeed before any query. `logout` and `disconnect` are
/// idempotent and never fail; implementations log and swallow their errors.
#[async_trait]
pub trait RemoteSession: Send {
    async fn connect(&mut self) -> AppResult<()>;

    async fn query_os(&mut self) -> AppResult<OsInfo>;

    async fn query_info(&mut self) -> AppResult<FirmwareInfo>;

    async fn query_logical_interfaces(&mut self) -> AppResult<Vec<LogicalInterface>>;

    async fn query_physical_interfaces(
        &mut self,
        logical: &[LogicalInterface],
    ) -> AppResult<Vec<PhysicalInterface>>;

    async fn query_routes(&mut self) -> AppResult<RouteSet>;

    /// `None` when HA is not configured on the host
    async fn query_ha_status(&mut self) -> AppResult<Option<HaStatus>>;

    async fn logout(&mut self);

    async fn disconnect(&mut self);
}

/// Creates sessions, so assessors never depend on a concrete transport
pub trait SessionFactory: Send + Sync {
    fn open(&self, host: &str, address: &str, credentials: &Credentials) -> Box<dyn RemoteSession>;
}
