// Scripted in-memory sessions for assessor tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::routes::{route, NetworkRoute, RouteSet};
use crate::session::{
    Credentials, FirmwareInfo, HaStatus, LogicalInterface, OsClass, OsInfo, PhysicalInterface,
    RemoteSession, SessionFactory,
};

#[derive(Debug, Clone)]
pub struct ScriptedHost {
    pub connect: Result<(), String>,
    pub os: Result<OsInfo, String>,
    pub info: Result<FirmwareInfo, String>,
    pub logical: Result<Vec<LogicalInterface>, String>,
    /// On success, one physical port per logical interface passed in
    pub physical: Result<(), String>,
    pub routes: Result<Vec<NetworkRoute>, String>,
    pub ha: Result<Option<HaStatus>, String>,
    /// Stall the route query, for timeout tests
    pub delay: Option<Duration>,
}

pub fn default_routes() -> Vec<NetworkRoute> {
    vec![
        route("0.0.0.0/0", "192.0.2.254", "eth0"),
        route("10.0.0.0/8", "192.168.1.254", "eth1"),
        route("192.168.1.0/24", "", "eth1"),
    ]
}

impl ScriptedHost {
    pub fn healthy(ha_status: &str) -> Self {
        ScriptedHost {
            connect: Ok(()),
            os: Ok(OsInfo {
                class: OsClass::Gaia,
                os_type: "R80.40".to_string(),
            }),
            info: Ok(FirmwareInfo {
                version: "R80.40".to_string(),
                platform: "Linux 3.10.0 x86_64".to_string(),
            }),
            logical: Ok(vec![
                LogicalInterface {
                    name: "eth0".to_string(),
                    address: Some("192.0.2.1/24".to_string()),
                },
                LogicalInterface {
                    name: "eth1".to_string(),
                    address: Some("192.168.1.1/24".to_string()),
                },
            ]),
            physical: Ok(()),
            routes: Ok(default_routes()),
            ha: Ok(Some(HaStatus {
                mode: Some("High Availability".to_string()),
                status: ha_status.to_string(),
            })),
            delay: None,
        }
    }

    pub fn unreachable() -> Self {
        ScriptedHost {
            connect: Err("connection refused".to_string()),
            ..ScriptedHost::healthy("active")
        }
    }

    pub fn with_routes(mut self, routes: Vec<NetworkRoute>) -> Self {
        self.routes = Ok(routes);
        self
    }
}

type CallLog = Arc<Mutex<Vec<(String, String)>>>;

#[derive(Default)]
pub struct MockFactory {
    hosts: HashMap<String, ScriptedHost>,
    calls: CallLog,
}

impl MockFactory {
    pub fn new() -> Self {
        MockFactory::default()
    }

    pub fn with_host(mut self, name: &str, script: ScriptedHost) -> Self {
        self.hosts.insert(name.to_string(), script);
        self
    }

    pub fn credentials() -> Credentials {
        Credentials {
            username: "admin".to_string(),
            port: 22,
            identity_file: None,
        }
    }

    pub fn calls_for(&self, host: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn query_count(&self, host: &str) -> usize {
        self.calls_for(host).iter().filter(|c| c.starts_with("query_")).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl SessionFactory for MockFactory {
    fn open(&self, host: &str, _address: &str, _credentials: &Credentials) -> Box<dyn RemoteSession> {
        let script = self
            .hosts
            .get(host)
            .cloned()
            .unwrap_or_else(ScriptedHost::unreachable);
        Box::new(MockSession {
            host: host.to_string(),
            script,
            calls: self.calls.clone(),
        })
    }
}

struct MockSession {
    host: String,
    script: ScriptedHost,
    calls: CallLog,
}

impl MockSession {
    fn log(&self, call: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((self.host.clone(), call.to_string()));
    }
}

fn scripted<T: Clone>(facet: &'static str, result: &Result<T, String>) -> AppResult<T> {
    result.clone().map_err(|e| AppError::query(facet, e))
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn connect(&mut self) -> AppResult<()> {
        self.log("connect");
        self.script
            .connect
            .clone()
            .map_err(|e| AppError::connection(&self.host, e))
    }

    async fn query_os(&mut self) -> AppResult<OsInfo> {
        self.log("query_os");
        scripted("os", &self.script.os)
    }

    async fn query_info(&mut self) -> AppResult<FirmwareInfo> {
        self.log("query_info");
        scripted("info", &self.script.info)
    }

    async fn query_logical_interfaces(&mut self) -> AppResult<Vec<LogicalInterface>> {
        self.log("query_logical_interfaces");
        scripted("logical interfaces", &self.script.logical)
    }

    async fn query_physical_interfaces(
        &mut self,
        logical: &[LogicalInterface],
    ) -> AppResult<Vec<PhysicalInterface>> {
        self.log("query_physical_interfaces");
        scripted("physical interfaces", &self.script.physical)?;
        Ok(logical
            .iter()
            .map(|l| PhysicalInterface {
                name: l.name.clone(),
                vlan: None,
            })
            .collect())
    }

    async fn query_routes(&mut self) -> AppResult<RouteSet> {
        self.log("query_routes");
        if let Some(delay) = self.script.delay {
            tokio::time::sleep(delay).await;
        }
        scripted("routes", &self.script.routes).map(RouteSet::from)
    }

    async fn query_ha_status(&mut self) -> AppResult<Option<HaStatus>> {
        self.log("query_ha_status");
        scripted("ha status", &self.script.ha)
    }

    async fn logout(&mut self) {
        self.log("logout");
    }

    async fn disconnect(&mut self) {
        self.log("disconnect");
    }
}
