// SSH transport built on the system `ssh` binary
//
// A control-master connection is the session: `connect` starts the master,
// every query runs one command over it, and `disconnect` tears it down. The
// master process is spawned with `kill_on_drop`, so an abandoned session
// (timeout, cancelled probe) never leaves a connection behind.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};

use super::{
    parse, Credentials, FirmwareInfo, HaStatus, LogicalInterface, OsInfo, PhysicalInterface,
    RemoteSession, SessionFactory,
};
use crate::error::{AppError, AppResult};
use crate::routes::{parser, RouteSet};

const CHECK_INTERVAL_MS: u64 = 200;

#[derive(Debug, Clone)]
pub struct SshSettings {
    pub binary: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub control_dir: PathBuf,
}

pub struct SshSessionFactory {
    settings: SshSettings,
}

impl SshSessionFactory {
    pub fn new(settings: SshSettings) -> Self {
        SshSessionFactory { settings }
    }
}

impl SessionFactory for SshSessionFactory {
    fn open(&self, host: &str, address: &str, credentials: &Credentials) -> Box<dyn RemoteSession> {
        Box::new(SshSession::new(host, address, credentials.clone(), self.settings.clone()))
    }
}

pub struct SshSession {
    host: String,
    address: String,
    credentials: Credentials,
    settings: SshSettings,
    control_path: PathBuf,
    master: Option<Child>,
}

impl SshSession {
    pub fn new(host: &str, address: &str, credentials: Credentials, settings: SshSettings) -> Self {
        let control_path = control_path(&settings.control_dir, host);
        SshSession {
            host: host.to_string(),
            address: address.to_string(),
            credentials,
            settings,
            control_path,
            master: None,
        }
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.settings.connect_timeout.as_secs().max(1)),
            "-p".to_string(),
            self.credentials.port.to_string(),
            "-l".to_string(),
            self.credentials.username.clone(),
            "-S".to_string(),
            self.control_path.display().to_string(),
        ];

        if let Some(identity) = &self.credentials.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }

        args
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.settings.binary);
        cmd.args(self.base_args())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Send a control command (`check`, `stop`, `exit`) to the master
    async fn control(&self, operation: &str) -> std::io::Result<Output> {
        self.command()
            .args(["-O", operation, self.address.as_str()])
            .output()
            .await
    }

    async fn wait_for_master(&mut self) -> AppResult<()> {
        loop {
            if let Some(master) = self.master.as_mut() {
                if let Some(status) = master.try_wait()? {
                    let mut message = format!("ssh exited with {}", status);
                    if let Some(mut stderr) = master.stderr.take() {
                        use tokio::io::AsyncReadExt;
                        let mut text = String::new();
                        if stderr.read_to_string(&mut text).await.is_ok() && !text.trim().is_empty() {
                            message = text.trim().to_string();
                        }
                    }
                    return Err(AppError::connection(&self.host, message));
                }
            }

            if let Ok(output) = self.control("check").await {
                if output.status.success() {
                    return Ok(());
                }
            }

            tokio::time::sleep(Duration::from_millis(CHECK_INTERVAL_MS)).await;
        }
    }

    /// Run a command over the master connection
    async fn exec(&self, facet: &'static str, command: &str) -> AppResult<Output> {
        if self.master.is_none() {
            return Err(AppError::query(facet, "session is not connected"));
        }

        tracing::debug!("[{}] running `{}`", self.host, command);

        let run = self
            .command()
            .args(["-o", "ControlMaster=no", self.address.as_str(), command])
            .output();

        match tokio::time::timeout(self.settings.command_timeout, run).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(AppError::query(facet, e.to_string())),
            Err(_) => Err(AppError::query(
                facet,
                format!("`{}` timed out after {}s", command, self.settings.command_timeout.as_secs()),
            )),
        }
    }

    async fn run(&self, facet: &'static str, command: &str) -> AppResult<String> {
        let output = self.exec(facet, command).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("`{}` exited with {}", command, output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(AppError::query(facet, message));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn connect(&mut self) -> AppResult<()> {
        if self.master.is_some() {
            return Ok(());
        }

        tracing::debug!("[{}] starting ssh master to {}", self.host, self.address);

        let child = self
            .command()
            .args(["-M", "-N", self.address.as_str()])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::connection(&self.host, format!("failed to start {}: {}", self.settings.binary, e)))?;
        self.master = Some(child);

        let timeout = self.settings.connect_timeout;
        let result = match tokio::time::timeout(timeout, self.wait_for_master()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::connection(
                &self.host,
                format!("no session after {}s", timeout.as_secs()),
            )),
        };

        if result.is_err() {
            if let Some(mut master) = self.master.take() {
                let _ = master.kill().await;
            }
        }

        result
    }

    async fn query_os(&mut self) -> AppResult<OsInfo> {
        let release = self.run("os", "cat /etc/cp-release 2>/dev/null || true").await?;
        let kernel = self.run("os", "uname -s").await?;
        Ok(parse::parse_os(&release, &kernel))
    }

    async fn query_info(&mut self) -> AppResult<FirmwareInfo> {
        let fw_ver = self.run("info", "fw ver").await?;
        let uname = self.run("info", "uname -srm").await?;
        parse::parse_info(&fw_ver, &uname)
            .ok_or_else(|| AppError::query("info", format!("unrecognised `fw ver` output: {}", fw_ver.trim())))
    }

    async fn query_logical_interfaces(&mut self) -> AppResult<Vec<LogicalInterface>> {
        let output = self.run("logical interfaces", "ip -o -4 addr show").await?;
        Ok(parse::parse_logical_interfaces(&output))
    }

    async fn query_physical_interfaces(
        &mut self,
        logical: &[LogicalInterface],
    ) -> AppResult<Vec<PhysicalInterface>> {
        let output = self.run("physical interfaces", "ip -o link show").await?;
        let links = parse::parse_links(&output);
        Ok(parse::physical_interfaces(logical, &links))
    }

    async fn query_routes(&mut self) -> AppResult<RouteSet> {
        let output = self.run("routes", "ip -4 route show").await?;
        Ok(parser::parse_ip_route(&output))
    }

    async fn query_ha_status(&mut self) -> AppResult<Option<HaStatus>> {
        let output = self.exec("ha status", "cphaprob state").await?;
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        match parse::parse_ha_status(&text) {
            None => Ok(None),
            Some(_) if !output.status.success() => {
                Err(AppError::query("ha status", text.trim().to_string()))
            }
            status => Ok(status),
        }
    }

    async fn logout(&mut self) {
        if self.master.is_none() {
            return;
        }
        match self.control("stop").await {
            Ok(output) if output.status.success() => {}
            Ok(output) => tracing::debug!(
                "[{}] ssh -O stop: {}",
                self.host,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => tracing::debug!("[{}] ssh -O stop failed: {}", self.host, e),
        }
    }

    async fn disconnect(&mut self) {
        let Some(mut master) = self.master.take() else {
            return;
        };
        if let Err(e) = self.control("exit").await {
            tracing::debug!("[{}] ssh -O exit failed: {}", self.host, e);
        }
        if let Err(e) = master.kill().await {
            tracing::debug!("[{}] ssh master already gone: {}", self.host, e);
        }
    }
}

fn control_path(dir: &std::path::Path, host: &str) -> PathBuf {
    let safe: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    dir.join(format!("fwcheck-{}-{}.sock", safe, std::process::id()))
}
