use anyhow::Result;
use async_trait::async_trait;
use relay_control::CommandGateway;
use serde_json::Value;
use shared::protocol::{
    HealthCheckResponse, LifecycleResponse, RelayCommand, RelayStatusResponse, STATUS_RUNNING,
    STATUS_STOPPED,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    config::{HostSettings, OperatorSettings},
    error::HostError,
    opener,
    probe::HealthProbe,
    process::{RelayLauncher, RunningRelay},
};

/// Runs nostr-rs-relay on this machine and answers the relay command vocabulary.
pub struct LocalRelayHost {
    port: u16,
    launcher: RelayLauncher,
    probe: HealthProbe,
    running: Mutex<Option<RunningRelay>>,
}

impl LocalRelayHost {
    pub fn new(port: u16, settings: HostSettings) -> Self {
        Self {
            port,
            probe: HealthProbe::new(port, settings.probe_timeout()),
            launcher: RelayLauncher::new(port, settings),
            running: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &OperatorSettings) -> Self {
        Self::new(settings.controller.relay_port, settings.host.clone())
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the tracked relay is a child of this process rather than a container.
    pub async fn runs_locally(&self) -> bool {
        matches!(*self.running.lock().await, Some(RunningRelay::Local(_)))
    }

    pub fn relay_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Docker first, then a local binary.
    pub async fn start_relay(&self) -> Result<LifecycleResponse, HostError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(LifecycleResponse::running("Relay is already running"));
        }

        let docker_err = match self.launcher.start_container().await {
            Ok(()) => {
                *running = Some(RunningRelay::Container);
                return Ok(LifecycleResponse::running("NOSTR relay started via Docker"));
            }
            Err(err) => err,
        };
        warn!(error = %docker_err, "docker relay unavailable, trying a local binary");

        match self.launcher.start_local().await {
            Ok(child) => {
                *running = Some(RunningRelay::Local(child));
                Ok(LifecycleResponse::running("NOSTR relay started locally"))
            }
            Err(local_err) => Err(HostError::StartFailed(format!(
                "{docker_err}; {local_err}"
            ))),
        }
    }

    pub async fn stop_relay(&self) -> Result<LifecycleResponse, HostError> {
        let mut running = self.running.lock().await;
        let mut stopped = false;

        // The tracked relay is only forgotten once its teardown succeeded.
        if let Some(RunningRelay::Local(child)) = running.as_mut() {
            child
                .kill()
                .await
                .map_err(|err| HostError::StopFailed(err.to_string()))?;
            info!("local relay stopped");
            *running = None;
            stopped = true;
        }
        if self.launcher.remove_container().await? {
            stopped = true;
        }
        *running = None;

        Ok(if stopped {
            LifecycleResponse::stopped("Relay stopped successfully")
        } else {
            LifecycleResponse::stopped("Relay was not running")
        })
    }

    /// A container left behind by an earlier session is adopted.
    pub async fn relay_status(&self) -> RelayStatusResponse {
        let mut running = self.running.lock().await;

        let local_alive = match running.as_mut() {
            Some(RunningRelay::Local(child)) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    info!(%status, "local relay exited");
                    *running = None;
                    false
                }
                Err(err) => {
                    warn!(error = %err, "could not poll local relay");
                    false
                }
            },
            _ => false,
        };

        let alive = if local_alive {
            true
        } else {
            let container = self.launcher.container_running().await == Some(true);
            match (container, running.is_some()) {
                (true, false) => *running = Some(RunningRelay::Container),
                (false, true) if matches!(*running, Some(RunningRelay::Container)) => {
                    *running = None
                }
                _ => {}
            }
            container
        };

        let status = if alive { STATUS_RUNNING } else { STATUS_STOPPED };
        RelayStatusResponse {
            running: alive,
            port: self.port,
            message: format!("Relay status: {status}"),
        }
    }

    pub async fn health_check(&self) -> HealthCheckResponse {
        self.probe.check().await
    }

    pub fn open_relay_url(&self) -> Result<(), HostError> {
        opener::open_url(&self.relay_url())
    }
}

#[async_trait]
impl CommandGateway for LocalRelayHost {
    async fn invoke(&self, command: RelayCommand, _args: Value) -> Result<Value> {
        let payload = match command {
            RelayCommand::StartRelay => serde_json::to_value(self.start_relay().await?)?,
            RelayCommand::StopRelay => serde_json::to_value(self.stop_relay().await?)?,
            RelayCommand::GetRelayStatus => serde_json::to_value(self.relay_status().await)?,
            RelayCommand::HealthCheck => serde_json::to_value(self.health_check().await)?,
            RelayCommand::OpenRelayUrl => {
                self.open_relay_url()?;
                Value::Null
            }
        };
        Ok(payload)
    }
}

#[cfg(test)]
#[path = "tests/host_tests.rs"]
mod tests;
