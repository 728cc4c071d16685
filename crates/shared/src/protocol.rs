use std::fmt;

use serde::{Deserialize, Serialize};

pub const STATUS_RUNNING: &str = "running";
pub const STATUS_STOPPED: &str = "stopped";

/// Fixed command vocabulary understood by the relay host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayCommand {
    StartRelay,
    StopRelay,
    GetRelayStatus,
    HealthCheck,
    OpenRelayUrl,
}

impl RelayCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartRelay => "start_relay",
            Self::StopRelay => "stop_relay",
            Self::GetRelayStatus => "get_relay_status",
            Self::HealthCheck => "health_check",
            Self::OpenRelayUrl => "open_relay_url",
        }
    }
}

impl fmt::Display for RelayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of `start_relay` and `stop_relay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleResponse {
    pub status: String,
    pub message: String,
}

impl LifecycleResponse {
    pub fn running(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_RUNNING.to_string(),
            message: message.into(),
        }
    }

    pub fn stopped(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_STOPPED.to_string(),
            message: message.into(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == STATUS_RUNNING
    }

    pub fn is_stopped(&self) -> bool {
        self.status == STATUS_STOPPED
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStatusResponse {
    pub running: bool,
    pub port: u16,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub relay_online: bool,
    pub port_accessible: bool,
    #[serde(default)]
    pub message: String,
}

impl HealthCheckResponse {
    pub fn offline() -> Self {
        Self {
            relay_online: false,
            port_accessible: false,
            message: String::new(),
        }
    }

    /// Something answers on the port but it is not a relay we recognise.
    pub fn port_occupied(&self) -> bool {
        self.port_accessible && !self.relay_online
    }
}
