use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayPhase {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl RelayPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stopped => "Relay Stopped",
            Self::Starting => "Starting Relay",
            Self::Running => "Relay Running",
            Self::Stopping => "Stopping Relay",
            Self::Error => "Relay Error",
        }
    }

    /// A lifecycle command is outstanding while the relay is in a transitional phase.
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    Connected,
    #[default]
    Disconnected,
    Error,
}

impl NetworkStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayState {
    pub phase: RelayPhase,
    pub message: String,
    pub port: u16,
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorReport>,
}

impl RelayState {
    pub fn new(port: u16) -> Self {
        Self {
            phase: RelayPhase::Stopped,
            message: "Relay stopped".to_string(),
            port,
            online: false,
            last_error: None,
        }
    }

    pub fn websocket_url(&self) -> String {
        format!("ws://localhost:{}", self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub text: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            text: text.into(),
        }
    }

    /// `[HH:MM:SS] text` in the local timezone.
    pub fn display_line(&self) -> String {
        let local: DateTime<Local> = self.timestamp.with_timezone(&Local);
        format!("[{}] {}", local.format("%H:%M:%S"), self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Simulated earnings in BTC.
    pub earned: f64,
    pub payments: u64,
    pub channels: u32,
    pub network: NetworkStatus,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            earned: 0.0,
            payments: 0,
            channels: 0,
            network: NetworkStatus::Disconnected,
        }
    }
}

impl TelemetrySnapshot {
    pub fn earned_label(&self) -> String {
        format!("{:.8} BTC", self.earned)
    }
}

/// Everything a renderer needs to redraw the panel from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSnapshot {
    pub state: RelayState,
    pub logs: Vec<LogEntry>,
    pub telemetry: TelemetrySnapshot,
    pub health_armed: bool,
    pub telemetry_armed: bool,
}

impl PanelSnapshot {
    pub fn new(state: RelayState) -> Self {
        Self {
            state,
            logs: Vec::new(),
            telemetry: TelemetrySnapshot::default(),
            health_armed: false,
            telemetry_armed: false,
        }
    }
}
