//! Commands queued from the UI to the backend worker.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCommand {
    StartRelay,
    StopRelay,
    ClearLogs,
    OpenRelayUrl,
}

impl PanelCommand {
    pub fn name(self) -> &'static str {
        match self {
            Self::StartRelay => "start_relay",
            Self::StopRelay => "stop_relay",
            Self::ClearLogs => "clear_logs",
            Self::OpenRelayUrl => "open_relay_url",
        }
    }
}
