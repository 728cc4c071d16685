use shared::domain::{LogEntry, PanelSnapshot, RelayState, TelemetrySnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    StateChanged(RelayState),
    LogAppended(LogEntry),
    LogsCleared,
    TelemetryUpdated(TelemetrySnapshot),
}

/// Receives a full panel snapshot after every change and redraws from it.
pub trait RenderSink: Send {
    fn render(&mut self, snapshot: &PanelSnapshot);
}

impl<F> RenderSink for F
where
    F: FnMut(&PanelSnapshot) + Send,
{
    fn render(&mut self, snapshot: &PanelSnapshot) {
        self(snapshot)
    }
}

pub struct NullSink;

impl RenderSink for NullSink {
    fn render(&mut self, _snapshot: &PanelSnapshot) {}
}
