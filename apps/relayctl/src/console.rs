use relay_control::RenderSink;
use shared::domain::{LogEntry, PanelSnapshot, RelayPhase};

/// Prints phase changes and log lines not printed yet.
#[derive(Default)]
pub struct ConsoleSink {
    last_phase: Option<RelayPhase>,
    last_log: Option<LogEntry>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines that a render of `snapshot` would print, advancing the cursor.
    pub fn pending_lines(&mut self, snapshot: &PanelSnapshot) -> Vec<String> {
        let mut lines = Vec::new();

        let phase = snapshot.state.phase;
        if self.last_phase != Some(phase) {
            self.last_phase = Some(phase);
            lines.push(format!("== {} ({})", phase.label(), snapshot.state.message));
        }

        // A cleared buffer no longer holds the cursor, so everything is new.
        let start = self
            .last_log
            .as_ref()
            .and_then(|last| snapshot.logs.iter().rposition(|entry| entry == last))
            .map_or(0, |index| index + 1);
        lines.extend(snapshot.logs[start..].iter().map(LogEntry::display_line));
        if let Some(last) = snapshot.logs.last() {
            self.last_log = Some(last.clone());
        }

        lines
    }
}

impl RenderSink for ConsoleSink {
    fn render(&mut self, snapshot: &PanelSnapshot) {
        for line in self.pending_lines(snapshot) {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::{LogLevel, RelayState};

    use super::*;

    #[test]
    fn prints_only_new_lines_and_phase_changes() {
        let mut sink = ConsoleSink::new();
        let mut snapshot = PanelSnapshot::new(RelayState::new(8080));
        snapshot
            .logs
            .push(LogEntry::new(LogLevel::Info, "Relay operator ready"));

        let first = sink.pending_lines(&snapshot);
        assert_eq!(first.len(), 2);
        assert!(first[0].starts_with("== Relay Stopped"));

        assert!(sink.pending_lines(&snapshot).is_empty());

        snapshot.state.phase = RelayPhase::Starting;
        snapshot
            .logs
            .push(LogEntry::new(LogLevel::Info, "Starting relay..."));
        let next = sink.pending_lines(&snapshot);
        assert_eq!(next.len(), 2);
        assert!(next[1].ends_with("Starting relay..."));
    }

    #[test]
    fn cleared_logs_are_printed_from_the_start() {
        let mut sink = ConsoleSink::new();
        let mut snapshot = PanelSnapshot::new(RelayState::new(8080));
        snapshot.logs.push(LogEntry::new(LogLevel::Info, "one"));
        sink.pending_lines(&snapshot);

        snapshot.logs = vec![LogEntry::new(LogLevel::Info, "Logs cleared")];
        let lines = sink.pending_lines(&snapshot);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("Logs cleared"));
    }
}
