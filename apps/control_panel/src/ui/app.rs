use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use shared::domain::{
    LogLevel, NetworkStatus, PanelSnapshot, RelayPhase, RelayState, TelemetrySnapshot,
};

use crate::{
    backend_bridge::{commands::PanelCommand, snapshot_slot::SnapshotSlot},
    controller::{events::UiEvent, orchestration::dispatch_panel_command},
};

const REPAINT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

/// Buttons follow the controller's phase guard so the panel never offers a
/// request the controller would ignore.
pub fn control_state(phase: RelayPhase) -> ControlState {
    ControlState {
        start_enabled: matches!(phase, RelayPhase::Stopped | RelayPhase::Error),
        stop_enabled: matches!(phase, RelayPhase::Running | RelayPhase::Error),
    }
}

pub fn status_description(state: &RelayState) -> String {
    match state.phase {
        RelayPhase::Running => format!(
            "Your relay is active and earning. Port {} • WebSocket: {}",
            state.port,
            state.websocket_url()
        ),
        RelayPhase::Stopped => "Click Start to begin earning Bitcoin".to_string(),
        RelayPhase::Starting | RelayPhase::Stopping | RelayPhase::Error => state.message.clone(),
    }
}

fn status_icon(phase: RelayPhase) -> &'static str {
    match phase {
        RelayPhase::Running => "🚀",
        RelayPhase::Stopped => "⏸",
        RelayPhase::Starting | RelayPhase::Stopping => "⏳",
        RelayPhase::Error => "⚠",
    }
}

fn phase_color(phase: RelayPhase) -> egui::Color32 {
    match phase {
        RelayPhase::Running => egui::Color32::from_rgb(67, 160, 71),
        RelayPhase::Stopped => egui::Color32::from_rgb(140, 140, 150),
        RelayPhase::Starting | RelayPhase::Stopping => egui::Color32::from_rgb(240, 173, 78),
        RelayPhase::Error => egui::Color32::from_rgb(217, 83, 79),
    }
}

fn log_color(level: LogLevel) -> egui::Color32 {
    match level {
        LogLevel::Info => egui::Color32::from_rgb(200, 200, 210),
        LogLevel::Success => egui::Color32::from_rgb(102, 187, 106),
        LogLevel::Warning => egui::Color32::from_rgb(240, 173, 78),
        LogLevel::Error => egui::Color32::from_rgb(229, 115, 115),
    }
}

fn network_color(network: NetworkStatus) -> egui::Color32 {
    match network {
        NetworkStatus::Connected => egui::Color32::from_rgb(102, 187, 106),
        NetworkStatus::Disconnected => egui::Color32::from_rgb(140, 140, 150),
        NetworkStatus::Error => egui::Color32::from_rgb(229, 115, 115),
    }
}

pub struct RelayPanelApp {
    cmd_tx: Sender<PanelCommand>,
    ui_rx: Receiver<UiEvent>,
    snapshots: SnapshotSlot,
    snapshot: PanelSnapshot,
    backend_ready: bool,
    status: Option<String>,
}

impl RelayPanelApp {
    pub fn new(
        cmd_tx: Sender<PanelCommand>,
        ui_rx: Receiver<UiEvent>,
        snapshots: SnapshotSlot,
        port: u16,
    ) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            snapshots,
            snapshot: PanelSnapshot::new(RelayState::new(port)),
            backend_ready: false,
            status: None,
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::BackendReady => self.backend_ready = true,
                UiEvent::BackendFailed(message) => {
                    tracing::error!("{message}");
                    self.status = Some(message);
                }
            }
        }
        if let Some(snapshot) = self.snapshots.take() {
            self.snapshot = snapshot;
        }
    }

    fn dispatch(&mut self, cmd: PanelCommand) {
        dispatch_panel_command(&self.cmd_tx, cmd, &mut self.status);
    }

    fn show_header(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.heading("🦁 Privacy Lion Relay Operator");
            ui.label(egui::RichText::new("Lightning Network Relay Management Interface").weak());
            ui.add_space(6.0);
        });
    }

    fn show_status_card(&self, ui: &mut egui::Ui) {
        let state = &self.snapshot.state;
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(status_icon(state.phase)).size(28.0));
                ui.vertical(|ui| {
                    ui.label(
                        egui::RichText::new(state.phase.label())
                            .strong()
                            .size(18.0)
                            .color(phase_color(state.phase)),
                    );
                    ui.label(status_description(state));
                    if let Some(report) = &state.last_error {
                        ui.small(
                            egui::RichText::new(report.code.label())
                                .color(phase_color(RelayPhase::Error)),
                        );
                    }
                });
            });
        });
    }

    fn show_controls(&mut self, ui: &mut egui::Ui) {
        let controls = control_state(self.snapshot.state.phase);
        let mut requested = None;

        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(egui::RichText::new("⚡ Relay Controls").strong());
            ui.horizontal(|ui| {
                let ready = self.backend_ready;
                if ui
                    .add_enabled(ready && controls.start_enabled, egui::Button::new("▶ Start Relay"))
                    .clicked()
                {
                    requested = Some(PanelCommand::StartRelay);
                }
                if ui
                    .add_enabled(ready && controls.stop_enabled, egui::Button::new("⏹ Stop Relay"))
                    .clicked()
                {
                    requested = Some(PanelCommand::StopRelay);
                }
                if ui
                    .add_enabled(ready, egui::Button::new("🌐 Open in browser"))
                    .clicked()
                {
                    requested = Some(PanelCommand::OpenRelayUrl);
                }
            });
            if let Some(status) = &self.status {
                ui.small(egui::RichText::new(status).color(phase_color(RelayPhase::Error)));
            }
        });

        if let Some(cmd) = requested {
            self.dispatch(cmd);
        }
    }

    fn show_telemetry(&self, ui: &mut egui::Ui) {
        let telemetry: &TelemetrySnapshot = &self.snapshot.telemetry;
        let cards = [
            ("💰 Total Earned", telemetry.earned_label(), None),
            ("📊 Payments Routed", telemetry.payments.to_string(), None),
            ("⚡ Active Channels", telemetry.channels.to_string(), None),
            (
                "🌐 Network Status",
                telemetry.network.label().to_string(),
                Some(network_color(telemetry.network)),
            ),
        ];

        ui.columns(cards.len(), |columns| {
            for (column, (title, value, color)) in columns.iter_mut().zip(cards) {
                egui::Frame::group(column.style()).show(column, |ui| {
                    ui.set_width(ui.available_width());
                    ui.label(egui::RichText::new(title).weak());
                    let value = egui::RichText::new(value).strong().size(16.0);
                    ui.label(match color {
                        Some(color) => value.color(color),
                        None => value,
                    });
                });
            }
        });
    }

    fn show_logs(&mut self, ui: &mut egui::Ui) {
        let mut clear = false;
        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new("📋 Activity Logs").strong());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    clear = ui
                        .add_enabled(self.backend_ready, egui::Button::new("Clear Logs"))
                        .clicked();
                });
            });
            ui.separator();
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for entry in &self.snapshot.logs {
                        ui.label(
                            egui::RichText::new(entry.display_line())
                                .monospace()
                                .color(log_color(entry.level)),
                        );
                    }
                });
        });

        if clear {
            self.dispatch(PanelCommand::ClearLogs);
        }
    }
}

impl eframe::App for RelayPanelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        self.show_header(ctx);
        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_status_card(ui);
            ui.add_space(8.0);
            self.show_controls(ui);
            ui.add_space(8.0);
            self.show_telemetry(ui);
            ui.add_space(8.0);
            self.show_logs(ui);
        });

        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}
